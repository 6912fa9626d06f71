mod date;
mod reminder;
mod shared;

pub use date::{parse_utc_iso, to_utc_iso};
pub use reminder::{
    truncate_error, InvalidStatusError, NewReminder, Reminder, ReminderPayload, ReminderStatus,
    MAX_LAST_ERROR_LEN,
};
pub use shared::entity::{Entity, InvalidIDError, ID};
