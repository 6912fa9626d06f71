pub mod cancel_reminder;
pub mod list_reminders;
pub mod schedule_reminder;
