use nudge_domain::{to_utc_iso, Reminder, ReminderPayload, ReminderStatus};
use serde::Serialize;

/// External representation of a stored reminder. Timestamps are RFC 3339
/// strings in UTC.
#[derive(Debug, Clone, Serialize)]
pub struct ReminderDTO {
    pub reminder_id: String,
    pub title: String,
    pub message: String,
    pub target_time_iso: String,
    pub payload: ReminderPayload,
    pub status: ReminderStatus,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub created_at_iso: String,
    pub updated_at_iso: String,
    pub sent_at_iso: Option<String>,
}

impl ReminderDTO {
    pub fn new(reminder: Reminder) -> Self {
        Self {
            reminder_id: reminder.id.as_string(),
            title: reminder.title,
            message: reminder.message,
            target_time_iso: to_utc_iso(&reminder.target_time),
            payload: reminder.payload,
            status: reminder.status,
            attempts: reminder.attempts,
            last_error: reminder.last_error,
            created_at_iso: to_utc_iso(&reminder.created_at),
            updated_at_iso: to_utc_iso(&reminder.updated_at),
            sent_at_iso: reminder.sent_at.as_ref().map(to_utc_iso),
        }
    }
}

/// Confirmation returned after a successful cancellation
#[derive(Debug, Clone, Serialize)]
pub struct CancelledReminderDTO {
    pub reminder_id: String,
    pub status: ReminderStatus,
    pub cancelled_at_iso: String,
}

impl CancelledReminderDTO {
    pub fn new(reminder: Reminder) -> Self {
        Self {
            reminder_id: reminder.id.as_string(),
            status: reminder.status,
            cancelled_at_iso: to_utc_iso(&reminder.updated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use nudge_domain::NewReminder;

    #[test]
    fn serializes_with_iso_timestamps() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let reminder = Reminder::new(
            NewReminder {
                title: "Standup".into(),
                message: "body".into(),
                target_time: now + chrono::Duration::minutes(30),
                payload: ReminderPayload {
                    to: "whatsapp:+47".into(),
                    message: "ping".into(),
                },
            },
            "https://hooks.example.com/r",
            now,
        );

        let dto = ReminderDTO::new(reminder);
        let json = serde_json::to_value(&dto).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["attempts"], 0);
        assert_eq!(json["target_time_iso"], "2024-03-01T12:30:00.000000Z");
        assert!(json["sent_at_iso"].is_null());
    }
}
