mod sqlite;

#[cfg(feature = "postgres")]
mod postgres;

pub use sqlite::SqliteReminderRepo;

#[cfg(feature = "postgres")]
pub use postgres::PostgresReminderRepo;

use chrono::{DateTime, Utc};
use nudge_domain::{NewReminder, Reminder, ReminderStatus, ID};

/// Largest page a single `list` call will return
pub const MAX_LIST_LIMIT: i64 = 1000;

#[async_trait::async_trait]
pub trait IReminderRepo: Send + Sync {
    /// Persists a fresh `pending` reminder and returns the stored record
    async fn create(
        &self,
        draft: NewReminder,
        webhook_url: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Reminder>;

    async fn find(&self, reminder_id: &ID) -> Option<Reminder>;

    /// Returns reminders ordered by `earliest_run` ascending, optionally
    /// filtered by status. `limit` is clamped to `1..=MAX_LIST_LIMIT`.
    async fn list(
        &self,
        status: Option<ReminderStatus>,
        limit: i64,
    ) -> anyhow::Result<Vec<Reminder>>;

    /// Atomically claims up to `limit` due `pending` reminders by flipping
    /// them to `dispatching`. Two concurrent callers never receive the same
    /// reminder.
    async fn acquire_due(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> anyhow::Result<Vec<Reminder>>;

    /// Finalizes a delivered reminder with the attempt count that succeeded.
    /// Only applies while the reminder is still `dispatching`, so a
    /// cancellation that raced the delivery wins.
    async fn mark_sent(
        &self,
        reminder_id: &ID,
        attempts: i64,
        sent_at: DateTime<Utc>,
    ) -> anyhow::Result<()>;

    /// Returns a failed reminder to `pending`, eligible again at
    /// `next_attempt`. The error description is truncated before storage.
    /// Only applies while the reminder is still `dispatching`.
    async fn record_failure(
        &self,
        reminder_id: &ID,
        attempts: i64,
        next_attempt: DateTime<Utc>,
        error: &str,
        updated_at: DateTime<Utc>,
    ) -> anyhow::Result<()>;

    /// Cancels a reminder unless it already reached a terminal status.
    /// Returns whether a row was updated.
    async fn cancel(&self, reminder_id: &ID, cancelled_at: DateTime<Utc>) -> anyhow::Result<bool>;
}

pub(crate) fn clamp_limit(limit: i64) -> i64 {
    limit.clamp(1, MAX_LIST_LIMIT)
}
