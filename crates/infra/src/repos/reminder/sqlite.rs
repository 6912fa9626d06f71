use super::{clamp_limit, IReminderRepo};
use chrono::{DateTime, Utc};
use nudge_domain::{
    parse_utc_iso, to_utc_iso, truncate_error, NewReminder, Reminder, ReminderPayload,
    ReminderStatus, ID,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Connection, FromRow, SqliteConnection, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::error;

/// Sqlite-backed reminder store.
///
/// Timestamps are stored as RFC 3339 TEXT with fixed microsecond precision so
/// that string comparison orders chronologically.
pub struct SqliteReminderRepo {
    pool: SqlitePool,
}

impl SqliteReminderRepo {
    pub async fn connect(path: &str) -> anyhow::Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        let repo = Self { pool };
        repo.ensure_schema().await?;
        Ok(repo)
    }

    async fn ensure_schema(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS reminders (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                message TEXT NOT NULL,
                target_time TEXT NOT NULL,
                earliest_run TEXT NOT NULL,
                payload_json TEXT NOT NULL,
                webhook_url TEXT NOT NULL,
                status TEXT NOT NULL,
                attempts INTEGER NOT NULL DEFAULT 0,
                last_error TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                sent_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_reminders_status_time ON reminders (status, earliest_run)",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn claim_batch(
        conn: &mut SqliteConnection,
        now: &str,
        limit: i64,
    ) -> anyhow::Result<Vec<ReminderRaw>> {
        let mut due: Vec<ReminderRaw> = sqlx::query_as(
            r#"
            SELECT * FROM reminders
            WHERE status = 'pending' AND earliest_run <= $1
            ORDER BY earliest_run ASC
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?;

        for raw in due.iter_mut() {
            sqlx::query("UPDATE reminders SET status = 'dispatching', updated_at = $1 WHERE id = $2")
                .bind(now)
                .bind(&raw.id)
                .execute(&mut *conn)
                .await?;
            raw.status = ReminderStatus::Dispatching.as_str().to_string();
            raw.updated_at = now.to_string();
        }
        Ok(due)
    }
}

#[derive(Debug, FromRow)]
struct ReminderRaw {
    id: String,
    title: String,
    message: String,
    target_time: String,
    earliest_run: String,
    payload_json: String,
    webhook_url: String,
    status: String,
    attempts: i64,
    last_error: Option<String>,
    created_at: String,
    updated_at: String,
    sent_at: Option<String>,
}

impl ReminderRaw {
    fn try_into_domain(self) -> anyhow::Result<Reminder> {
        let payload: ReminderPayload = serde_json::from_str(&self.payload_json)?;
        Ok(Reminder {
            id: self.id.parse::<ID>()?,
            title: self.title,
            message: self.message,
            target_time: parse_utc_iso(&self.target_time)?,
            earliest_run: parse_utc_iso(&self.earliest_run)?,
            payload,
            webhook_url: self.webhook_url,
            status: self.status.parse::<ReminderStatus>()?,
            attempts: self.attempts,
            last_error: self.last_error,
            created_at: parse_utc_iso(&self.created_at)?,
            updated_at: parse_utc_iso(&self.updated_at)?,
            sent_at: self.sent_at.as_deref().map(parse_utc_iso).transpose()?,
        })
    }
}

#[async_trait::async_trait]
impl IReminderRepo for SqliteReminderRepo {
    async fn create(
        &self,
        draft: NewReminder,
        webhook_url: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Reminder> {
        let reminder = Reminder::new(draft, webhook_url, now);
        sqlx::query(
            r#"
            INSERT INTO reminders
                (id, title, message, target_time, earliest_run, payload_json, webhook_url,
                 status, attempts, last_error, created_at, updated_at, sent_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NULL, $10, $11, NULL)
            "#,
        )
        .bind(reminder.id.as_string())
        .bind(&reminder.title)
        .bind(&reminder.message)
        .bind(to_utc_iso(&reminder.target_time))
        .bind(to_utc_iso(&reminder.earliest_run))
        .bind(serde_json::to_string(&reminder.payload)?)
        .bind(&reminder.webhook_url)
        .bind(reminder.status.as_str())
        .bind(reminder.attempts)
        .bind(to_utc_iso(&reminder.created_at))
        .bind(to_utc_iso(&reminder.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(reminder)
    }

    async fn find(&self, reminder_id: &ID) -> Option<Reminder> {
        let raw: ReminderRaw = match sqlx::query_as("SELECT * FROM reminders WHERE id = $1")
            .bind(reminder_id.as_string())
            .fetch_optional(&self.pool)
            .await
        {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                error!("Find reminder {} failed: {:?}", reminder_id, e);
                return None;
            }
        };
        match raw.try_into_domain() {
            Ok(reminder) => Some(reminder),
            Err(e) => {
                error!("Stored reminder {} is corrupt: {:?}", reminder_id, e);
                None
            }
        }
    }

    async fn list(
        &self,
        status: Option<ReminderStatus>,
        limit: i64,
    ) -> anyhow::Result<Vec<Reminder>> {
        let limit = clamp_limit(limit);
        let raws: Vec<ReminderRaw> = match status {
            Some(status) => {
                sqlx::query_as(
                    "SELECT * FROM reminders WHERE status = $1 ORDER BY earliest_run ASC LIMIT $2",
                )
                .bind(status.as_str())
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM reminders ORDER BY earliest_run ASC LIMIT $1")
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        raws.into_iter().map(|raw| raw.try_into_domain()).collect()
    }

    async fn acquire_due(&self, now: DateTime<Utc>, limit: i64) -> anyhow::Result<Vec<Reminder>> {
        let limit = clamp_limit(limit);
        let now = to_utc_iso(&now);
        let mut conn = self.pool.acquire().await?;

        // An immediate transaction takes the write lock up front so that
        // concurrent claimers serialize instead of both reading the same
        // pending rows.
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
        match Self::claim_batch(&mut conn, &now, limit).await {
            Ok(raws) => {
                sqlx::query("COMMIT").execute(&mut *conn).await?;
                raws.into_iter().map(|raw| raw.try_into_domain()).collect()
            }
            Err(e) => {
                if sqlx::query("ROLLBACK").execute(&mut *conn).await.is_err() {
                    // The connection still holds the write transaction and
                    // must not go back to the pool
                    let _ = conn.detach().close().await;
                }
                Err(e)
            }
        }
    }

    async fn mark_sent(
        &self,
        reminder_id: &ID,
        attempts: i64,
        sent_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE reminders
            SET status = 'sent', attempts = $1, sent_at = $2, updated_at = $2, last_error = NULL
            WHERE id = $3 AND status = 'dispatching'
            "#,
        )
        .bind(attempts)
        .bind(to_utc_iso(&sent_at))
        .bind(reminder_id.as_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_failure(
        &self,
        reminder_id: &ID,
        attempts: i64,
        next_attempt: DateTime<Utc>,
        error: &str,
        updated_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE reminders
            SET status = 'pending', attempts = $1, earliest_run = $2, last_error = $3, updated_at = $4
            WHERE id = $5 AND status = 'dispatching'
            "#,
        )
        .bind(attempts)
        .bind(to_utc_iso(&next_attempt))
        .bind(truncate_error(error))
        .bind(to_utc_iso(&updated_at))
        .bind(reminder_id.as_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn cancel(&self, reminder_id: &ID, cancelled_at: DateTime<Utc>) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE reminders
            SET status = 'cancelled', updated_at = $1
            WHERE id = $2 AND status NOT IN ('sent', 'cancelled')
            "#,
        )
        .bind(to_utc_iso(&cancelled_at))
        .bind(reminder_id.as_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
