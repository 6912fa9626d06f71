use super::{clamp_limit, IReminderRepo};
use chrono::{DateTime, Utc};
use nudge_domain::{
    truncate_error, NewReminder, Reminder, ReminderPayload, ReminderStatus, ID,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::error;

/// Postgres-backed reminder store.
///
/// Claiming relies on `FOR UPDATE SKIP LOCKED` so that multiple dispatcher
/// processes can poll the same table without handing out duplicates.
pub struct PostgresReminderRepo {
    pool: PgPool,
}

impl PostgresReminderRepo {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new().max_connections(5).connect(url).await?;
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
                target_time TIMESTAMPTZ NOT NULL,
                earliest_run TIMESTAMPTZ NOT NULL,
                payload_json JSONB NOT NULL,
                webhook_url TEXT NOT NULL,
                status TEXT NOT NULL,
                attempts BIGINT NOT NULL DEFAULT 0,
                last_error TEXT,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                sent_at TIMESTAMPTZ
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
}

#[derive(Debug, FromRow)]
struct ReminderRaw {
    id: String,
    title: String,
    message: String,
    target_time: DateTime<Utc>,
    earliest_run: DateTime<Utc>,
    payload_json: Json<ReminderPayload>,
    webhook_url: String,
    status: String,
    attempts: i64,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    sent_at: Option<DateTime<Utc>>,
}

impl ReminderRaw {
    fn try_into_domain(self) -> anyhow::Result<Reminder> {
        Ok(Reminder {
            id: self.id.parse::<ID>()?,
            title: self.title,
            message: self.message,
            target_time: self.target_time,
            earliest_run: self.earliest_run,
            payload: self.payload_json.0,
            webhook_url: self.webhook_url,
            status: self.status.parse::<ReminderStatus>()?,
            attempts: self.attempts,
            last_error: self.last_error,
            created_at: self.created_at,
            updated_at: self.updated_at,
            sent_at: self.sent_at,
        })
    }
}

#[async_trait::async_trait]
impl IReminderRepo for PostgresReminderRepo {
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
        .bind(reminder.target_time)
        .bind(reminder.earliest_run)
        .bind(Json(&reminder.payload))
        .bind(&reminder.webhook_url)
        .bind(reminder.status.as_str())
        .bind(reminder.attempts)
        .bind(reminder.created_at)
        .bind(reminder.updated_at)
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
        let mut tx = self.pool.begin().await?;

        let mut due: Vec<ReminderRaw> = sqlx::query_as(
            r#"
            SELECT * FROM reminders
            WHERE status = 'pending' AND earliest_run <= $1
            ORDER BY earliest_run ASC
            LIMIT $2
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&mut *tx)
        .await?;

        let ids = due.iter().map(|raw| raw.id.clone()).collect::<Vec<_>>();
        if !ids.is_empty() {
            sqlx::query(
                "UPDATE reminders SET status = 'dispatching', updated_at = $1 WHERE id = ANY($2)",
            )
            .bind(now)
            .bind(&ids)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        for raw in due.iter_mut() {
            raw.status = ReminderStatus::Dispatching.as_str().to_string();
            raw.updated_at = now;
        }
        due.into_iter().map(|raw| raw.try_into_domain()).collect()
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
        .bind(sent_at)
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
        .bind(next_attempt)
        .bind(truncate_error(error))
        .bind(updated_at)
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
        .bind(cancelled_at)
        .bind(reminder_id.as_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
