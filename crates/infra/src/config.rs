use std::env;
use std::time::Duration;

/// Where reminders are persisted
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// Embedded sqlite database file. The parent directory is created on
    /// startup when missing.
    Sqlite { path: String },
    /// Connection string for a postgres server. Only honored when the
    /// `postgres` feature is compiled in.
    Postgres { url: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    /// Sleep between empty dispatch polls
    pub poll_interval: Duration,
    /// Max reminders claimed per dispatch cycle
    pub dispatch_batch_size: i64,
    /// Per-request timeout for webhook deliveries
    pub http_timeout: Duration,
    /// First retry delay, doubled on every subsequent failure
    pub retry_base: Duration,
    /// Cap for the exponential retry delay
    pub retry_max: Duration,
    /// Reminders must be scheduled at least this far in the future
    pub min_lead: Duration,
    pub reminder_webhook_url: String,
    pub message_webhook_url: String,
    pub research_webhook_url: String,
}

impl Config {
    pub fn new() -> Self {
        let storage = match env::var("DATABASE_URL") {
            Ok(url) if !url.trim().is_empty() => StorageConfig::Postgres { url },
            _ => {
                let path = env::var("REMINDER_DB_PATH")
                    .unwrap_or_else(|_| "data/reminders.db".to_string());
                StorageConfig::Sqlite { path }
            }
        };

        let poll_interval = parse_secs("REMINDER_POLL_INTERVAL_SECONDS", 30, 1);
        let http_timeout = parse_secs("REMINDER_HTTP_TIMEOUT_SECONDS", 10, 1);
        let retry_base = parse_secs("REMINDER_RETRY_BASE_SECONDS", 30, 1);
        let mut retry_max = parse_secs("REMINDER_RETRY_MAX_SECONDS", 600, 1);
        if retry_max < retry_base {
            tracing::warn!(
                "REMINDER_RETRY_MAX_SECONDS is below REMINDER_RETRY_BASE_SECONDS, raising it to {}s",
                retry_base.as_secs()
            );
            retry_max = retry_base;
        }
        let min_lead = parse_secs("REMINDER_MIN_LEAD_SECONDS", 5, 0);

        let dispatch_batch_size = match env::var("REMINDER_DISPATCH_BATCH_SIZE") {
            Ok(value) => match value.parse::<i64>() {
                Ok(size) if size >= 1 => size,
                _ => {
                    tracing::warn!(
                        "REMINDER_DISPATCH_BATCH_SIZE: {} is not a positive integer, using default: 10",
                        value
                    );
                    10
                }
            },
            Err(_) => 10,
        };

        // Each sender falls back to the more general webhook, then to an
        // example URL so an unconfigured deployment still runs
        let reminder_url = non_empty_env("REMINDER_WEBHOOK_URL");
        let message_webhook_url = non_empty_env("MESSAGE_WEBHOOK_URL")
            .or_else(|| reminder_url.clone())
            .unwrap_or_else(|| "https://example.com/webhooks/messages".to_string());
        let research_webhook_url = non_empty_env("DEEP_RESEARCH_WEBHOOK_URL")
            .or_else(|| non_empty_env("MESSAGE_WEBHOOK_URL"))
            .or_else(|| reminder_url.clone())
            .unwrap_or_else(|| "https://example.com/webhooks/deep-research".to_string());
        let reminder_webhook_url = reminder_url
            .unwrap_or_else(|| "https://example.com/webhooks/reminders".to_string());

        Self {
            storage,
            poll_interval,
            dispatch_batch_size,
            http_timeout,
            retry_base,
            retry_max,
            min_lead,
            reminder_webhook_url,
            message_webhook_url,
            research_webhook_url,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_secs(key: &str, default: u64, min: u64) -> Duration {
    let secs = match env::var(key) {
        Ok(value) => match value.parse::<u64>() {
            Ok(secs) if secs >= min => secs,
            _ => {
                tracing::warn!(
                    "{}: {} is not a valid number of seconds, using default: {}",
                    key,
                    value,
                    default
                );
                default
            }
        },
        Err(_) => default,
    };
    Duration::from_secs(secs)
}
