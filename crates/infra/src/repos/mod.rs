mod reminder;

pub use reminder::{IReminderRepo, SqliteReminderRepo, MAX_LIST_LIMIT};

#[cfg(feature = "postgres")]
pub use reminder::PostgresReminderRepo;

use std::sync::Arc;

#[derive(Clone)]
pub struct Repos {
    pub reminders: Arc<dyn IReminderRepo>,
}

impl Repos {
    pub async fn create_sqlite(path: &str) -> anyhow::Result<Self> {
        tracing::info!("Opening sqlite reminder store at {} ...", path);
        let repo = SqliteReminderRepo::connect(path).await?;
        tracing::info!("Opened sqlite reminder store");
        Ok(Self {
            reminders: Arc::new(repo),
        })
    }

    #[cfg(feature = "postgres")]
    pub async fn create_postgres(url: &str) -> anyhow::Result<Self> {
        tracing::info!("Connecting to postgres reminder store ...");
        let repo = PostgresReminderRepo::connect(url).await?;
        tracing::info!("Connected to postgres reminder store");
        Ok(Self {
            reminders: Arc::new(repo),
        })
    }
}
