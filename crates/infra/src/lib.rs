mod config;
mod repos;
mod services;
mod system;

pub use config::{Config, StorageConfig};
#[cfg(feature = "postgres")]
pub use repos::PostgresReminderRepo;
pub use repos::{IReminderRepo, Repos, SqliteReminderRepo, MAX_LIST_LIMIT};
pub use services::{
    DeliveryError, MessageReceipt, MessageSender, ReminderWebhookSender, ResearchReceipt,
    ResearchSender, WebhookClient,
};
pub use system::{ISys, RealSys};

use std::sync::Arc;

#[derive(Clone)]
pub struct NudgeContext {
    pub repos: Repos,
    pub config: Config,
    pub sys: Arc<dyn ISys>,
}

impl NudgeContext {
    pub async fn create(config: Config) -> anyhow::Result<Self> {
        let repos = match &config.storage {
            StorageConfig::Sqlite { path } => Repos::create_sqlite(path).await?,
            #[cfg(feature = "postgres")]
            StorageConfig::Postgres { url } => Repos::create_postgres(url).await?,
            #[cfg(not(feature = "postgres"))]
            StorageConfig::Postgres { .. } => anyhow::bail!(
                "DATABASE_URL is set but this build was compiled without the postgres feature"
            ),
        };
        Ok(Self {
            repos,
            config,
            sys: Arc::new(RealSys {}),
        })
    }
}

/// Builds the application context from environment configuration
pub async fn setup_context() -> anyhow::Result<NudgeContext> {
    NudgeContext::create(Config::new()).await
}
