pub mod usecase;

#[cfg(test)]
pub(crate) mod test_helpers {
    use nudge_infra::{Config, NudgeContext, StorageConfig};
    use std::time::Duration;

    /// Context over a throwaway sqlite file with timings tightened for tests.
    /// The returned tempdir guard must be kept alive for the duration of the
    /// test.
    pub async fn setup_ctx() -> (NudgeContext, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("To create tempdir");
        let path = dir
            .path()
            .join("reminders.db")
            .to_str()
            .expect("Tempdir path to be valid utf-8")
            .to_string();
        let config = Config {
            storage: StorageConfig::Sqlite { path },
            poll_interval: Duration::from_millis(50),
            dispatch_batch_size: 10,
            http_timeout: Duration::from_secs(2),
            retry_base: Duration::from_millis(50),
            retry_max: Duration::from_millis(400),
            min_lead: Duration::from_millis(200),
            reminder_webhook_url: "http://127.0.0.1:9/reminders".into(),
            message_webhook_url: "http://127.0.0.1:9/messages".into(),
            research_webhook_url: "http://127.0.0.1:9/research".into(),
        };
        let ctx = NudgeContext::create(config)
            .await
            .expect("To create context");
        (ctx, dir)
    }
}
