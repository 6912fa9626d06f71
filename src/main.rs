mod telemetry;

use nudge_api::ReminderService;
use nudge_infra::setup_context;
use telemetry::{get_subscriber, init_subscriber};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Optional .env file for local development
    dotenvy::dotenv().ok();

    let subscriber = get_subscriber("nudge".into(), "info".into(), std::io::stdout);
    init_subscriber(subscriber);

    let context = setup_context().await?;
    let service = ReminderService::new(context);
    service.ensure_dispatcher_running().await;
    info!("Reminder engine started");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down ...");
    service.shutdown().await;

    Ok(())
}
