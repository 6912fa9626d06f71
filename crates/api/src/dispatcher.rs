use nudge_domain::Reminder;
use nudge_infra::{NudgeContext, ReminderWebhookSender, WebhookClient};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Background loop that claims due reminders and posts them to their
/// webhooks.
///
/// At most one loop runs per dispatcher. A storage error stops the loop; the
/// next `ensure_running` call starts a fresh one.
pub struct ReminderDispatcher {
    ctx: NudgeContext,
    sender: ReminderWebhookSender,
    inner: tokio::sync::Mutex<DispatcherHandle>,
}

struct DispatcherHandle {
    task: Option<JoinHandle<()>>,
    stop: CancellationToken,
}

impl ReminderDispatcher {
    pub fn new(ctx: NudgeContext) -> Self {
        let client = WebhookClient::new(ctx.config.http_timeout);
        Self {
            ctx,
            sender: ReminderWebhookSender::new(client),
            inner: tokio::sync::Mutex::new(DispatcherHandle {
                task: None,
                stop: CancellationToken::new(),
            }),
        }
    }

    /// Starts the dispatch loop unless one is already running. Returns
    /// whether a new loop was started.
    pub async fn ensure_running(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if let Some(task) = &inner.task {
            if !task.is_finished() {
                return false;
            }
        }

        let stop = CancellationToken::new();
        let ctx = self.ctx.clone();
        let sender = self.sender.clone();
        let loop_stop = stop.clone();
        inner.task = Some(tokio::spawn(async move {
            info!("Reminder dispatch loop started");
            run_loop(ctx, sender, loop_stop).await;
            info!("Reminder dispatch loop stopped");
        }));
        inner.stop = stop;
        true
    }

    /// Signals the loop to stop and waits for it to finish
    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        inner.stop.cancel();
        if let Some(task) = inner.task.take() {
            if let Err(e) = task.await {
                error!("Reminder dispatch loop panicked: {:?}", e);
            }
        }
    }
}

async fn run_loop(ctx: NudgeContext, sender: ReminderWebhookSender, stop: CancellationToken) {
    loop {
        let now = ctx.sys.now();
        let batch = match ctx
            .repos
            .reminders
            .acquire_due(now, ctx.config.dispatch_batch_size)
            .await
        {
            Ok(batch) => batch,
            Err(e) => {
                error!("Acquiring due reminders failed, stopping dispatch loop: {:?}", e);
                return;
            }
        };

        if batch.is_empty() {
            if stop.is_cancelled() {
                return;
            }
            tokio::select! {
                _ = stop.cancelled() => return,
                _ = tokio::time::sleep(ctx.config.poll_interval) => {}
            }
            continue;
        }

        // Claimed reminders are always processed, even during shutdown, so
        // that none are left stranded in `dispatching`.
        for reminder in batch {
            if let Err(e) = process_reminder(&ctx, &sender, reminder).await {
                error!("Recording dispatch outcome failed, stopping dispatch loop: {:?}", e);
                return;
            }
        }
    }
}

async fn process_reminder(
    ctx: &NudgeContext,
    sender: &ReminderWebhookSender,
    reminder: Reminder,
) -> anyhow::Result<()> {
    let attempts_made = reminder.attempts + 1;
    match sender.dispatch(&reminder).await {
        Ok(()) => {
            ctx.repos
                .reminders
                .mark_sent(&reminder.id, attempts_made, ctx.sys.now())
                .await?;
            info!(
                "Delivered reminder {} on attempt {}",
                reminder.id, attempts_made
            );
        }
        Err(e) => {
            let delay = retry_delay(ctx.config.retry_base, ctx.config.retry_max, reminder.attempts);
            let now = ctx.sys.now();
            let next_attempt = now + chrono::Duration::milliseconds(delay.as_millis() as i64);
            warn!(
                "Delivering reminder {} failed on attempt {}, retrying in {:?}: {}",
                reminder.id, attempts_made, delay, e
            );
            ctx.repos
                .reminders
                .record_failure(&reminder.id, attempts_made, next_attempt, &e.to_string(), now)
                .await?;
        }
    }
    Ok(())
}

/// Exponential backoff, `base * 2^prev_attempts` capped at `max`
fn retry_delay(base: Duration, max: Duration, prev_attempts: i64) -> Duration {
    let exp = prev_attempts.clamp(0, 32) as u32;
    base.saturating_mul(2u32.saturating_pow(exp)).min(max)
}
