mod dispatcher;
mod dtos;
mod error;
mod message;
mod reminder;
mod research;
mod shared;

pub use dispatcher::ReminderDispatcher;
pub use dtos::{CancelledReminderDTO, ReminderDTO};
pub use error::NudgeError;

use crate::message::send_message::SendMessageUseCase;
use crate::reminder::cancel_reminder::CancelReminderUseCase;
use crate::reminder::list_reminders::ListRemindersUseCase;
use crate::reminder::schedule_reminder::ScheduleReminderUseCase;
use crate::research::trigger_research::TriggerResearchUseCase;
use crate::shared::usecase::execute;
use chrono::{DateTime, Utc};
use nudge_domain::{ReminderPayload, ReminderStatus, ID};
use nudge_infra::{MessageReceipt, NudgeContext, ResearchReceipt};
use std::sync::Arc;

/// Application entry point for scheduling and delivering reminders.
///
/// Owns the background dispatcher. Scheduling a reminder makes sure the
/// dispatch loop is running, so callers never have to manage it themselves.
pub struct ReminderService {
    ctx: NudgeContext,
    dispatcher: Arc<ReminderDispatcher>,
}

impl ReminderService {
    pub fn new(ctx: NudgeContext) -> Self {
        let dispatcher = Arc::new(ReminderDispatcher::new(ctx.clone()));
        Self { ctx, dispatcher }
    }

    pub async fn schedule_reminder(
        &self,
        title: String,
        message: String,
        target_time: DateTime<Utc>,
        payload: ReminderPayload,
    ) -> Result<ReminderDTO, NudgeError> {
        let usecase = ScheduleReminderUseCase {
            title,
            message,
            target_time,
            payload,
        };
        let reminder = execute(usecase, &self.ctx).await?;
        self.dispatcher.ensure_running().await;
        Ok(ReminderDTO::new(reminder))
    }

    pub async fn list_reminders(
        &self,
        status: Option<ReminderStatus>,
        limit: i64,
    ) -> Result<Vec<ReminderDTO>, NudgeError> {
        let usecase = ListRemindersUseCase { status, limit };
        let reminders = execute(usecase, &self.ctx).await?;
        Ok(reminders.into_iter().map(ReminderDTO::new).collect())
    }

    pub async fn cancel_reminder(
        &self,
        reminder_id: ID,
    ) -> Result<CancelledReminderDTO, NudgeError> {
        let usecase = CancelReminderUseCase { reminder_id };
        let reminder = execute(usecase, &self.ctx).await?;
        Ok(CancelledReminderDTO::new(reminder))
    }

    pub async fn send_message(
        &self,
        to: String,
        message: String,
    ) -> Result<MessageReceipt, NudgeError> {
        let usecase = SendMessageUseCase { to, message };
        Ok(execute(usecase, &self.ctx).await?)
    }

    pub async fn trigger_research(
        &self,
        topic: String,
        email: String,
    ) -> Result<ResearchReceipt, NudgeError> {
        let usecase = TriggerResearchUseCase { topic, email };
        Ok(execute(usecase, &self.ctx).await?)
    }

    /// Starts the dispatch loop when it is not already running. Called on
    /// startup so reminders persisted by a previous run get delivered.
    pub async fn ensure_dispatcher_running(&self) -> bool {
        self.dispatcher.ensure_running().await
    }

    /// Stops the dispatch loop and waits for in-flight deliveries to settle
    pub async fn shutdown(&self) {
        self.dispatcher.shutdown().await;
    }
}
