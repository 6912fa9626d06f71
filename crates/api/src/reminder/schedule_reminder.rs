use crate::error::NudgeError;
use crate::shared::usecase::UseCase;
use chrono::{DateTime, Utc};
use nudge_domain::{NewReminder, Reminder, ReminderPayload};
use nudge_infra::NudgeContext;
use std::time::Duration;

/// Validates and persists a new reminder as `pending`
#[derive(Debug)]
pub struct ScheduleReminderUseCase {
    pub title: String,
    pub message: String,
    pub target_time: DateTime<Utc>,
    pub payload: ReminderPayload,
}

#[derive(Debug)]
pub enum UseCaseError {
    EmptyField(&'static str),
    TooSoon { min_lead: Duration },
    StorageError,
}

impl From<UseCaseError> for NudgeError {
    fn from(e: UseCaseError) -> Self {
        match e {
            UseCaseError::EmptyField(field) => {
                Self::BadClientData(format!("Field: {} cannot be empty", field))
            }
            UseCaseError::TooSoon { min_lead } => Self::BadClientData(format!(
                "Reminders must be scheduled at least {} seconds in the future",
                min_lead.as_secs_f64()
            )),
            UseCaseError::StorageError => Self::InternalError,
        }
    }
}

#[async_trait::async_trait]
impl UseCase for ScheduleReminderUseCase {
    type Response = Reminder;
    type Error = UseCaseError;

    const NAME: &'static str = "ScheduleReminder";

    async fn execute(&mut self, ctx: &NudgeContext) -> Result<Self::Response, Self::Error> {
        // Surrounding whitespace is never persisted
        let title = self.title.trim();
        let message = self.message.trim();
        let payload_to = self.payload.to.trim();
        let payload_message = self.payload.message.trim();

        if title.is_empty() {
            return Err(UseCaseError::EmptyField("title"));
        }
        if message.is_empty() {
            return Err(UseCaseError::EmptyField("message"));
        }
        if payload_to.is_empty() {
            return Err(UseCaseError::EmptyField("payload.to"));
        }
        if payload_message.is_empty() {
            return Err(UseCaseError::EmptyField("payload.message"));
        }

        let now = ctx.sys.now();
        let far_enough = match (self.target_time - now).to_std() {
            Ok(lead) => lead > ctx.config.min_lead,
            // Negative lead, the target is in the past
            Err(_) => false,
        };
        if !far_enough {
            return Err(UseCaseError::TooSoon {
                min_lead: ctx.config.min_lead,
            });
        }

        let draft = NewReminder {
            title: title.to_string(),
            message: message.to_string(),
            target_time: self.target_time,
            payload: ReminderPayload {
                to: payload_to.to_string(),
                message: payload_message.to_string(),
            },
        };
        ctx.repos
            .reminders
            .create(draft, &ctx.config.reminder_webhook_url, now)
            .await
            .map_err(|_| UseCaseError::StorageError)
    }
}
