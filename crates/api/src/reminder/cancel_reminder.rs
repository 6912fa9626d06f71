use crate::error::NudgeError;
use crate::shared::usecase::UseCase;
use nudge_domain::{Reminder, ReminderStatus, ID};
use nudge_infra::NudgeContext;

/// Cancels a reminder that has not yet been delivered
#[derive(Debug)]
pub struct CancelReminderUseCase {
    pub reminder_id: ID,
}

#[derive(Debug)]
pub enum UseCaseError {
    NotFound(ID),
    AlreadyFinished(ID, ReminderStatus),
    StorageError,
}

impl From<UseCaseError> for NudgeError {
    fn from(e: UseCaseError) -> Self {
        match e {
            UseCaseError::NotFound(id) => {
                Self::NotFound(format!("The reminder with id: {} was not found", id))
            }
            UseCaseError::AlreadyFinished(id, status) => Self::BadClientData(format!(
                "The reminder with id: {} is already {} and cannot be cancelled",
                id, status
            )),
            UseCaseError::StorageError => Self::InternalError,
        }
    }
}

#[async_trait::async_trait]
impl UseCase for CancelReminderUseCase {
    type Response = Reminder;
    type Error = UseCaseError;

    const NAME: &'static str = "CancelReminder";

    async fn execute(&mut self, ctx: &NudgeContext) -> Result<Self::Response, Self::Error> {
        let now = ctx.sys.now();
        let cancelled = ctx
            .repos
            .reminders
            .cancel(&self.reminder_id, now)
            .await
            .map_err(|_| UseCaseError::StorageError)?;

        let stored = ctx.repos.reminders.find(&self.reminder_id).await;
        match (cancelled, stored) {
            (true, Some(reminder)) => Ok(reminder),
            (false, Some(reminder)) => Err(UseCaseError::AlreadyFinished(
                self.reminder_id.clone(),
                reminder.status,
            )),
            (_, None) => Err(UseCaseError::NotFound(self.reminder_id.clone())),
        }
    }
}
