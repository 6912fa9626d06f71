use crate::error::NudgeError;
use crate::shared::usecase::UseCase;
use nudge_domain::{Reminder, ReminderStatus};
use nudge_infra::NudgeContext;

/// Pages through stored reminders ordered by when they run next
#[derive(Debug)]
pub struct ListRemindersUseCase {
    pub status: Option<ReminderStatus>,
    pub limit: i64,
}

#[derive(Debug)]
pub enum UseCaseError {
    StorageError,
}

impl From<UseCaseError> for NudgeError {
    fn from(e: UseCaseError) -> Self {
        match e {
            UseCaseError::StorageError => Self::InternalError,
        }
    }
}

#[async_trait::async_trait]
impl UseCase for ListRemindersUseCase {
    type Response = Vec<Reminder>;
    type Error = UseCaseError;

    const NAME: &'static str = "ListReminders";

    async fn execute(&mut self, ctx: &NudgeContext) -> Result<Self::Response, Self::Error> {
        ctx.repos
            .reminders
            .list(self.status, self.limit)
            .await
            .map_err(|_| UseCaseError::StorageError)
    }
}
