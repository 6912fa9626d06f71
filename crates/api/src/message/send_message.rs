use crate::error::NudgeError;
use crate::shared::usecase::UseCase;
use nudge_infra::{DeliveryError, MessageReceipt, MessageSender, NudgeContext, WebhookClient};

/// Delivers a one-shot message right away, no persistence involved
#[derive(Debug)]
pub struct SendMessageUseCase {
    pub to: String,
    pub message: String,
}

#[derive(Debug)]
pub enum UseCaseError {
    Delivery(DeliveryError),
}

impl From<UseCaseError> for NudgeError {
    fn from(e: UseCaseError) -> Self {
        match e {
            UseCaseError::Delivery(DeliveryError::EmptyField { field }) => {
                Self::BadClientData(format!("Field: {} cannot be empty", field))
            }
            UseCaseError::Delivery(e) => Self::Delivery(e.to_string()),
        }
    }
}

#[async_trait::async_trait]
impl UseCase for SendMessageUseCase {
    type Response = MessageReceipt;
    type Error = UseCaseError;

    const NAME: &'static str = "SendMessage";

    async fn execute(&mut self, ctx: &NudgeContext) -> Result<Self::Response, Self::Error> {
        let client = WebhookClient::new(ctx.config.http_timeout);
        let sender = MessageSender::new(client, ctx.config.message_webhook_url.clone());
        sender
            .send(&self.to, &self.message)
            .await
            .map_err(UseCaseError::Delivery)
    }
}
