use crate::error::NudgeError;
use crate::shared::usecase::UseCase;
use nudge_infra::{DeliveryError, NudgeContext, ResearchReceipt, ResearchSender, WebhookClient};

/// Kicks off a deep research run for a topic, results are mailed separately
#[derive(Debug)]
pub struct TriggerResearchUseCase {
    pub topic: String,
    pub email: String,
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
impl UseCase for TriggerResearchUseCase {
    type Response = ResearchReceipt;
    type Error = UseCaseError;

    const NAME: &'static str = "TriggerResearch";

    async fn execute(&mut self, ctx: &NudgeContext) -> Result<Self::Response, Self::Error> {
        let client = WebhookClient::new(ctx.config.http_timeout);
        let sender = ResearchSender::new(client, ctx.config.research_webhook_url.clone());
        sender
            .trigger(&self.topic, &self.email)
            .await
            .map_err(UseCaseError::Delivery)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::test_helpers::setup_ctx;

    #[tokio::test]
    async fn surfaces_blank_field_validation() {
        let (ctx, _guard) = setup_ctx().await;
        let mut uc = TriggerResearchUseCase {
            topic: "  ".into(),
            email: "a@b.c".into(),
        };
        assert!(matches!(
            uc.execute(&ctx).await,
            Err(UseCaseError::Delivery(DeliveryError::EmptyField {
                field: "topic"
            }))
        ));
    }

    #[tokio::test]
    async fn delivery_failures_surface_to_the_caller() {
        // The test webhook url points at the discard port, nothing listens
        let (ctx, _guard) = setup_ctx().await;
        let mut uc = TriggerResearchUseCase {
            topic: "rust async runtimes".into(),
            email: "a@b.c".into(),
        };
        assert!(matches!(
            uc.execute(&ctx).await,
            Err(UseCaseError::Delivery(DeliveryError::Request { .. }))
        ));
    }
}
