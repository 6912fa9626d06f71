use nudge_domain::{to_utc_iso, Reminder, ReminderPayload, ID};
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Field: {field} cannot be empty")]
    EmptyField { field: &'static str },
    #[error("Webhook request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Webhook at {url} rejected the delivery with status {status}")]
    Rejected { url: String, status: u16 },
}

/// Shared HTTP client for all webhook deliveries. Cheap to clone.
#[derive(Clone)]
pub struct WebhookClient {
    client: reqwest::Client,
}

impl WebhookClient {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            // Building with static options cannot fail at runtime
            .unwrap_or_default();
        Self { client }
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        headers: &[(&'static str, String)],
        body: &T,
    ) -> Result<(), DeliveryError> {
        let mut request = self.client.post(url).json(body);
        for (name, value) in headers {
            request = request.header(*name, value);
        }
        let response = request.send().await.map_err(|source| DeliveryError::Request {
            url: url.to_string(),
            source,
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Rejected {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

/// Delivers due reminders to the configured webhook
#[derive(Clone)]
pub struct ReminderWebhookSender {
    client: WebhookClient,
}

impl ReminderWebhookSender {
    pub fn new(client: WebhookClient) -> Self {
        Self { client }
    }

    /// Posts the reminder to its webhook. `X-Reminder-Attempts` carries the
    /// number of attempts made before this one.
    pub async fn dispatch(&self, reminder: &Reminder) -> Result<(), DeliveryError> {
        let body = json!({
            "reminder_id": reminder.id.as_string(),
            "title": reminder.title,
            "message": reminder.message,
            "target_time_iso": to_utc_iso(&reminder.target_time),
            "payload": reminder.payload,
        });
        let headers = [
            ("X-Reminder-Id", reminder.id.as_string()),
            ("X-Reminder-Attempts", reminder.attempts.to_string()),
        ];
        self.client
            .post_json(&reminder.webhook_url, &headers, &body)
            .await
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageReceipt {
    pub message_id: String,
}

/// Pushes a one-shot message through the outbound message webhook
#[derive(Clone)]
pub struct MessageSender {
    client: WebhookClient,
    webhook_url: String,
}

impl MessageSender {
    pub fn new(client: WebhookClient, webhook_url: String) -> Self {
        Self {
            client,
            webhook_url,
        }
    }

    pub async fn send(&self, to: &str, message: &str) -> Result<MessageReceipt, DeliveryError> {
        if to.trim().is_empty() {
            return Err(DeliveryError::EmptyField { field: "to" });
        }
        if message.trim().is_empty() {
            return Err(DeliveryError::EmptyField { field: "message" });
        }

        let message_id = ID::new().as_string();
        let payload = ReminderPayload {
            to: to.to_string(),
            message: message.to_string(),
        };
        let headers = [("X-Message-Id", message_id.clone())];
        self.client
            .post_json(&self.webhook_url, &headers, &payload)
            .await?;
        info!("Delivered message {} to {}", message_id, to);
        Ok(MessageReceipt { message_id })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResearchReceipt {
    pub research_id: String,
}

/// Kicks off a deep research run through its webhook
#[derive(Clone)]
pub struct ResearchSender {
    client: WebhookClient,
    webhook_url: String,
}

impl ResearchSender {
    pub fn new(client: WebhookClient, webhook_url: String) -> Self {
        Self {
            client,
            webhook_url,
        }
    }

    pub async fn trigger(&self, topic: &str, email: &str) -> Result<ResearchReceipt, DeliveryError> {
        if topic.trim().is_empty() {
            return Err(DeliveryError::EmptyField { field: "topic" });
        }
        if email.trim().is_empty() {
            return Err(DeliveryError::EmptyField { field: "email" });
        }

        let research_id = ID::new().as_string();
        // The receiving automation expects a single-element array with these
        // exact field names.
        let body = json!([{
            "Search Topic": topic,
            "Email": email,
        }]);
        let headers = [("X-Deep-Research-Id", research_id.clone())];
        self.client
            .post_json(&self.webhook_url, &headers, &body)
            .await?;
        info!("Triggered research {} for {}", research_id, email);
        Ok(ResearchReceipt { research_id })
    }
}
