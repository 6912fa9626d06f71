pub mod webhook;

pub use webhook::{
    DeliveryError, MessageReceipt, MessageSender, ReminderWebhookSender, ResearchReceipt,
    ResearchSender, WebhookClient,
};
