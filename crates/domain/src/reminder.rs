use crate::shared::entity::{Entity, ID};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

/// Upper bound for the stored `last_error` description
pub const MAX_LAST_ERROR_LEN: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    Pending,
    Dispatching,
    Sent,
    Cancelled,
}

impl ReminderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Dispatching => "dispatching",
            Self::Sent => "sent",
            Self::Cancelled => "cancelled",
        }
    }

    /// `sent` and `cancelled` records are immutable except for read
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Sent | Self::Cancelled)
    }
}

impl Display for ReminderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum InvalidStatusError {
    #[error("Status: {0} is not a valid reminder status")]
    Unknown(String),
}

impl FromStr for ReminderStatus {
    type Err = InvalidStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "dispatching" => Ok(Self::Dispatching),
            "sent" => Ok(Self::Sent),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(InvalidStatusError::Unknown(s.to_string())),
        }
    }
}

/// Channel-specific payload forwarded verbatim to the webhook.
/// Downstream automation requires exactly these two fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReminderPayload {
    pub to: String,
    pub message: String,
}

/// A validated schedule request, ready to be persisted
#[derive(Debug, Clone)]
pub struct NewReminder {
    pub title: String,
    pub message: String,
    pub target_time: DateTime<Utc>,
    pub payload: ReminderPayload,
}

/// A `Reminder` is a persisted job describing a future webhook delivery.
///
/// Records returned from storage are independent snapshots; the store owns
/// the durable copy.
#[derive(Debug, Clone, PartialEq)]
pub struct Reminder {
    pub id: ID,
    pub title: String,
    pub message: String,
    /// The instant the reminder is logically due
    pub target_time: DateTime<Utc>,
    /// The instant the reminder becomes eligible for the next delivery
    /// attempt. Equal to `target_time` at creation and pushed forward by the
    /// retry backoff after each failed delivery. Only consulted while the
    /// status is `pending`.
    pub earliest_run: DateTime<Utc>,
    pub payload: ReminderPayload,
    pub webhook_url: String,
    pub status: ReminderStatus,
    /// Number of delivery attempts made so far
    pub attempts: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl Reminder {
    pub fn new(draft: NewReminder, webhook_url: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: ID::new(),
            title: draft.title,
            message: draft.message,
            target_time: draft.target_time,
            earliest_run: draft.target_time,
            payload: draft.payload,
            webhook_url: webhook_url.to_string(),
            status: ReminderStatus::Pending,
            attempts: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
            sent_at: None,
        }
    }
}

impl Entity<ID> for Reminder {
    fn id(&self) -> ID {
        self.id.clone()
    }
}

/// Bounds a failure description to `MAX_LAST_ERROR_LEN` bytes without
/// splitting a UTF-8 character
pub fn truncate_error(error: &str) -> String {
    if error.len() <= MAX_LAST_ERROR_LEN {
        return error.to_string();
    }
    let mut end = MAX_LAST_ERROR_LEN;
    while !error.is_char_boundary(end) {
        end -= 1;
    }
    error[..end].to_string()
}
