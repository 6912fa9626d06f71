use thiserror::Error;

#[derive(Debug, Error)]
pub enum NudgeError {
    #[error("Internal server error")]
    InternalError,
    #[error("Invalid data provided: Error message: `{0}`")]
    BadClientData(String),
    #[error("404 Not found. Error message: {0}")]
    NotFound(String),
    #[error("Webhook delivery failed: {0}")]
    Delivery(String),
}
