//! Notification error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Relay rejected message: status={status}, body={body}")]
    Rejected { status: u16, body: String },

    #[error("Invalid e-mail address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Failed to build e-mail: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

pub type NotifyResult<T> = Result<T, NotifyError>;
