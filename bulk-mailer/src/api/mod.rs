//! Email provider abstraction
//!
//! The dispatcher talks to the provider only through [`EmailApi`], so the
//! retry policy can be exercised against scripted doubles.

use async_trait::async_trait;
use thiserror::Error;

pub mod mailgun;

pub use mailgun::MailgunClient;

/// A fully rendered message for one recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Provider acknowledgement of an accepted message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// Provider message id, when the response carried one
    pub message_id: Option<String>,
}

/// Why one submission failed. Every variant is retryable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The request never produced a response (connect, TLS, timeout)
    #[error("network error: {0}")]
    Network(String),

    /// The provider answered with a non-2xx status
    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },
}

/// One message submission per call
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailApi: Send + Sync {
    /// Submit a message to the provider
    async fn submit(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, ApiError>;
}

#[async_trait]
impl<T: EmailApi + ?Sized> EmailApi for std::sync::Arc<T> {
    async fn submit(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, ApiError> {
        (**self).submit(message).await
    }
}
