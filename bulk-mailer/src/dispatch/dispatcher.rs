//! Email dispatcher
//!
//! ```text
//! Pending → Attempting ─┬─ ok ─────────────────────────→ Sent
//!    │          ↑       ├─ err, attempts < max ── wait ─┘ (retry)
//!    │          └───────┘
//!    │                  └─ err, attempts == max ───────→ Failed
//!    └─ bad address / template ────────────────────────→ Skipped
//! ```

use crate::api::{ApiError, EmailApi, OutboundMessage};
use crate::config::CampaignConfig;
use crate::error::MailerError;
use crate::events::{CampaignEvent, EventSink};
use crate::recipients::RecipientRecord;
use crate::templates::{TemplateError, TemplateRenderer};
use crate::utils::validate_email;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Variable generated per recipient when the row does not supply one
pub const UNIQUE_CODE_VAR: &str = "unique_code";

/// Why a recipient was not attempted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("template error: {0}")]
    Template(#[from] TemplateError),
}

/// Final outcome for one recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendResult {
    Sent {
        recipient: String,
        attempts: u32,
    },
    Failed {
        recipient: String,
        attempts: u32,
        last_error: ApiError,
    },
    Skipped {
        recipient: String,
        reason: SkipReason,
    },
}

impl SendResult {
    /// Network attempts made; zero for skipped recipients
    pub fn attempts(&self) -> u32 {
        match self {
            SendResult::Sent { attempts, .. } | SendResult::Failed { attempts, .. } => *attempts,
            SendResult::Skipped { .. } => 0,
        }
    }
}

/// Delivers one recipient at a time through an [`EmailApi`]
pub struct EmailDispatcher<A> {
    api: A,
    config: Arc<CampaignConfig>,
    fixed_vars: HashMap<String, String>,
    sink: Arc<dyn EventSink>,
    shutdown: CancellationToken,
}

impl<A: EmailApi> EmailDispatcher<A> {
    pub fn new(api: A, config: Arc<CampaignConfig>, sink: Arc<dyn EventSink>) -> Self {
        let fixed_vars = config.fixed_variables();
        Self {
            api,
            config,
            fixed_vars,
            sink,
            shutdown: CancellationToken::new(),
        }
    }

    /// Abandon pending retries once `token` is cancelled
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn config(&self) -> &CampaignConfig {
        &self.config
    }

    /// Validate the address and render the message, without touching the network
    pub fn prepare(&self, record: &RecipientRecord) -> Result<OutboundMessage, SkipReason> {
        if let Err(e) = validate_email(&record.email) {
            let detail = match e {
                MailerError::InvalidEmail(detail) => detail,
                other => other.to_string(),
            };
            return Err(SkipReason::InvalidAddress(detail));
        }

        let vars = self.variables_for(record);
        let subject = TemplateRenderer::render(&self.config.subject, &vars)?;
        let html = TemplateRenderer::render(&self.config.template, &vars)?;

        Ok(OutboundMessage {
            from: self.config.sender_email.clone(),
            to: record.email.clone(),
            subject,
            html,
        })
    }

    /// Deliver one recipient, retrying retryable failures
    pub async fn send(&self, record: &RecipientRecord) -> SendResult {
        let recipient = record.identity();

        let message = match self.prepare(record) {
            Ok(message) => message,
            Err(reason) => {
                self.sink.record(CampaignEvent::RecipientSkipped {
                    recipient: recipient.clone(),
                    reason: reason.to_string(),
                });
                return SendResult::Skipped { recipient, reason };
            }
        };

        let max_attempts = self.config.max_attempts();
        let mut attempt = 1;

        loop {
            self.sink.record(CampaignEvent::AttemptStarted {
                recipient: recipient.clone(),
                attempt,
                max_attempts,
            });

            let error = match self.api.submit(&message).await {
                Ok(receipt) => {
                    self.sink.record(CampaignEvent::AttemptSucceeded {
                        recipient: recipient.clone(),
                        attempt,
                        message_id: receipt.message_id,
                    });
                    return SendResult::Sent {
                        recipient,
                        attempts: attempt,
                    };
                }
                Err(error) => error,
            };

            let will_retry = attempt < max_attempts;
            self.sink.record(CampaignEvent::AttemptFailed {
                recipient: recipient.clone(),
                attempt,
                error: error.to_string(),
                will_retry,
            });

            if will_retry && self.pause_before_retry().await {
                attempt += 1;
                continue;
            }

            if will_retry {
                self.sink.record(CampaignEvent::RetriesAbandoned {
                    recipient: recipient.clone(),
                    attempts: attempt,
                });
            }

            self.sink.record(CampaignEvent::RecipientFailed {
                recipient: recipient.clone(),
                attempts: attempt,
                error: error.to_string(),
            });
            return SendResult::Failed {
                recipient,
                attempts: attempt,
                last_error: error,
            };
        }
    }

    /// Row fields, then configured fixed variables, then a generated unique code
    fn variables_for(&self, record: &RecipientRecord) -> HashMap<String, String> {
        let mut vars = record.fields.clone();
        vars.extend(self.fixed_vars.clone());
        vars.entry(UNIQUE_CODE_VAR.to_string())
            .or_insert_with(|| rand::thread_rng().gen_range(10000..=99999).to_string());
        vars
    }

    /// Wait `retry_delay`; false if shutdown was requested first
    async fn pause_before_retry(&self) -> bool {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => false,
            _ = tokio::time::sleep(self.config.retry_pause()) => true,
        }
    }
}
