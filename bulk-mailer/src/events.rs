//! Campaign events
//!
//! The dispatcher and runner describe what happens as discrete
//! [`CampaignEvent`]s and hand them to an injected [`EventSink`]. Formatting
//! and persistence belong to the sink.

use crate::dispatch::CampaignStatistics;
use std::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Something worth recording about a campaign
#[derive(Debug, Clone, PartialEq)]
pub enum CampaignEvent {
    CampaignStarted {
        recipients: usize,
        dry_run: bool,
    },
    AttemptStarted {
        recipient: String,
        attempt: u32,
        max_attempts: u32,
    },
    AttemptSucceeded {
        recipient: String,
        attempt: u32,
        message_id: Option<String>,
    },
    AttemptFailed {
        recipient: String,
        attempt: u32,
        error: String,
        will_retry: bool,
    },
    /// The remaining retries were abandoned because of an interrupt
    RetriesAbandoned {
        recipient: String,
        attempts: u32,
    },
    RecipientFailed {
        recipient: String,
        attempts: u32,
        error: String,
    },
    RecipientSkipped {
        recipient: String,
        reason: String,
    },
    /// Dry run: what would have been sent
    Previewed {
        recipient: String,
        subject: String,
        html: String,
    },
    Interrupted {
        processed: usize,
    },
    CampaignSummary {
        statistics: CampaignStatistics,
    },
}

/// Destination for campaign events
pub trait EventSink: Send + Sync {
    fn record(&self, event: CampaignEvent);
}

/// Forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn record(&self, event: CampaignEvent) {
        match event {
            CampaignEvent::CampaignStarted { recipients, dry_run } => {
                info!(recipients, dry_run, "Starting campaign");
            }
            CampaignEvent::AttemptStarted {
                recipient,
                attempt,
                max_attempts,
            } => {
                debug!(%recipient, attempt, max_attempts, "Sending email");
            }
            CampaignEvent::AttemptSucceeded {
                recipient,
                attempt,
                message_id,
            } => {
                info!(
                    %recipient,
                    attempt,
                    message_id = message_id.as_deref().unwrap_or("-"),
                    "Email sent successfully"
                );
            }
            CampaignEvent::AttemptFailed {
                recipient,
                attempt,
                error,
                will_retry,
            } => {
                if will_retry {
                    warn!(%recipient, attempt, %error, "Send failed, will retry");
                } else {
                    error!(%recipient, attempt, %error, "Send failed");
                }
            }
            CampaignEvent::RetriesAbandoned { recipient, attempts } => {
                warn!(%recipient, attempts, "Interrupted, abandoning remaining retries");
            }
            CampaignEvent::RecipientFailed {
                recipient,
                attempts,
                error,
            } => {
                error!(%recipient, attempts, %error, "Giving up on recipient");
            }
            CampaignEvent::RecipientSkipped { recipient, reason } => {
                warn!(%recipient, %reason, "Skipping recipient");
            }
            CampaignEvent::Previewed {
                recipient,
                subject,
                html,
            } => {
                info!(%recipient, %subject, bytes = html.len(), "Dry run, not sending");
                debug!(%recipient, "Rendered body:\n{}", html);
            }
            CampaignEvent::Interrupted { processed } => {
                warn!(processed, "Campaign interrupted, stopping before the next recipient");
            }
            CampaignEvent::CampaignSummary { statistics } => {
                info!(
                    total = statistics.total,
                    sent = statistics.sent,
                    failed = statistics.failed,
                    skipped = statistics.skipped,
                    previewed = statistics.previewed,
                    elapsed_secs = statistics.elapsed.as_secs_f64(),
                    interrupted = statistics.interrupted,
                    "Campaign finished"
                );
            }
        }
    }
}

/// Keeps events in memory, in order
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<CampaignEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far
    pub fn events(&self) -> Vec<CampaignEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl EventSink for MemoryEventSink {
    fn record(&self, event: CampaignEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
