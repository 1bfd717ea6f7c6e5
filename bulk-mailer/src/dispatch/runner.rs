//! Campaign runner
//!
//! Walks the recipient list in order, one recipient at a time, and owns the
//! campaign counters.

use super::dispatcher::{EmailDispatcher, SendResult};
use crate::api::EmailApi;
use crate::events::{CampaignEvent, EventSink};
use crate::recipients::RecipientRecord;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Campaign counters
///
/// Outside dry runs `sent + failed + skipped == total`. In a dry run nothing
/// is sent, and `previewed + skipped == total`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CampaignStatistics {
    pub total: usize,
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
    pub previewed: usize,
    pub elapsed: Duration,
    /// Stopped early on an interrupt
    pub interrupted: bool,
}

impl CampaignStatistics {
    pub fn record(&mut self, result: &SendResult) {
        self.total += 1;
        match result {
            SendResult::Sent { .. } => self.sent += 1,
            SendResult::Failed { .. } => self.failed += 1,
            SendResult::Skipped { .. } => self.skipped += 1,
        }
    }
}

/// Sequential campaign driver
pub struct CampaignRunner<A> {
    dispatcher: EmailDispatcher<A>,
    sink: Arc<dyn EventSink>,
    shutdown: CancellationToken,
}

impl<A: EmailApi> CampaignRunner<A> {
    pub fn new(dispatcher: EmailDispatcher<A>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            dispatcher,
            sink,
            shutdown: CancellationToken::new(),
        }
    }

    /// Stop at the next recipient boundary once `token` is cancelled
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.dispatcher = self.dispatcher.with_shutdown(token.clone());
        self.shutdown = token;
        self
    }

    /// Process every recipient and return the final statistics
    ///
    /// With `dry_run` set each message is rendered and reported but the
    /// provider is never called and no delay is applied.
    pub async fn run(&self, recipients: &[RecipientRecord], dry_run: bool) -> CampaignStatistics {
        let started = Instant::now();
        let mut stats = CampaignStatistics::default();

        self.sink.record(CampaignEvent::CampaignStarted {
            recipients: recipients.len(),
            dry_run,
        });

        for (index, record) in recipients.iter().enumerate() {
            if self.shutdown.is_cancelled() {
                stats.interrupted = true;
                self.sink.record(CampaignEvent::Interrupted {
                    processed: stats.total,
                });
                break;
            }

            if dry_run {
                self.preview(record, &mut stats);
                continue;
            }

            let result = self.dispatcher.send(record).await;
            stats.record(&result);

            if index + 1 < recipients.len() {
                self.pause_between_recipients().await;
            }
        }

        stats.elapsed = started.elapsed();
        self.sink.record(CampaignEvent::CampaignSummary {
            statistics: stats.clone(),
        });
        stats
    }

    fn preview(&self, record: &RecipientRecord, stats: &mut CampaignStatistics) {
        stats.total += 1;
        let recipient = record.identity();

        match self.dispatcher.prepare(record) {
            Ok(message) => {
                stats.previewed += 1;
                self.sink.record(CampaignEvent::Previewed {
                    recipient,
                    subject: message.subject,
                    html: message.html,
                });
            }
            Err(reason) => {
                stats.skipped += 1;
                self.sink.record(CampaignEvent::RecipientSkipped {
                    recipient,
                    reason: reason.to_string(),
                });
            }
        }
    }

    /// Sleep `delay_between_emails`, cut short by shutdown
    async fn pause_between_recipients(&self) {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {}
            _ = tokio::time::sleep(self.dispatcher.config().send_delay()) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, DeliveryReceipt, MockEmailApi};
    use crate::config::CampaignConfig;
    use crate::events::MemoryEventSink;
    use secrecy::Secret;
    use std::collections::HashMap;

    fn test_config() -> Arc<CampaignConfig> {
        Arc::new(CampaignConfig {
            domain: "mg.example.com".to_string(),
            api_key: Secret::new("key-test".to_string()),
            sender_email: "team@example.com".to_string(),
            subject: "Hello".to_string(),
            template: "Hi {name}".to_string(),
            registration_link: String::new(),
            delay_between_emails: 0.0,
            max_retries: 2,
            retry_delay: 0.0,
            api_base_url: "http://localhost".to_string(),
            request_timeout_secs: 5,
        })
    }

    fn recipients(rows: &[(&str, Option<&str>)]) -> Vec<RecipientRecord> {
        rows.iter()
            .enumerate()
            .map(|(i, (email, name))| {
                let mut fields = HashMap::from([("email".to_string(), email.to_string())]);
                if let Some(name) = name {
                    fields.insert("name".to_string(), name.to_string());
                }
                RecipientRecord::new(i + 1, *email, fields)
            })
            .collect()
    }

    fn runner(api: MockEmailApi, sink: Arc<MemoryEventSink>) -> CampaignRunner<MockEmailApi> {
        let dispatcher = EmailDispatcher::new(api, test_config(), sink.clone());
        CampaignRunner::new(dispatcher, sink)
    }

    fn paced_runner(api: MockEmailApi, delay_secs: f64) -> CampaignRunner<MockEmailApi> {
        let mut config = (*test_config()).clone();
        config.delay_between_emails = delay_secs;
        let sink = Arc::new(MemoryEventSink::new());
        CampaignRunner::new(EmailDispatcher::new(api, Arc::new(config), sink.clone()), sink)
    }

    #[tokio::test]
    async fn test_mixed_outcomes_add_up() {
        let mut api = MockEmailApi::new();
        api.expect_submit().returning(|m| {
            if m.to == "down@b.com" {
                Err(ApiError::Status {
                    status: 503,
                    body: "unavailable".to_string(),
                })
            } else {
                Ok(DeliveryReceipt::default())
            }
        });
        let sink = Arc::new(MemoryEventSink::new());
        let list = recipients(&[
            ("a@b.com", Some("A")),
            ("not-an-email", Some("B")),
            ("down@b.com", Some("C")),
            ("d@b.com", None),
        ]);

        let stats = runner(api, sink.clone()).run(&list, false).await;

        assert_eq!(stats.total, 4);
        assert_eq!(stats.sent, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.sent + stats.failed + stats.skipped, stats.total);
        assert!(!stats.interrupted);
        assert!(matches!(
            sink.events().last(),
            Some(CampaignEvent::CampaignSummary { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_campaign_completes() {
        let mut api = MockEmailApi::new();
        api.expect_submit().never();

        let stats = runner(api, Arc::new(MemoryEventSink::new()))
            .run(&[], false)
            .await;

        assert_eq!(stats.total, 0);
        assert_eq!(stats.sent + stats.failed + stats.skipped, 0);
    }

    #[tokio::test]
    async fn test_dry_run_never_calls_the_api() {
        let mut api = MockEmailApi::new();
        api.expect_submit().never();
        let sink = Arc::new(MemoryEventSink::new());
        let list = recipients(&[("a@b.com", Some("A")), ("bad", Some("B"))]);

        let stats = runner(api, sink.clone()).run(&list, true).await;

        assert_eq!(stats.previewed, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.sent, 0);
        assert_eq!(stats.failed, 0);
        assert!(sink.events().iter().any(|e| matches!(
            e,
            CampaignEvent::Previewed { recipient, html, .. } if recipient == "a@b.com" && html == "Hi A"
        )));
    }

    #[tokio::test]
    async fn test_recipients_are_processed_in_order() {
        let mut api = MockEmailApi::new();
        api.expect_submit().returning(|_| Ok(DeliveryReceipt::default()));
        let sink = Arc::new(MemoryEventSink::new());
        let list = recipients(&[
            ("first@b.com", Some("1")),
            ("second@b.com", Some("2")),
            ("third@b.com", Some("3")),
        ]);

        runner(api, sink.clone()).run(&list, false).await;

        let order: Vec<String> = sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                CampaignEvent::AttemptSucceeded { recipient, .. } => Some(recipient),
                _ => None,
            })
            .collect();
        assert_eq!(order, vec!["first@b.com", "second@b.com", "third@b.com"]);
    }

    #[tokio::test]
    async fn test_cancelled_campaign_stops_before_next_recipient() {
        let mut api = MockEmailApi::new();
        api.expect_submit().never();
        let token = CancellationToken::new();
        token.cancel();
        let sink = Arc::new(MemoryEventSink::new());
        let list = recipients(&[("a@b.com", Some("A")), ("c@b.com", Some("C"))]);

        let stats = runner(api, sink.clone())
            .with_shutdown(token)
            .run(&list, false)
            .await;

        assert!(stats.interrupted);
        assert_eq!(stats.total, 0);
        assert!(sink
            .events()
            .iter()
            .any(|e| matches!(e, CampaignEvent::Interrupted { processed: 0 })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_delay_after_last_recipient() {
        let mut api = MockEmailApi::new();
        api.expect_submit()
            .times(3)
            .returning(|_| Ok(DeliveryReceipt::default()));
        let list = recipients(&[
            ("a@b.com", Some("A")),
            ("c@b.com", Some("C")),
            ("d@b.com", Some("D")),
        ]);

        let stats = paced_runner(api, 5.0).run(&list, false).await;

        assert_eq!(stats.sent, 3);
        assert_eq!(stats.elapsed, Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_skipped_recipients_are_still_paced() {
        let mut api = MockEmailApi::new();
        api.expect_submit()
            .times(1)
            .returning(|_| Ok(DeliveryReceipt::default()));
        let list = recipients(&[("bad", Some("A")), ("c@b.com", Some("C"))]);

        let stats = paced_runner(api, 5.0).run(&list, false).await;

        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.sent, 1);
        assert_eq!(stats.elapsed, Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dry_run_does_not_wait() {
        let mut api = MockEmailApi::new();
        api.expect_submit().never();
        let list = recipients(&[("a@b.com", Some("A")), ("c@b.com", Some("C"))]);

        let stats = paced_runner(api, 5.0).run(&list, true).await;

        assert_eq!(stats.previewed, 2);
        assert_eq!(stats.elapsed, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_during_pause_stops_the_campaign() {
        let mut api = MockEmailApi::new();
        api.expect_submit()
            .times(1)
            .returning(|_| Ok(DeliveryReceipt::default()));
        let token = CancellationToken::new();
        let list = recipients(&[
            ("a@b.com", Some("A")),
            ("c@b.com", Some("C")),
            ("d@b.com", Some("D")),
        ]);

        let interrupt = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            interrupt.cancel();
        });
        let stats = paced_runner(api, 5.0)
            .with_shutdown(token)
            .run(&list, false)
            .await;

        assert!(stats.interrupted);
        assert_eq!(stats.total, 1);
        assert_eq!(stats.sent, 1);
        assert_eq!(stats.elapsed, Duration::from_secs(2));
    }

    #[test]
    fn test_statistics_record_each_outcome_once() {
        let mut stats = CampaignStatistics::default();
        stats.record(&SendResult::Sent {
            recipient: "a@b.com".to_string(),
            attempts: 1,
        });
        stats.record(&SendResult::Failed {
            recipient: "b@b.com".to_string(),
            attempts: 3,
            last_error: ApiError::Network("timeout".to_string()),
        });

        assert_eq!(stats.total, 2);
        assert_eq!(stats.sent, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.skipped, 0);
    }
}
