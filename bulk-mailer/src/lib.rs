//! bulk-mailer: personalized bulk email over the Mailgun HTTP API
//!
//! Reads a CSV recipient list, renders an HTML template per row and submits
//! each message to the provider, retrying transient failures with a flat
//! delay. Recipients are processed strictly one after another.
//!
//! # Example
//!
//! ```no_run
//! use bulk_mailer::api::MailgunClient;
//! use bulk_mailer::config::CampaignConfig;
//! use bulk_mailer::dispatch::{CampaignRunner, EmailDispatcher};
//! use bulk_mailer::events::TracingEventSink;
//! use bulk_mailer::recipients::CsvRecipientSource;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Arc::new(CampaignConfig::from_file("config.json")?);
//!     let recipients = CsvRecipientSource::new("recipients.csv").load()?;
//!
//!     let sink = Arc::new(TracingEventSink);
//!     let api = MailgunClient::new(&config)?;
//!     let dispatcher = EmailDispatcher::new(api, config, sink.clone());
//!     let stats = CampaignRunner::new(dispatcher, sink)
//!         .run(&recipients, false)
//!         .await;
//!
//!     println!("sent {} of {}", stats.sent, stats.total);
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`config`]: Campaign configuration
//! - [`error`]: Error types and handling
//! - [`templates`]: `{name}` placeholder rendering
//! - [`recipients`]: CSV recipient source
//! - [`api`]: Email provider abstraction and Mailgun client
//! - [`dispatch`]: Per-recipient retry loop and campaign runner
//! - [`events`]: Campaign events and sinks
//! - [`logging`]: tracing subscriber setup

pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod logging;
pub mod recipients;
pub mod templates;
pub mod utils;

// Re-export commonly used types
pub use config::CampaignConfig;
pub use error::{MailerError, Result};
