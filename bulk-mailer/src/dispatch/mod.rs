//! Per-recipient delivery and campaign orchestration
//!
//! - [`dispatcher`]: validate, render, submit and retry for one recipient
//! - [`runner`]: walk the recipient list and accumulate statistics

pub mod dispatcher;
pub mod runner;

pub use dispatcher::{EmailDispatcher, SendResult, SkipReason, UNIQUE_CODE_VAR};
pub use runner::{CampaignRunner, CampaignStatistics};
