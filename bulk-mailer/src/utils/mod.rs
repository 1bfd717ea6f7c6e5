//! Utility modules
//!
//! - [`email`]: Recipient address plausibility checks

pub mod email;

pub use email::validate_email;
