//! Message templates
//!
//! HTML bodies and subject lines carry `{name}` placeholders that are filled
//! per recipient.

pub mod renderer;

pub use renderer::{TemplateError, TemplateRenderer};
