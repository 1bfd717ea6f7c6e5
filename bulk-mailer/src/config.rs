//! Campaign configuration
//!
//! Loaded once at startup from a JSON (or TOML) file, with `BULKMAIL_*`
//! environment variables layered on top, then validated. Immutable for the
//! rest of the run.

use crate::error::{MailerError, Result};
use crate::utils::validate_email;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

/// Mailgun US region endpoint
pub const DEFAULT_API_BASE_URL: &str = "https://api.mailgun.net/v3";

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Template variable filled from `registration_link`
pub const REGISTRATION_LINK_VAR: &str = "registration_link";

const ENV_PREFIX: &str = "BULKMAIL";

#[derive(Debug, Clone, Deserialize)]
pub struct CampaignConfig {
    /// Sending domain registered with the provider
    pub domain: String,
    pub api_key: Secret<String>,
    /// `From` value, either `user@domain` or `Name <user@domain>`
    pub sender_email: String,
    pub subject: String,
    /// HTML body with `{name}` placeholders
    pub template: String,
    #[serde(default)]
    pub registration_link: String,
    /// Seconds to wait between recipients
    #[serde(default = "default_delay_between_emails")]
    pub delay_between_emails: f64,
    /// Additional attempts after the first one fails
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Seconds to wait between attempts for the same recipient
    #[serde(default = "default_retry_delay")]
    pub retry_delay: f64,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_delay_between_emails() -> f64 {
    1.0
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> f64 {
    20.0
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl CampaignConfig {
    /// Load configuration from a file, applying `BULKMAIL_*` environment overrides
    ///
    /// The file format is inferred from the extension (`.json`, `.toml`).
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(MailerError::Config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            // E.g. `BULKMAIL_API_KEY=key-123` overrides `api_key`
            .add_source(config::Environment::with_prefix(ENV_PREFIX).prefix_separator("_"))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("domain", self.domain.as_str()),
            ("api_key", self.api_key.expose_secret().as_str()),
            ("sender_email", self.sender_email.as_str()),
            ("subject", self.subject.as_str()),
            ("template", self.template.as_str()),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(MailerError::Config(format!("'{}' must not be empty", field)));
            }
        }

        validate_email(self.sender_address()).map_err(|e| {
            MailerError::Config(format!("Invalid sender_email '{}': {}", self.sender_email, e))
        })?;

        let delays = [
            ("delay_between_emails", self.delay_between_emails),
            ("retry_delay", self.retry_delay),
        ];
        for (field, value) in delays {
            if Duration::try_from_secs_f64(value).is_err() {
                return Err(MailerError::Config(format!(
                    "'{}' must be a non-negative, representable number of seconds, got {}",
                    field, value
                )));
            }
        }

        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://"))
        {
            return Err(MailerError::Config(format!(
                "Invalid api_base_url '{}'",
                self.api_base_url
            )));
        }

        if self.request_timeout_secs == 0 {
            return Err(MailerError::Config(
                "'request_timeout_secs' must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Bare address part of `sender_email`
    pub fn sender_address(&self) -> &str {
        let sender = self.sender_email.trim();
        match (sender.rfind('<'), sender.ends_with('>')) {
            (Some(start), true) => &sender[start + 1..sender.len() - 1],
            _ => sender,
        }
    }

    /// Total attempts allowed per recipient
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn send_delay(&self) -> Duration {
        Duration::from_secs_f64(self.delay_between_emails)
    }

    pub fn retry_pause(&self) -> Duration {
        Duration::from_secs_f64(self.retry_delay)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Variables injected from configuration rather than the recipient row
    pub fn fixed_variables(&self) -> HashMap<String, String> {
        let mut vars = HashMap::new();
        if !self.registration_link.is_empty() {
            vars.insert(
                REGISTRATION_LINK_VAR.to_string(),
                self.registration_link.clone(),
            );
        }
        vars
    }

    /// Starter configuration written by `--create-config`
    pub fn default_document() -> serde_json::Value {
        serde_json::json!({
            "domain": "your-mailgun-domain.com",
            "api_key": "your-mailgun-api-key",
            "sender_email": "your-email@example.com",
            "subject": "Your Email Subject",
            "template": concat!(
                "<html><body>\n",
                "<p>Hello,<br><br>\n",
                "This is a template email. You can use variables like {name}, {title}, etc.<br><br>\n",
                "Best regards,<br>\n",
                "Your Team</p>\n",
                "</body></html>"
            ),
            "registration_link": "",
            "delay_between_emails": default_delay_between_emails(),
            "max_retries": default_max_retries(),
            "retry_delay": default_retry_delay(),
            "api_base_url": DEFAULT_API_BASE_URL,
            "request_timeout_secs": default_request_timeout(),
        })
    }

    /// Write the starter configuration, refusing to replace an existing file
    pub fn write_default<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => MailerError::Config(format!(
                    "{} already exists, not overwriting",
                    path.display()
                )),
                _ => MailerError::Io(e),
            })?;

        let content = serde_json::to_string_pretty(&Self::default_document())?;
        file.write_all(content.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(())
    }
}
