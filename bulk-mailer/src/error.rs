use thiserror::Error;

#[derive(Error, Debug)]
pub enum MailerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Recipient source error: {0}")]
    RecipientSource(String),

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<config::ConfigError> for MailerError {
    fn from(err: config::ConfigError) -> Self {
        MailerError::Config(err.to_string())
    }
}

impl From<csv::Error> for MailerError {
    fn from(err: csv::Error) -> Self {
        MailerError::RecipientSource(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MailerError>;
