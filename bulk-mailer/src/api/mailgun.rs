//! Mailgun HTTP API client

use super::{ApiError, DeliveryReceipt, EmailApi, OutboundMessage};
use crate::config::CampaignConfig;
use crate::error::Result;
use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use tracing::debug;

/// Sends messages through `POST {base_url}/{domain}/messages`
pub struct MailgunClient {
    http_client: reqwest::Client,
    base_url: String,
    domain: String,
    api_key: Secret<String>,
}

/// Mailgun accept response
#[derive(Debug, Deserialize)]
struct MailgunResponse {
    id: Option<String>,
}

impl MailgunClient {
    /// Build a client from campaign configuration
    ///
    /// One client, and its connection pool, is reused for the whole run.
    pub fn new(config: &CampaignConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            http_client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            domain: config.domain.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// Endpoint messages are posted to
    pub fn messages_url(&self) -> String {
        format!("{}/{}/messages", self.base_url, self.domain)
    }
}

#[async_trait]
impl EmailApi for MailgunClient {
    async fn submit(&self, message: &OutboundMessage) -> std::result::Result<DeliveryReceipt, ApiError> {
        let url = self.messages_url();
        debug!("Posting message for {} to {}", message.to, url);

        let form = [
            ("from", message.from.as_str()),
            ("to", message.to.as_str()),
            ("subject", message.subject.as_str()),
            ("html", message.html.as_str()),
        ];

        let response = self
            .http_client
            .post(&url)
            .basic_auth("api", Some(self.api_key.expose_secret()))
            .form(&form)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        // The message was accepted; an unexpected body only costs us the id.
        let message_id = response
            .json::<MailgunResponse>()
            .await
            .ok()
            .and_then(|r| r.id);

        Ok(DeliveryReceipt { message_id })
    }
}
