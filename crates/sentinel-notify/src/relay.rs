//! HTTP mail relay notifier.
//!
//! Posts the composed e-mail as a transactional-mail JSON request:
//! ```json
//! {"sender":{"email":"alerts@x.com"},"to":[{"email":"a@x.com"}],
//!  "subject":"...","textContent":"..."}
//! ```
//! authenticated with an `api-key` header.

use crate::email::AlertEmail;
use crate::error::{NotifyError, NotifyResult};
use crate::Notifier;
use async_trait::async_trait;
use reqwest::Client;
use sentinel_core::{Alert, Price};
use sentinel_telemetry::Metrics;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, info};

/// Environment variable holding the relay API key.
pub const RELAY_API_KEY_ENV: &str = "SENTINEL_RELAY_API_KEY";

/// Default timeout for relay requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Relay endpoint, e.g. `https://api.brevo.com/v3/smtp/email`.
    pub url: String,
    pub sender: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl RelayConfig {
    pub fn new(url: impl Into<String>, sender: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            sender: sender.into(),
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Fill the API key from `SENTINEL_RELAY_API_KEY` if set.
    pub fn with_env_api_key(mut self) -> Self {
        self.api_key = std::env::var(RELAY_API_KEY_ENV)
            .ok()
            .filter(|k| !k.is_empty());
        self
    }
}

#[derive(Debug, Serialize)]
struct Contact<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RelayRequest<'a> {
    sender: Contact<'a>,
    to: Vec<Contact<'a>>,
    subject: &'a str,
    text_content: &'a str,
}

pub struct RelayNotifier {
    client: Client,
    config: RelayConfig,
}

impl RelayNotifier {
    pub fn new(config: RelayConfig) -> NotifyResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NotifyError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        if config.api_key.is_none() {
            info!(url = %config.url, "Mail relay configured without an API key");
        }

        Ok(Self { client, config })
    }

    /// Deliver one e-mail through the relay.
    pub async fn send(&self, email: &AlertEmail) -> NotifyResult<()> {
        let request = RelayRequest {
            sender: Contact { email: &email.from },
            to: vec![Contact { email: &email.to }],
            subject: &email.subject,
            text_content: &email.body,
        };

        let mut builder = self.client.post(&self.config.url).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.header("api-key", key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(to = %email.to, status = status.as_u16(), "Relay accepted message");
        Ok(())
    }
}

#[async_trait]
impl Notifier for RelayNotifier {
    fn name(&self) -> &'static str {
        "relay"
    }

    async fn notify(&self, alert: &Alert, price: Price) {
        let email = AlertEmail::compose(alert, price, &self.config.sender);
        match self.send(&email).await {
            Ok(()) => info!(
                alert_id = %alert.id,
                to = %email.to,
                symbol = %alert.symbol,
                "Alert e-mail sent"
            ),
            Err(e) => {
                Metrics::notify_failed(self.name());
                error!(
                    alert_id = %alert.id,
                    to = %email.to,
                    error = %e,
                    "Failed to send alert e-mail"
                );
            }
        }
    }
}
