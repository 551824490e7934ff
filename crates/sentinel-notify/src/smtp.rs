//! SMTP notifier.
//!
//! Submits the composed e-mail to an SMTP relay (STARTTLS on port 587 by
//! default). Credentials come from `SENTINEL_SMTP_USERNAME` and
//! `SENTINEL_SMTP_PASSWORD`.

use crate::email::AlertEmail;
use crate::error::NotifyResult;
use crate::Notifier;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use sentinel_core::{Alert, Price};
use sentinel_telemetry::Metrics;
use std::time::Duration;
use tracing::{debug, error, info};

pub const SMTP_USERNAME_ENV: &str = "SENTINEL_SMTP_USERNAME";
pub const SMTP_PASSWORD_ENV: &str = "SENTINEL_SMTP_PASSWORD";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub sender: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Upgrade with STARTTLS. Plaintext is only for local relays.
    pub starttls: bool,
    pub timeout: Duration,
}

impl SmtpConfig {
    pub fn new(host: impl Into<String>, port: u16, sender: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            sender: sender.into(),
            username: None,
            password: None,
            starttls: true,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Fill credentials from the environment if set.
    pub fn with_env_credentials(mut self) -> Self {
        let read = |name| std::env::var(name).ok().filter(|v: &String| !v.is_empty());
        self.username = read(SMTP_USERNAME_ENV);
        self.password = read(SMTP_PASSWORD_ENV);
        self
    }
}

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    config: SmtpConfig,
}

impl SmtpNotifier {
    pub fn new(config: SmtpConfig) -> NotifyResult<Self> {
        let builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(config.host.as_str())
        };
        let mut builder = builder.port(config.port).timeout(Some(config.timeout));

        match (&config.username, &config.password) {
            (Some(username), Some(password)) => {
                builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
            }
            _ => info!(host = %config.host, "SMTP relay configured without credentials"),
        }

        Ok(Self {
            transport: builder.build(),
            config,
        })
    }

    /// Build the MIME message for `email`.
    pub fn message(email: &AlertEmail) -> NotifyResult<Message> {
        let message = Message::builder()
            .from(email.from.parse::<Mailbox>()?)
            .to(email.to.parse::<Mailbox>()?)
            .subject(email.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(email.body.clone())?;
        Ok(message)
    }

    pub async fn send(&self, email: &AlertEmail) -> NotifyResult<()> {
        let message = Self::message(email)?;
        let response = self.transport.send(message).await?;
        debug!(to = %email.to, code = %response.code(), "SMTP relay accepted message");
        Ok(())
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    fn name(&self) -> &'static str {
        "smtp"
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotifyError;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use sentinel_core::{AlertId, Direction, NewAlert};
    use sentinel_telemetry::metrics::NOTIFY_FAILED_TOTAL;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::{TcpListener, TcpStream};

    type Received = Arc<Mutex<Vec<String>>>;

    /// Minimal SMTP server: accepts everything, records message data.
    async fn mock_smtp() -> (u16, Received) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let received: Received = Arc::default();
        let sessions = received.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve_session(stream, sessions.clone()));
            }
        });
        (port, received)
    }

    async fn serve_session(stream: TcpStream, received: Received) {
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();
        write.write_all(b"220 mock ESMTP\r\n").await.unwrap();

        let mut data: Option<String> = None;
        while let Ok(Some(line)) = lines.next_line().await {
            if data.is_some() {
                if line == "." {
                    received.lock().unwrap().push(data.take().unwrap_or_default());
                    write.write_all(b"250 queued\r\n").await.unwrap();
                } else if let Some(buf) = data.as_mut() {
                    buf.push_str(&line);
                    buf.push('\n');
                }
                continue;
            }

            let verb = line.get(..4).unwrap_or_default().to_ascii_uppercase();
            match verb.as_str() {
                "EHLO" | "HELO" => write.write_all(b"250 mock\r\n").await.unwrap(),
                "DATA" => {
                    data = Some(String::new());
                    write.write_all(b"354 end with .\r\n").await.unwrap();
                }
                "QUIT" => {
                    let _ = write.write_all(b"221 bye\r\n").await;
                    break;
                }
                _ => write.write_all(b"250 OK\r\n").await.unwrap(),
            }
        }
    }

    fn plaintext_config(port: u16) -> SmtpConfig {
        SmtpConfig {
            starttls: false,
            timeout: Duration::from_secs(2),
            ..SmtpConfig::new("127.0.0.1", port, "alerts@sentinel.dev")
        }
    }

    fn alert() -> Alert {
        NewAlert::validated("a@x.com", "ETHUSDT", Price::new(dec!(3000)), Direction::Below)
            .unwrap()
            .into_alert(AlertId::new(3), Utc::now())
    }

    #[test]
    fn test_message_headers() {
        let email = AlertEmail::compose(&alert(), Price::new(dec!(2999)), "alerts@sentinel.dev");
        let message = SmtpNotifier::message(&email).unwrap();
        let raw = String::from_utf8_lossy(&message.formatted()).to_string();

        assert!(raw.contains("From: alerts@sentinel.dev"));
        assert!(raw.contains("To: a@x.com"));
        assert!(raw.contains("Subject: Price alert: ETHUSDT is below your target"));
        assert!(raw.contains("- Current price: 2999"));
    }

    #[test]
    fn test_invalid_address_rejected() {
        let mut email =
            AlertEmail::compose(&alert(), Price::new(dec!(2999)), "alerts@sentinel.dev");
        email.from = "not an address".to_string();
        assert!(matches!(
            SmtpNotifier::message(&email),
            Err(NotifyError::Address(_))
        ));
    }

    #[tokio::test]
    async fn test_delivers_to_relay() {
        let (port, received) = mock_smtp().await;
        let notifier = SmtpNotifier::new(plaintext_config(port)).unwrap();

        let email = AlertEmail::compose(&alert(), Price::new(dec!(2999)), "alerts@sentinel.dev");
        notifier.send(&email).await.unwrap();

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert!(received[0].contains("Subject: Price alert: ETHUSDT is below your target"));
        assert!(received[0].contains("- Symbol: ETHUSDT"));
    }

    #[tokio::test]
    async fn test_notify_swallows_failure() {
        let closed_port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let notifier = SmtpNotifier::new(plaintext_config(closed_port)).unwrap();

        let before = NOTIFY_FAILED_TOTAL.with_label_values(&["smtp"]).get();
        notifier.notify(&alert(), Price::new(dec!(2999))).await;
        let after = NOTIFY_FAILED_TOTAL.with_label_values(&["smtp"]).get();
        assert!(after - before >= 1.0);
    }
}
