//! Notifier that only writes the composed e-mail to the log.

use crate::email::AlertEmail;
use crate::Notifier;
use async_trait::async_trait;
use sentinel_core::{Alert, Price};
use tracing::info;

/// Default backend when no mail relay is configured.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    sender: String,
}

impl LogNotifier {
    pub fn new(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
        }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn notify(&self, alert: &Alert, price: Price) {
        let email = AlertEmail::compose(alert, price, &self.sender);
        info!(
            alert_id = %alert.id,
            to = %email.to,
            subject = %email.subject,
            body = %email.body,
            "Alert notification"
        );
    }
}
