//! Alert notification delivery for price-sentinel.
//!
//! Delivery is best-effort: a `Notifier` logs its own failures and never
//! reports them back to the trigger pipeline.

pub mod email;
pub mod error;
pub mod log_notifier;
pub mod relay;
pub mod smtp;

pub use email::AlertEmail;
pub use error::{NotifyError, NotifyResult};
pub use log_notifier::LogNotifier;
pub use relay::{RelayConfig, RelayNotifier, RELAY_API_KEY_ENV};
pub use smtp::{SmtpConfig, SmtpNotifier, SMTP_PASSWORD_ENV, SMTP_USERNAME_ENV};

use async_trait::async_trait;
use sentinel_core::{Alert, Price};

/// Outbound channel for triggered alerts.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Backend name, used as a metrics label.
    fn name(&self) -> &'static str;

    /// Tell the alert's owner that `price` satisfied it. Never fails.
    async fn notify(&self, alert: &Alert, price: Price);
}
