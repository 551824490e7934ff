//! Alert e-mail composition.

use sentinel_core::{Alert, Direction, Price};

/// A plain-text alert e-mail, ready for any transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl AlertEmail {
    pub fn compose(alert: &Alert, price: Price, sender: &str) -> Self {
        let condition = match alert.direction {
            Direction::Above => "above",
            Direction::Below => "below",
        };

        let subject = format!("Price alert: {} is {} your target", alert.symbol, condition);
        let body = format!(
            "Hello,\n\
             Your price alert has been triggered.\n\
             \n\
             - Symbol: {}\n\
             - Your condition: price {} {}\n\
             - Current price: {}\n\
             \n\
             This alert has been completed and removed.",
            alert.symbol, condition, alert.target_price, price,
        );

        Self {
            from: sender.to_string(),
            to: alert.email.clone(),
            subject,
            body,
        }
    }
}
