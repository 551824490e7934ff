//! Feed wire messages.
//!
//! Outbound: subscription commands.
//! ```json
//! {"method":"SUBSCRIBE","params":["btcusdt@miniTicker"],"id":1}
//! ```
//!
//! Inbound: mini ticker events and command acknowledgements.
//! ```json
//! {"e":"24hrMiniTicker","E":1700000000000,"s":"BTCUSDT","c":"50001.00",...}
//! {"result":null,"id":1}
//! ```

use sentinel_core::Tick;
use serde::{Deserialize, Serialize};

/// Event type of per-symbol mini ticker updates.
pub const MINI_TICKER_EVENT: &str = "24hrMiniTicker";

/// Subscription command verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SubscriptionMethod {
    Subscribe,
    Unsubscribe,
}

impl SubscriptionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
        }
    }
}

/// Batched subscribe/unsubscribe request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionCommand {
    pub method: SubscriptionMethod,
    /// Stream names, e.g. `btcusdt@miniTicker`.
    pub params: Vec<String>,
    pub id: u64,
}

impl SubscriptionCommand {
    pub fn new(method: SubscriptionMethod, params: Vec<String>, id: u64) -> Self {
        Self { method, params, id }
    }

    pub fn subscribe(params: Vec<String>, id: u64) -> Self {
        Self::new(SubscriptionMethod::Subscribe, params, id)
    }

    pub fn unsubscribe(params: Vec<String>, id: u64) -> Self {
        Self::new(SubscriptionMethod::Unsubscribe, params, id)
    }
}

/// Mini ticker event payload. Only the fields the pipeline needs.
#[derive(Debug, Clone, Deserialize)]
struct MiniTicker {
    #[serde(rename = "e")]
    event_type: String,
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "c")]
    close: String,
}

/// Response to a subscription command.
#[derive(Debug, Clone, Deserialize)]
struct CommandResponse {
    id: u64,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawFeedMessage {
    Ticker(MiniTicker),
    Response(CommandResponse),
}

/// Classified inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    /// A price update for one symbol. The price is still unparsed.
    Tick(Tick),
    /// Command acknowledged.
    Ack { id: u64 },
    /// Command rejected by the feed.
    Rejected { id: u64, error: String },
    /// Anything else: other event types, malformed JSON.
    Ignored,
}

/// Classify a text frame. Never fails: unknown input is `Ignored`.
pub fn parse_feed_message(text: &str) -> FeedMessage {
    match serde_json::from_str::<RawFeedMessage>(text) {
        Ok(RawFeedMessage::Ticker(ticker)) if ticker.event_type == MINI_TICKER_EVENT => {
            FeedMessage::Tick(Tick::new(ticker.symbol.as_str(), ticker.close))
        }
        Ok(RawFeedMessage::Ticker(_)) => FeedMessage::Ignored,
        Ok(RawFeedMessage::Response(resp)) => match resp.error {
            Some(error) => FeedMessage::Rejected {
                id: resp.id,
                error: error.to_string(),
            },
            None => FeedMessage::Ack { id: resp.id },
        },
        Err(_) => FeedMessage::Ignored,
    }
}
