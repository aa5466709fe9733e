// --- Rule Event Structures ---

use chrono::{DateTime, Utc};
use core_types::{Granularity, Instrument, RuleKind};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Where and when a rule event happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleContext {
    pub rule: RuleKind,
    pub instrument: Instrument,
    pub granularity: Granularity,
    /// Time of the candle that caused the event.
    pub time: DateTime<Utc>,
    /// The candle price the rule compared (close mid or ave mid).
    pub price: Decimal,
}

/// Something a rule engine did on a candle.
/// `tag` and `content` are used by serde for clean JSON representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum RuleEvent {
    SetupHappened(RuleContext),
    TradeHappened(TradeDetails),
    SetupExpired(RuleContext),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeDetails {
    #[serde(flatten)]
    pub context: RuleContext,
    /// Signed order size; zero when the rule does not size its orders.
    pub units: i64,
}

impl RuleEvent {
    pub fn context(&self) -> &RuleContext {
        match self {
            RuleEvent::SetupHappened(context)
            | RuleEvent::SetupExpired(context)
            | RuleEvent::TradeHappened(TradeDetails { context, .. }) => context,
        }
    }
}
