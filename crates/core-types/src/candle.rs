// In crates/core-types/src/candle.rs

use crate::types::{Granularity, Instrument, Line, Trend};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One side (bid or ask) of an OHLC candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rate {
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

impl Rate {
    /// The OHLC average of this side.
    pub fn average(&self) -> Decimal {
        (self.open + self.high + self.low + self.close) / Decimal::from(4)
    }
}

/// A single bid/ask price bar together with the classifications the
/// candle provider derived for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub instrument: Instrument,
    pub granularity: Granularity,
    pub bid: Rate,
    pub ask: Rate,
    pub time: DateTime<Utc>,
    pub volume: Decimal,
    /// Directional bias of this candle alone.
    pub line: Line,
    /// Directional regime this candle belongs to.
    pub trend: Trend,
}

impl Candle {
    /// Midpoint of the bid and ask close.
    pub fn close_mid(&self) -> Decimal {
        (self.bid.close + self.ask.close) / Decimal::from(2)
    }

    /// Midpoint of the bid and ask OHLC averages.
    pub fn ave_mid(&self) -> Decimal {
        (self.bid.average() + self.ask.average()) / Decimal::from(2)
    }

    /// Whether two candles belong to the same (instrument, granularity) stream.
    pub fn same_stream(&self, other: &Candle) -> bool {
        self.instrument == other.instrument && self.granularity == other.granularity
    }
}
