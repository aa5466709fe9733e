// In crates/engine/src/error.rs

use chrono::{DateTime, Utc};
use core_types::{Granularity, Instrument, RuleKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Rule(#[from] rules::Error),

    #[error("Loading the {rule} queue entry failed for {instrument} {granularity}")]
    Store {
        rule: RuleKind,
        instrument: Instrument,
        granularity: Granularity,
        #[source]
        source: database::Error,
    },

    #[error("Candles from different streams: {previous} vs {current}")]
    MismatchedPair { previous: String, current: String },

    #[error("Candle for {instrument} {granularity} at {current} is older than {previous}")]
    OutOfOrder {
        instrument: Instrument,
        granularity: Granularity,
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
