// In crates/core-types/src/lib.rs

pub mod candle;
pub mod error;
pub mod status;
pub mod types;

// Re-export the most important types for easy access from other crates.
pub use candle::{Candle, Rate};
pub use error::{Error, Result};
pub use status::{
    CaptainAmericaPhase, CaptainAmericaStatus, IronManSetup, IronManStatus, RecordId,
    SwingHighLowPrice, SwingTarget, TradeRuleStatus,
};
pub use types::{Granularity, Instrument, Line, RuleKind, Trend};
