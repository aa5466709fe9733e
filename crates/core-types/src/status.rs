// In crates/core-types/src/status.rs
//
// Rule status records owned by the rule state store. Each mutation is a
// transition function that returns a new value; the store persists the result.

use crate::types::{Granularity, Instrument, Line, RuleKind, Trend};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Identifier assigned by the store.
pub type RecordId = i64;

/// Where a CaptainAmerica setup stands for one (instrument, granularity).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CaptainAmericaPhase {
    #[default]
    Idle,
    /// Waiting for a breakout. `second_judge` is set once the first
    /// trade-plan evaluation has failed.
    Setup { second_judge: bool },
    /// The setup resolved into a live trade.
    Trade,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptainAmericaStatus {
    pub instrument: Instrument,
    pub granularity: Granularity,
    pub line: Line,
    pub setup_price: Decimal,
    pub phase: CaptainAmericaPhase,
}

impl CaptainAmericaStatus {
    /// A fresh setup armed at `setup_price`.
    pub fn setup(
        instrument: Instrument,
        granularity: Granularity,
        line: Line,
        setup_price: Decimal,
    ) -> Self {
        Self {
            instrument,
            granularity,
            line,
            setup_price,
            phase: CaptainAmericaPhase::Setup { second_judge: false },
        }
    }

    /// True while a setup or a trade blocks new setups.
    pub fn blocks_new_setup(&self) -> bool {
        !matches!(self.phase, CaptainAmericaPhase::Idle)
    }

    pub fn is_awaiting_trade_plan(&self) -> bool {
        matches!(self.phase, CaptainAmericaPhase::Setup { .. })
    }

    pub fn second_judge_pending(&self) -> bool {
        matches!(self.phase, CaptainAmericaPhase::Setup { second_judge: true })
    }

    /// Applies the retry policy after a trade-plan evaluation.
    ///
    /// A trigger turns the setup into a trade. A miss grants exactly one more
    /// evaluation, after which the setup expires back to idle.
    pub fn after_trade_plan(&self, triggered: bool) -> Self {
        let phase = match (triggered, self.phase) {
            (true, _) => CaptainAmericaPhase::Trade,
            (false, CaptainAmericaPhase::Setup { second_judge: true }) => CaptainAmericaPhase::Idle,
            (false, CaptainAmericaPhase::Setup { second_judge: false }) => {
                CaptainAmericaPhase::Setup { second_judge: true }
            }
            (false, other) => other,
        };
        Self { phase, ..self.clone() }
    }

    /// The persisted `(setup_active, trade_active, second_judge)` columns.
    pub fn flags(&self) -> (bool, bool, bool) {
        match self.phase {
            CaptainAmericaPhase::Idle => (false, false, false),
            CaptainAmericaPhase::Setup { second_judge } => (true, false, second_judge),
            CaptainAmericaPhase::Trade => (false, true, false),
        }
    }

    /// Rebuilds the phase from persisted columns, rejecting combinations no
    /// transition can produce.
    pub fn phase_from_flags(
        setup_active: bool,
        trade_active: bool,
        second_judge: bool,
    ) -> Result<CaptainAmericaPhase> {
        match (setup_active, trade_active, second_judge) {
            (false, false, false) => Ok(CaptainAmericaPhase::Idle),
            (true, false, second_judge) => Ok(CaptainAmericaPhase::Setup { second_judge }),
            (false, true, false) => Ok(CaptainAmericaPhase::Trade),
            (setup, trade, second) => Err(Error::InvalidTransition(format!(
                "setup_active={setup}, trade_active={trade}, second_judge={second}"
            ))),
        }
    }
}

/// An IronMan setup that has been detected but not yet stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IronManSetup {
    pub instrument: Instrument,
    pub granularity: Granularity,
    pub swing_target_id: RecordId,
    pub trend: Trend,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IronManStatus {
    pub id: RecordId,
    pub instrument: Instrument,
    pub granularity: Granularity,
    pub swing_target_id: RecordId,
    pub trend: Trend,
    pub active: bool,
}

impl IronManStatus {
    /// Whether `setup` is the same swing/trend pair this record was created for.
    pub fn shares_setup(&self, setup: &IronManSetup) -> bool {
        self.swing_target_id == setup.swing_target_id && self.trend == setup.trend
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwingTarget {
    pub id: RecordId,
    pub instrument: Instrument,
    pub granularity: Granularity,
    pub swing_id: RecordId,
}

/// Breakout reference levels of one swing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwingHighLowPrice {
    pub swing_id: RecordId,
    pub high_price: Decimal,
    pub low_price: Decimal,
}

/// An entry on the trade-rule queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRuleStatus {
    pub id: RecordId,
    pub rule: RuleKind,
    pub instrument: Instrument,
    pub granularity: Granularity,
    /// Time of the candle that last armed this entry.
    pub candle_time: DateTime<Utc>,
    pub active: bool,
}
