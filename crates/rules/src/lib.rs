// In crates/rules/src/lib.rs

use async_trait::async_trait;
use core_types::{Candle, Granularity, Instrument, RuleKind, TradeRuleStatus};
use rust_decimal::Decimal;

pub mod captain_america;
pub mod error;
pub mod factory;
pub mod iron_man;

pub use captain_america::CaptainAmerica;
pub use error::{Error, Result};
pub use factory::create_rules;
pub use iron_man::IronMan;

/// The outcome of one trade-plan judgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TradePlan {
    /// The setup broke out and became a trade.
    pub triggered: bool,
    /// Signed order size. Zero when nothing triggered or the rule does not size orders.
    pub units: i64,
    /// The queue entry was deactivated by this judgement.
    pub closed: bool,
}

impl TradePlan {
    /// No trade, zero units, queue entry left as it was.
    pub fn none() -> Self {
        Self::default()
    }
}

/// The common interface of the two-phase setup / trade-plan rules.
///
/// Rules hold no state between calls. Every decision is recomputed from the
/// records in the rule state store plus the candles passed in.
#[async_trait]
pub trait TradeRule: Send + Sync {
    fn kind(&self) -> RuleKind;

    /// The candle price this rule compares against its reference levels.
    fn reference_price(&self, candle: &Candle) -> Decimal;

    /// Checks whether `current` forms a new setup. Returns true when a setup
    /// was stored and its queue entry armed.
    async fn judge_setup(&self, previous: &Candle, current: &Candle) -> Result<bool>;

    /// Checks whether the setup behind `entry` converts into a trade on `current`.
    async fn judge_trade_plan(&self, entry: &TradeRuleStatus, current: &Candle) -> Result<TradePlan>;
}

/// Attaches rule and stream context to store failures.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Scope<'a> {
    rule: RuleKind,
    instrument: &'a Instrument,
    granularity: Granularity,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(rule: RuleKind, candle: &'a Candle) -> Self {
        Self {
            rule,
            instrument: &candle.instrument,
            granularity: candle.granularity,
        }
    }

    pub(crate) fn persisted<T>(
        &self,
        operation: &'static str,
        result: database::Result<T>,
    ) -> Result<T> {
        result.map_err(|source| {
            tracing::error!(
                rule = %self.rule,
                instrument = %self.instrument,
                granularity = %self.granularity,
                operation,
                error = %source,
                "Rule state store failed."
            );
            Error::Persistence {
                rule: self.rule,
                instrument: self.instrument.clone(),
                granularity: self.granularity,
                operation,
                source,
            }
        })
    }
}
