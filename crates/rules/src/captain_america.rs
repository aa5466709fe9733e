// In crates/rules/src/captain_america.rs

use crate::{Result, Scope, TradePlan, TradeRule};
use async_trait::async_trait;
use core_types::{Candle, CaptainAmericaStatus, Line, RuleKind, TradeRuleStatus};
use database::RuleStore;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Two consecutive candles with the same line form a setup at the current
/// close mid. The setup trades when a later close mid reaches that price in
/// the setup's direction, with one retry before it expires.
pub struct CaptainAmerica {
    store: Arc<dyn RuleStore>,
}

impl CaptainAmerica {
    pub fn new(store: Arc<dyn RuleStore>) -> Self {
        Self { store }
    }
}

/// Boundary equality counts as a breakout.
fn breaks_out(line: Line, setup_price: Decimal, close_mid: Decimal) -> bool {
    match line {
        Line::Positive => setup_price <= close_mid,
        Line::Negative => setup_price >= close_mid,
    }
}

#[async_trait]
impl TradeRule for CaptainAmerica {
    fn kind(&self) -> RuleKind {
        RuleKind::CaptainAmerica
    }

    fn reference_price(&self, candle: &Candle) -> Decimal {
        candle.close_mid()
    }

    async fn judge_setup(&self, previous: &Candle, current: &Candle) -> Result<bool> {
        let scope = Scope::new(self.kind(), current);
        let status = scope.persisted(
            "find status",
            self.store
                .find_captain_america(&current.instrument, current.granularity)
                .await,
        )?;

        // Already set up or trading on this stream.
        if status.is_some_and(|s| s.blocks_new_setup()) {
            return Ok(false);
        }
        if previous.line != current.line {
            return Ok(false);
        }

        let setup = CaptainAmericaStatus::setup(
            current.instrument.clone(),
            current.granularity,
            current.line,
            current.close_mid(),
        );
        scope.persisted(
            "store setup",
            self.store.setup_captain_america(&setup, current.time).await,
        )?;

        tracing::info!(
            rule = %self.kind(),
            instrument = %current.instrument,
            granularity = %current.granularity,
            time = %current.time,
            line = %setup.line,
            price = %setup.setup_price,
            "CaptainAmerica setup happened."
        );
        Ok(true)
    }

    async fn judge_trade_plan(&self, entry: &TradeRuleStatus, current: &Candle) -> Result<TradePlan> {
        let scope = Scope::new(self.kind(), current);
        let status = scope.persisted(
            "find status",
            self.store
                .find_captain_america(&current.instrument, current.granularity)
                .await,
        )?;

        let Some(status) = status.filter(|s| s.is_awaiting_trade_plan()) else {
            tracing::warn!(
                rule = %self.kind(),
                instrument = %current.instrument,
                granularity = %current.granularity,
                entry_id = entry.id,
                "Queue entry has no pending setup. Deactivating it."
            );
            scope.persisted("complete queue entry", self.store.complete_trade_rule(entry.id).await)?;
            return Ok(TradePlan { closed: true, ..TradePlan::none() });
        };

        let close_mid = current.close_mid();
        let triggered = breaks_out(status.line, status.setup_price, close_mid);
        let next = status.after_trade_plan(triggered);
        scope.persisted("save status", self.store.save_captain_america(&next).await)?;

        let closed = !next.is_awaiting_trade_plan();
        if closed {
            scope.persisted("complete queue entry", self.store.complete_trade_rule(entry.id).await)?;
        }

        if triggered {
            // TODO: size the order once money management defines a lot for this rule.
            tracing::info!(
                rule = %self.kind(),
                instrument = %current.instrument,
                granularity = %current.granularity,
                time = %current.time,
                price = %close_mid,
                "CaptainAmerica trade happened."
            );
        } else if closed {
            tracing::info!(
                rule = %self.kind(),
                instrument = %current.instrument,
                granularity = %current.granularity,
                time = %current.time,
                price = %close_mid,
                "CaptainAmerica setup expired after second judge."
            );
        } else {
            tracing::debug!(
                rule = %self.kind(),
                instrument = %current.instrument,
                granularity = %current.granularity,
                price = %close_mid,
                setup_price = %status.setup_price,
                "No breakout. Second judge pending."
            );
        }

        Ok(TradePlan { triggered, units: 0, closed })
    }
}
