// In crates/rules/src/iron_man.rs

use crate::{Result, Scope, TradePlan, TradeRule};
use async_trait::async_trait;
use core_types::{Candle, IronManSetup, RuleKind, SwingHighLowPrice, TradeRuleStatus, Trend};
use database::RuleStore;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Trend continuation through the current swing's high (up trend) or low
/// (down trend). A setup trades when a later candle breaks the same levels
/// again; it has no retry limit and stays live until it trades or a new
/// setup supersedes it.
pub struct IronMan {
    store: Arc<dyn RuleStore>,
    order_lot: i64,
}

impl IronMan {
    pub fn new(store: Arc<dyn RuleStore>, order_lot: i64) -> Self {
        Self { store, order_lot }
    }
}

fn breaks_out(trend: Trend, levels: &SwingHighLowPrice, ave_mid: Decimal) -> bool {
    match trend {
        Trend::Up => levels.high_price <= ave_mid,
        Trend::Down => levels.low_price >= ave_mid,
    }
}

#[async_trait]
impl TradeRule for IronMan {
    fn kind(&self) -> RuleKind {
        RuleKind::IronMan
    }

    fn reference_price(&self, candle: &Candle) -> Decimal {
        candle.ave_mid()
    }

    async fn judge_setup(&self, _previous: &Candle, current: &Candle) -> Result<bool> {
        let scope = Scope::new(self.kind(), current);

        let Some(target) = scope.persisted(
            "find current swing target",
            self.store
                .find_current_swing_target(&current.instrument, current.granularity)
                .await,
        )?
        else {
            tracing::debug!(
                instrument = %current.instrument,
                granularity = %current.granularity,
                "No swing target yet."
            );
            return Ok(false);
        };
        let Some(levels) = scope.persisted(
            "find swing high/low",
            self.store.find_swing_high_low(target.swing_id).await,
        )?
        else {
            tracing::warn!(
                instrument = %current.instrument,
                granularity = %current.granularity,
                swing_id = target.swing_id,
                "Swing target points at missing high/low prices."
            );
            return Ok(false);
        };

        let ave_mid = current.ave_mid();
        if !breaks_out(current.trend, &levels, ave_mid) {
            return Ok(false);
        }

        let setup = IronManSetup {
            instrument: current.instrument.clone(),
            granularity: current.granularity,
            swing_target_id: target.id,
            trend: current.trend,
        };
        let existing = scope.persisted(
            "find status",
            self.store.find_iron_man(&current.instrument, current.granularity).await,
        )?;
        // Same swing, same trend: this setup was already taken.
        if existing.is_some_and(|s| s.shares_setup(&setup)) {
            return Ok(false);
        }

        scope.persisted(
            "create status",
            self.store.create_iron_man(&setup, current.time).await,
        )?;

        tracing::info!(
            rule = %self.kind(),
            instrument = %current.instrument,
            granularity = %current.granularity,
            time = %current.time,
            trend = %current.trend,
            price = %ave_mid,
            swing_target_id = target.id,
            "IronMan setup happened."
        );
        Ok(true)
    }

    async fn judge_trade_plan(&self, entry: &TradeRuleStatus, current: &Candle) -> Result<TradePlan> {
        // The confirming candle must come after the setup candle.
        if entry.candle_time == current.time {
            tracing::debug!(
                instrument = %current.instrument,
                granularity = %current.granularity,
                time = %current.time,
                "Skipping trade plan on the setup candle."
            );
            return Ok(TradePlan::none());
        }

        let scope = Scope::new(self.kind(), current);
        let status = scope.persisted(
            "find status",
            self.store.find_iron_man(&current.instrument, current.granularity).await,
        )?;
        let Some(status) = status.filter(|s| s.active) else {
            tracing::warn!(
                rule = %self.kind(),
                instrument = %current.instrument,
                granularity = %current.granularity,
                entry_id = entry.id,
                "Queue entry has no live setup. Deactivating it."
            );
            scope.persisted("complete queue entry", self.store.complete_trade_rule(entry.id).await)?;
            return Ok(TradePlan { closed: true, ..TradePlan::none() });
        };

        // Resolve the swing the setup was made against, not the current one.
        let target = scope.persisted(
            "find swing target",
            self.store.find_swing_target(status.swing_target_id).await,
        )?;
        let levels = match target {
            Some(target) => scope.persisted(
                "find swing high/low",
                self.store.find_swing_high_low(target.swing_id).await,
            )?,
            None => None,
        };
        let Some(levels) = levels else {
            tracing::warn!(
                instrument = %current.instrument,
                granularity = %current.granularity,
                swing_target_id = status.swing_target_id,
                "Setup references a swing that no longer resolves."
            );
            return Ok(TradePlan::none());
        };

        let ave_mid = current.ave_mid();
        if !breaks_out(status.trend, &levels, ave_mid) {
            return Ok(TradePlan::none());
        }

        let units = match status.trend {
            Trend::Up => self.order_lot,
            Trend::Down => -self.order_lot,
        };
        scope.persisted("complete status", self.store.complete_iron_man(status.id).await)?;
        scope.persisted("complete queue entry", self.store.complete_trade_rule(entry.id).await)?;

        tracing::info!(
            rule = %self.kind(),
            instrument = %current.instrument,
            granularity = %current.granularity,
            time = %current.time,
            price = %ave_mid,
            units,
            "IronMan trade happened."
        );
        Ok(TradePlan { triggered: true, units, closed: true })
    }
}
