// In crates/database/src/memory.rs

use crate::{Error, Result, RuleStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{
    CaptainAmericaStatus, Granularity, Instrument, IronManSetup, IronManStatus, RecordId,
    RuleKind, SwingHighLowPrice, SwingTarget, TradeRuleStatus,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::Mutex;

type Key = (Instrument, Granularity);

#[derive(Debug, Default)]
struct Tables {
    next_id: RecordId,
    captain_america: HashMap<Key, CaptainAmericaStatus>,
    iron_man: Vec<IronManStatus>,
    swing_targets: Vec<SwingTarget>,
    swing_prices: HashMap<RecordId, SwingHighLowPrice>,
    trade_rules: Vec<TradeRuleStatus>,
}

impl Tables {
    fn next_id(&mut self) -> RecordId {
        self.next_id += 1;
        self.next_id
    }

    /// Creates the queue entry for the key, or re-arms the existing one.
    fn arm_trade_rule(
        &mut self,
        rule: RuleKind,
        instrument: &Instrument,
        granularity: Granularity,
        candle_time: DateTime<Utc>,
    ) -> TradeRuleStatus {
        if let Some(entry) = self
            .trade_rules
            .iter_mut()
            .find(|e| e.rule == rule && &e.instrument == instrument && e.granularity == granularity)
        {
            entry.candle_time = candle_time;
            entry.active = true;
            return entry.clone();
        }
        let entry = TradeRuleStatus {
            id: self.next_id(),
            rule,
            instrument: instrument.clone(),
            granularity,
            candle_time,
            active: true,
        };
        self.trade_rules.push(entry.clone());
        entry
    }
}

/// A process-local `RuleStore`.
///
/// Every operation takes the same lock, so each read-modify-write is atomic
/// with respect to every other caller.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RuleStore for MemoryStore {
    async fn find_captain_america(
        &self,
        instrument: &Instrument,
        granularity: Granularity,
    ) -> Result<Option<CaptainAmericaStatus>> {
        let tables = self.tables.lock().await;
        Ok(tables.captain_america.get(&(instrument.clone(), granularity)).cloned())
    }

    async fn save_captain_america(&self, status: &CaptainAmericaStatus) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables
            .captain_america
            .insert((status.instrument.clone(), status.granularity), status.clone());
        Ok(())
    }

    async fn setup_captain_america(
        &self,
        status: &CaptainAmericaStatus,
        candle_time: DateTime<Utc>,
    ) -> Result<TradeRuleStatus> {
        let mut tables = self.tables.lock().await;
        tables
            .captain_america
            .insert((status.instrument.clone(), status.granularity), status.clone());
        Ok(tables.arm_trade_rule(
            RuleKind::CaptainAmerica,
            &status.instrument,
            status.granularity,
            candle_time,
        ))
    }

    async fn find_iron_man(
        &self,
        instrument: &Instrument,
        granularity: Granularity,
    ) -> Result<Option<IronManStatus>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .iron_man
            .iter()
            .rev()
            .find(|s| &s.instrument == instrument && s.granularity == granularity)
            .cloned())
    }

    async fn create_iron_man(
        &self,
        setup: &IronManSetup,
        candle_time: DateTime<Utc>,
    ) -> Result<IronManStatus> {
        let mut tables = self.tables.lock().await;
        for live in tables.iron_man.iter_mut().filter(|s| {
            s.active && s.instrument == setup.instrument && s.granularity == setup.granularity
        }) {
            live.active = false;
        }
        let status = IronManStatus {
            id: tables.next_id(),
            instrument: setup.instrument.clone(),
            granularity: setup.granularity,
            swing_target_id: setup.swing_target_id,
            trend: setup.trend,
            active: true,
        };
        tables.iron_man.push(status.clone());
        tables.arm_trade_rule(RuleKind::IronMan, &setup.instrument, setup.granularity, candle_time);
        Ok(status)
    }

    async fn complete_iron_man(&self, id: RecordId) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let status = tables
            .iron_man
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(Error::MissingRecord { table: "iron_man_status", id })?;
        status.active = false;
        Ok(())
    }

    async fn find_current_swing_target(
        &self,
        instrument: &Instrument,
        granularity: Granularity,
    ) -> Result<Option<SwingTarget>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .swing_targets
            .iter()
            .rev()
            .find(|t| &t.instrument == instrument && t.granularity == granularity)
            .cloned())
    }

    async fn find_swing_target(&self, id: RecordId) -> Result<Option<SwingTarget>> {
        let tables = self.tables.lock().await;
        Ok(tables.swing_targets.iter().find(|t| t.id == id).cloned())
    }

    async fn find_swing_high_low(&self, swing_id: RecordId) -> Result<Option<SwingHighLowPrice>> {
        let tables = self.tables.lock().await;
        Ok(tables.swing_prices.get(&swing_id).copied())
    }

    async fn record_swing(
        &self,
        instrument: &Instrument,
        granularity: Granularity,
        high_price: Decimal,
        low_price: Decimal,
    ) -> Result<SwingTarget> {
        let mut tables = self.tables.lock().await;
        let swing_id = tables.next_id();
        tables
            .swing_prices
            .insert(swing_id, SwingHighLowPrice { swing_id, high_price, low_price });
        let target = SwingTarget {
            id: tables.next_id(),
            instrument: instrument.clone(),
            granularity,
            swing_id,
        };
        tables.swing_targets.push(target.clone());
        Ok(target)
    }

    async fn find_trade_rule(
        &self,
        rule: RuleKind,
        instrument: &Instrument,
        granularity: Granularity,
    ) -> Result<Option<TradeRuleStatus>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .trade_rules
            .iter()
            .find(|e| e.rule == rule && &e.instrument == instrument && e.granularity == granularity)
            .cloned())
    }

    async fn complete_trade_rule(&self, id: RecordId) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let entry = tables
            .trade_rules
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(Error::MissingRecord { table: "trade_rule_status", id })?;
        entry.active = false;
        Ok(())
    }
}
