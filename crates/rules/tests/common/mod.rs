//! Shared fixtures for the rule engine tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use core_types::{
    Candle, CaptainAmericaStatus, Granularity, Instrument, IronManSetup, IronManStatus, Line,
    Rate, RecordId, RuleKind, SwingHighLowPrice, SwingTarget, TradeRuleStatus, Trend,
};
use database::{MemoryStore, RuleStore};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicBool, Ordering};

pub const LOT: i64 = 1000;

pub fn eurusd() -> Instrument {
    Instrument::new("EURUSD")
}

pub fn time(step: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::minutes(5 * step)
}

/// An EURUSD M5 candle whose close mid and ave mid both equal `mid`.
pub fn candle(step: i64, mid: Decimal) -> Candle {
    let spread = dec!(0.0001);
    let flat = |price: Decimal| Rate { open: price, high: price, low: price, close: price };
    Candle {
        instrument: eurusd(),
        granularity: Granularity::M5,
        bid: flat(mid - spread),
        ask: flat(mid + spread),
        time: time(step),
        volume: dec!(100),
        line: Line::Positive,
        trend: Trend::Up,
    }
}

/// A `MemoryStore` that can be told to start failing.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_next_write: AtomicBool,
}

impl FlakyStore {
    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    /// Fails the next write only, then behaves normally again.
    pub fn fail_next_write(&self) {
        self.fail_next_write.store(true, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn read(&self) -> database::Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(database::Error::OperationFailed(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }

    fn write(&self) -> database::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) || self.fail_next_write.swap(false, Ordering::SeqCst) {
            return Err(database::Error::OperationFailed(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl RuleStore for FlakyStore {
    async fn find_captain_america(
        &self,
        instrument: &Instrument,
        granularity: Granularity,
    ) -> database::Result<Option<CaptainAmericaStatus>> {
        self.read()?;
        self.inner.find_captain_america(instrument, granularity).await
    }

    async fn save_captain_america(&self, status: &CaptainAmericaStatus) -> database::Result<()> {
        self.write()?;
        self.inner.save_captain_america(status).await
    }

    async fn find_iron_man(
        &self,
        instrument: &Instrument,
        granularity: Granularity,
    ) -> database::Result<Option<IronManStatus>> {
        self.read()?;
        self.inner.find_iron_man(instrument, granularity).await
    }

    async fn setup_captain_america(
        &self,
        status: &CaptainAmericaStatus,
        candle_time: DateTime<Utc>,
    ) -> database::Result<TradeRuleStatus> {
        self.write()?;
        self.inner.setup_captain_america(status, candle_time).await
    }

    async fn create_iron_man(
        &self,
        setup: &IronManSetup,
        candle_time: DateTime<Utc>,
    ) -> database::Result<IronManStatus> {
        self.write()?;
        self.inner.create_iron_man(setup, candle_time).await
    }

    async fn complete_iron_man(&self, id: RecordId) -> database::Result<()> {
        self.write()?;
        self.inner.complete_iron_man(id).await
    }

    async fn find_current_swing_target(
        &self,
        instrument: &Instrument,
        granularity: Granularity,
    ) -> database::Result<Option<SwingTarget>> {
        self.read()?;
        self.inner.find_current_swing_target(instrument, granularity).await
    }

    async fn find_swing_target(&self, id: RecordId) -> database::Result<Option<SwingTarget>> {
        self.read()?;
        self.inner.find_swing_target(id).await
    }

    async fn find_swing_high_low(&self, swing_id: RecordId) -> database::Result<Option<SwingHighLowPrice>> {
        self.read()?;
        self.inner.find_swing_high_low(swing_id).await
    }

    async fn record_swing(
        &self,
        instrument: &Instrument,
        granularity: Granularity,
        high_price: Decimal,
        low_price: Decimal,
    ) -> database::Result<SwingTarget> {
        self.write()?;
        self.inner.record_swing(instrument, granularity, high_price, low_price).await
    }

    async fn find_trade_rule(
        &self,
        rule: RuleKind,
        instrument: &Instrument,
        granularity: Granularity,
    ) -> database::Result<Option<TradeRuleStatus>> {
        self.read()?;
        self.inner.find_trade_rule(rule, instrument, granularity).await
    }

    async fn complete_trade_rule(&self, id: RecordId) -> database::Result<()> {
        self.write()?;
        self.inner.complete_trade_rule(id).await
    }
}
