// In crates/database/src/lib.rs

use app_config::types::DatabaseSettings;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{
    CaptainAmericaStatus, Granularity, Instrument, IronManSetup, IronManStatus, RecordId,
    RuleKind, SwingHighLowPrice, SwingTarget, TradeRuleStatus,
};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;

pub mod error;
pub mod memory;
pub mod postgres;

// Re-export the most important types for easy access.
pub use error::{Error, Result};
pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Durable storage for rule status records.
///
/// Lookups that find nothing return `Ok(None)`; that is the normal "no
/// setup yet" state. An `Err` always means the store itself failed.
///
/// Implementations must serialise read-modify-write sequences per key so
/// that the at-most-one-live-record invariant holds under concurrent use.
#[async_trait]
pub trait RuleStore: Send + Sync {
    async fn find_captain_america(
        &self,
        instrument: &Instrument,
        granularity: Granularity,
    ) -> Result<Option<CaptainAmericaStatus>>;

    /// Creates the record for the status' key, or overwrites the existing one.
    async fn save_captain_america(&self, status: &CaptainAmericaStatus) -> Result<()>;

    /// Saves a fresh setup and arms its queue entry at `candle_time` in one
    /// write. Either both are stored or neither is.
    async fn setup_captain_america(
        &self,
        status: &CaptainAmericaStatus,
        candle_time: DateTime<Utc>,
    ) -> Result<TradeRuleStatus>;

    /// The most recent IronMan record for the key, live or resolved.
    async fn find_iron_man(
        &self,
        instrument: &Instrument,
        granularity: Granularity,
    ) -> Result<Option<IronManStatus>>;

    /// Stores a new live IronMan record, retiring any live record for the same
    /// key, and arms its queue entry at `candle_time`. Either all of it is
    /// stored or none of it is.
    async fn create_iron_man(
        &self,
        setup: &IronManSetup,
        candle_time: DateTime<Utc>,
    ) -> Result<IronManStatus>;

    async fn complete_iron_man(&self, id: RecordId) -> Result<()>;

    /// The swing target currently in force for the key.
    async fn find_current_swing_target(
        &self,
        instrument: &Instrument,
        granularity: Granularity,
    ) -> Result<Option<SwingTarget>>;

    async fn find_swing_target(&self, id: RecordId) -> Result<Option<SwingTarget>>;

    async fn find_swing_high_low(&self, swing_id: RecordId) -> Result<Option<SwingHighLowPrice>>;

    /// Appends a new swing and makes it the current target for the key.
    async fn record_swing(
        &self,
        instrument: &Instrument,
        granularity: Granularity,
        high_price: Decimal,
        low_price: Decimal,
    ) -> Result<SwingTarget>;

    async fn find_trade_rule(
        &self,
        rule: RuleKind,
        instrument: &Instrument,
        granularity: Granularity,
    ) -> Result<Option<TradeRuleStatus>>;

    async fn complete_trade_rule(&self, id: RecordId) -> Result<()>;
}

/// Establishes a connection pool to the PostgreSQL database and runs migrations.
///
/// # Arguments
///
/// * `settings`: The database configuration settings.
///
/// # Returns
///
/// A `Result` containing the `PgStore` on success, or an `Error` on failure.
pub async fn connect(settings: &DatabaseSettings) -> Result<PgStore> {
    // The `?` operator uses the `#[from]` attribute in our error enum
    // to convert the `sqlx::Error` into a `database::Error`.
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&settings.url)
        .await?;

    sqlx::migrate!("../../migrations").run(&pool).await?;
    tracing::info!(max_connections = settings.max_connections, "Rule state store is ready.");

    Ok(PgStore::new(pool))
}
