// In crates/app-config/src/types.rs

use core_types::{Granularity, Instrument, RuleKind};
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    /// The application's general settings.
    pub app: AppSettings,
    /// Settings for the rule state database.
    pub database: DatabaseSettings,
    /// Settings consumed by the rule engines.
    pub trading: TradingSettings,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AppSettings {
    /// The environment the application is running in (e.g., "development", "production").
    pub environment: String,
    /// The log level for the application.
    pub log_level: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct DatabaseSettings {
    /// The connection URL for the PostgreSQL database.
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Deserialize, Debug, Clone)]
pub struct TradingSettings {
    /// Units per order. IronMan signs it by trend direction.
    pub order_lot: i64,
    /// How many candles the cache keeps per instrument and granularity.
    #[serde(default = "default_candle_history")]
    pub candle_history: usize,
}

// --- Structs for live.toml Configuration ---

/// The pairs to evaluate and the rules to run on each.
#[derive(Deserialize, Debug, Clone)]
pub struct LiveConfig {
    #[serde(rename = "pairs")]
    pub pair_configs: Vec<PairConfig>,
}

/// Configuration for a single (instrument, granularity) stream.
#[derive(Deserialize, Debug, Clone)]
pub struct PairConfig {
    pub instrument: Instrument,
    pub granularity: Granularity,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_rules")]
    pub rules: Vec<RuleKind>,
}

impl LiveConfig {
    /// The enabled pair for this stream, if any.
    pub fn pair(&self, instrument: &Instrument, granularity: Granularity) -> Option<&PairConfig> {
        self.pair_configs
            .iter()
            .find(|p| p.enabled && &p.instrument == instrument && p.granularity == granularity)
    }
}

/// Helper functions for serde defaults
fn default_max_connections() -> u32 { 5 }
fn default_candle_history() -> usize { 5 }
fn default_enabled() -> bool { true }
fn default_rules() -> Vec<RuleKind> {
    vec![RuleKind::CaptainAmerica, RuleKind::IronMan]
}
