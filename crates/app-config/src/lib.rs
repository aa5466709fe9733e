// In crates/app-config/src/lib.rs

use config::{Config, Environment, File, FileFormat};
use std::path::Path;

pub mod error;
pub mod types;

// Re-export the most important types for easy access.
pub use error::{Error, Result};
pub use types::{LiveConfig, PairConfig, Settings};

/// Loads the application settings from various sources.
///
/// This function orchestrates the layered configuration loading:
/// 1. Reads from a default `base.toml` file.
/// 2. Merges settings from an environment-specific file (e.g., `development.toml`).
/// 3. Merges settings from environment variables.
pub fn load_settings() -> Result<Settings> {
    // Get the current environment. Default to "development" if not set.
    let environment = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "development".into());

    let settings = Config::builder()
        .add_source(File::with_name("config/base"))
        .add_source(File::with_name(&format!("config/{}", environment)).required(false))
        // e.g. `APP__DATABASE__URL=...` or `APP__TRADING__ORDER_LOT=...`
        .add_source(Environment::with_prefix("APP").prefix_separator("__").separator("__"))
        .build()?;

    validate(settings.try_deserialize()?)
}

/// Parses settings from a TOML document, without the file and environment layers.
pub fn settings_from_str(toml: &str) -> Result<Settings> {
    let settings = Config::builder()
        .add_source(File::from_str(toml, FileFormat::Toml))
        .build()?;

    validate(settings.try_deserialize()?)
}

fn validate(settings: Settings) -> Result<Settings> {
    if settings.trading.order_lot <= 0 {
        return Err(Error::Invalid(format!(
            "trading.order_lot must be positive, got {}",
            settings.trading.order_lot
        )));
    }
    if settings.trading.candle_history < 2 {
        return Err(Error::Invalid(
            "trading.candle_history must keep at least two candles".into(),
        ));
    }
    Ok(settings)
}

/// Loads the pair list from a `live.toml` file.
pub fn load_live_config(path: impl AsRef<Path>) -> Result<LiveConfig> {
    let content = std::fs::read_to_string(path)?;

    let config: LiveConfig = toml::from_str(&content)?;
    Ok(config)
}
