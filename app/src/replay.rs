// In app/src/replay.rs

use anyhow::{Context, Result};
use core_types::{Candle, Granularity, Instrument};
use database::RuleStore;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;

/// A recorded session: the swings in force and the candles to replay.
#[derive(Deserialize, Debug)]
pub struct ReplayFile {
    #[serde(default)]
    pub swings: Vec<SwingSeed>,
    pub candles: Vec<Candle>,
}

#[derive(Deserialize, Debug)]
pub struct SwingSeed {
    pub instrument: Instrument,
    pub granularity: Granularity,
    pub high: Decimal,
    pub low: Decimal,
}

pub fn load(path: &Path) -> Result<ReplayFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read replay file {}", path.display()))?;
    let mut file: ReplayFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse replay file {}", path.display()))?;
    // The cache rejects regressions, so order by time up front.
    file.candles.sort_by_key(|c| c.time);
    Ok(file)
}

/// Records each swing as the current target for its stream.
pub async fn seed_swings(store: &dyn RuleStore, swings: &[SwingSeed]) -> Result<()> {
    for swing in swings {
        if swing.high < swing.low {
            anyhow::bail!(
                "Swing for {} {} has high {} below low {}",
                swing.instrument,
                swing.granularity,
                swing.high,
                swing.low
            );
        }
        let target = store
            .record_swing(&swing.instrument, swing.granularity, swing.high, swing.low)
            .await?;
        tracing::info!(
            instrument = %swing.instrument,
            granularity = %swing.granularity,
            swing_target_id = target.id,
            high = %swing.high,
            low = %swing.low,
            "Swing recorded."
        );
    }
    Ok(())
}
