// In crates/engine/src/lib.rs

pub mod cache;
pub mod error;
pub mod evaluator;

pub use cache::CandleCache;
pub use error::{Error, Result};
pub use evaluator::{Evaluator, KeyLocks, KeyState};

use app_config::types::TradingSettings;
use app_config::LiveConfig;
use core_types::{Candle, Granularity, Instrument};
use database::RuleStore;
use events::RuleEvent;
use futures::future;
use rules::create_rules;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The portfolio-level orchestrator: one `Evaluator` per enabled pair.
pub struct Engine {
    evaluators: BTreeMap<(Instrument, Granularity), Arc<Evaluator>>,
    candle_history: usize,
}

impl Engine {
    pub fn new(
        live_config: &LiveConfig,
        trading: &TradingSettings,
        store: Arc<dyn RuleStore>,
    ) -> anyhow::Result<Self> {
        tracing::info!("Initializing rule engine...");
        let mut evaluators = BTreeMap::new();

        // Loop through the pairs defined in live.toml
        for pair_config in &live_config.pair_configs {
            if !pair_config.enabled {
                tracing::warn!(
                    instrument = %pair_config.instrument,
                    granularity = %pair_config.granularity,
                    "Skipping disabled pair."
                );
                continue;
            }

            let rules = create_rules(&pair_config.rules, store.clone(), trading.order_lot)?;
            let key = (pair_config.instrument.clone(), pair_config.granularity);
            if evaluators.contains_key(&key) {
                anyhow::bail!(
                    "Pair configured twice: {} {}",
                    pair_config.instrument,
                    pair_config.granularity
                );
            }
            tracing::info!(
                instrument = %pair_config.instrument,
                granularity = %pair_config.granularity,
                rules = ?pair_config.rules,
                "Pair ready."
            );
            evaluators.insert(key, Arc::new(Evaluator::new(rules, store.clone())));
        }

        if evaluators.is_empty() {
            anyhow::bail!("No pairs enabled. Check your live.toml configuration.");
        }

        Ok(Self {
            evaluators,
            candle_history: trading.candle_history,
        })
    }

    /// Feeds time-ordered candles through the rules.
    ///
    /// Each stream is processed in order; distinct streams run concurrently.
    /// Candles for pairs that are not configured are skipped.
    pub async fn replay(&self, candles: Vec<Candle>) -> Result<Vec<RuleEvent>> {
        let mut streams: BTreeMap<(Instrument, Granularity), Vec<Candle>> = BTreeMap::new();
        for candle in candles {
            streams
                .entry((candle.instrument.clone(), candle.granularity))
                .or_default()
                .push(candle);
        }

        let mut tasks = Vec::new();
        for (key, candles) in streams {
            let Some(evaluator) = self.evaluators.get(&key).cloned() else {
                tracing::warn!(
                    instrument = %key.0,
                    granularity = %key.1,
                    count = candles.len(),
                    "No rules configured for stream. Skipping its candles."
                );
                continue;
            };
            tasks.push(replay_stream(evaluator, self.candle_history, candles));
        }

        let results = future::join_all(tasks).await;
        let mut events = Vec::new();
        for result in results {
            events.extend(result?);
        }
        tracing::info!(count = events.len(), "Replay complete.");
        Ok(events)
    }
}

async fn replay_stream(
    evaluator: Arc<Evaluator>,
    candle_history: usize,
    candles: Vec<Candle>,
) -> Result<Vec<RuleEvent>> {
    let mut cache = CandleCache::new(candle_history);
    let mut events = Vec::new();

    for candle in candles {
        let (instrument, granularity) = (candle.instrument.clone(), candle.granularity);
        cache.push(candle)?;
        if let Some((previous, current)) = cache.pair(&instrument, granularity) {
            events.extend(evaluator.on_candle(previous, current).await?);
        }
    }
    Ok(events)
}
