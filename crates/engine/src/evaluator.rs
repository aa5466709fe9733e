// In crates/engine/src/evaluator.rs

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use core_types::{Candle, Granularity, Instrument};
use database::RuleStore;
use events::{RuleContext, RuleEvent, TradeDetails};
use rules::TradeRule;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// What the lock holder knows about its stream: the latest candle time whose
/// trade plans have been judged.
#[derive(Debug, Default)]
pub struct KeyState {
    pub last_judged: Option<DateTime<Utc>>,
}

/// One async lock per (instrument, granularity), so a stream is judged by at
/// most one evaluation at a time while other streams proceed.
#[derive(Debug, Default)]
pub struct KeyLocks {
    locks: Mutex<HashMap<(Instrument, Granularity), Arc<AsyncMutex<KeyState>>>>,
}

impl KeyLocks {
    pub async fn acquire(&self, instrument: &Instrument, granularity: Granularity) -> OwnedMutexGuard<KeyState> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks
                .entry((instrument.clone(), granularity))
                .or_default()
                .clone()
        };
        lock.lock_owned().await
    }
}

/// Runs the configured rules over one candle: every setup judgement first,
/// then a trade-plan judgement for each active queue entry.
pub struct Evaluator {
    rules: Vec<Box<dyn TradeRule>>,
    store: Arc<dyn RuleStore>,
    locks: KeyLocks,
}

impl Evaluator {
    pub fn new(rules: Vec<Box<dyn TradeRule>>, store: Arc<dyn RuleStore>) -> Self {
        Self {
            rules,
            store,
            locks: KeyLocks::default(),
        }
    }

    fn context(rule: &dyn TradeRule, candle: &Candle) -> RuleContext {
        RuleContext {
            rule: rule.kind(),
            instrument: candle.instrument.clone(),
            granularity: candle.granularity,
            time: candle.time,
            price: rule.reference_price(candle),
        }
    }

    /// Judges `current` given the candle before it on the same stream.
    pub async fn on_candle(&self, previous: &Candle, current: &Candle) -> Result<Vec<RuleEvent>> {
        if !previous.same_stream(current) {
            return Err(Error::MismatchedPair {
                previous: format!("{} {}", previous.instrument, previous.granularity),
                current: format!("{} {}", current.instrument, current.granularity),
            });
        }
        if previous.time > current.time {
            return Err(Error::OutOfOrder {
                instrument: current.instrument.clone(),
                granularity: current.granularity,
                previous: previous.time,
                current: current.time,
            });
        }

        let mut state = self.locks.acquire(&current.instrument, current.granularity).await;
        let mut events = Vec::new();

        // 1. Setups. Each must be stored before any trade plan is judged.
        for rule in &self.rules {
            if rule.judge_setup(previous, current).await? {
                events.push(RuleEvent::SetupHappened(Self::context(rule.as_ref(), current)));
            }
        }

        // 2. Trade plans, once per candle time. An updated bar at a time
        // already judged does not count as the next candle.
        if state.last_judged.is_some_and(|t| t >= current.time) {
            tracing::debug!(
                instrument = %current.instrument,
                granularity = %current.granularity,
                time = %current.time,
                "Trade plans already judged for this candle time."
            );
        } else {
            self.judge_trade_plans(current, &mut events).await?;
            state.last_judged = Some(current.time);
        }

        if !events.is_empty() {
            tracing::debug!(
                instrument = %current.instrument,
                granularity = %current.granularity,
                time = %current.time,
                count = events.len(),
                "Candle produced rule events."
            );
        }
        Ok(events)
    }

    async fn judge_trade_plans(&self, current: &Candle, events: &mut Vec<RuleEvent>) -> Result<()> {
        for rule in &self.rules {
            let entry = self
                .store
                .find_trade_rule(rule.kind(), &current.instrument, current.granularity)
                .await
                .map_err(|source| Error::Store {
                    rule: rule.kind(),
                    instrument: current.instrument.clone(),
                    granularity: current.granularity,
                    source,
                })?;
            let Some(entry) = entry.filter(|e| e.active) else {
                continue;
            };
            // Confirmation needs a candle after the one that armed the entry.
            if entry.candle_time >= current.time {
                continue;
            }

            let plan = rule.judge_trade_plan(&entry, current).await?;
            let context = Self::context(rule.as_ref(), current);
            if plan.triggered {
                events.push(RuleEvent::TradeHappened(TradeDetails { context, units: plan.units }));
            } else if plan.closed {
                events.push(RuleEvent::SetupExpired(context));
            }
        }
        Ok(())
    }
}
