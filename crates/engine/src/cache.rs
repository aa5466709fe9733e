// In crates/engine/src/cache.rs

use crate::{Error, Result};
use core_types::{Candle, Granularity, Instrument};
use std::collections::{HashMap, VecDeque};

/// The in-memory "hot" cache of recent candles, one bounded history per
/// (instrument, granularity).
#[derive(Debug)]
pub struct CandleCache {
    capacity: usize,
    streams: HashMap<(Instrument, Granularity), VecDeque<Candle>>,
}

impl CandleCache {
    /// `capacity` is clamped to two, the minimum the rules need.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(2),
            streams: HashMap::new(),
        }
    }

    /// Appends a candle to its stream.
    ///
    /// A candle with the same time as the latest one replaces it (an
    /// in-progress bar being updated). An older candle is rejected.
    pub fn push(&mut self, candle: Candle) -> Result<()> {
        let capacity = self.capacity;
        let stream = self
            .streams
            .entry((candle.instrument.clone(), candle.granularity))
            .or_insert_with(|| VecDeque::with_capacity(capacity + 1));

        if let Some(last) = stream.back_mut() {
            if candle.time < last.time {
                return Err(Error::OutOfOrder {
                    instrument: candle.instrument,
                    granularity: candle.granularity,
                    previous: last.time,
                    current: candle.time,
                });
            }
            if candle.time == last.time {
                *last = candle;
                return Ok(());
            }
        }

        stream.push_back(candle);
        if stream.len() > capacity {
            stream.pop_front();
        }
        Ok(())
    }

    pub fn latest(&self, instrument: &Instrument, granularity: Granularity) -> Option<&Candle> {
        self.stream(instrument, granularity)?.back()
    }

    pub fn previous(&self, instrument: &Instrument, granularity: Granularity) -> Option<&Candle> {
        let stream = self.stream(instrument, granularity)?;
        stream.len().checked_sub(2).and_then(|i| stream.get(i))
    }

    /// The (previous, latest) pair the rules are judged on.
    pub fn pair(&self, instrument: &Instrument, granularity: Granularity) -> Option<(&Candle, &Candle)> {
        Some((
            self.previous(instrument, granularity)?,
            self.latest(instrument, granularity)?,
        ))
    }

    fn stream(&self, instrument: &Instrument, granularity: Granularity) -> Option<&VecDeque<Candle>> {
        self.streams.get(&(instrument.clone(), granularity))
    }
}
