// In crates/rules/src/error.rs

use core_types::{Granularity, Instrument, RuleKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The rule state store failed while a judgement was in progress.
    /// The judgement did not complete and must not be treated as "no setup".
    #[error("{rule} {operation} failed for {instrument} {granularity}")]
    Persistence {
        rule: RuleKind,
        instrument: Instrument,
        granularity: Granularity,
        operation: &'static str,
        #[source]
        source: database::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
