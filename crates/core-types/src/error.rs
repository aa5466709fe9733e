// In crates/core-types/src/error.rs

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Unknown granularity: {0}")]
    InvalidGranularity(String),

    #[error("Unknown line classification: {0}")]
    InvalidLine(String),

    #[error("Unknown trend classification: {0}")]
    InvalidTrend(String),

    #[error("Unknown trade rule: {0}")]
    InvalidRuleKind(String),

    #[error("Illegal rule status: {0}")]
    InvalidTransition(String),
}

pub type Result<T> = std::result::Result<T, Error>;
