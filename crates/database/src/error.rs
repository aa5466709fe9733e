// In crates/database/src/error.rs

use core_types::RecordId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to connect to the database")]
    ConnectionError(#[from] sqlx::Error),
    #[error("Database migration failed: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),
    #[error("Database operation failed")]
    OperationFailed(#[source] sqlx::Error),
    #[error("No {table} record with id {id}")]
    MissingRecord { table: &'static str, id: RecordId },
    #[error("Stored record is invalid: {0}")]
    Corrupt(#[from] core_types::Error),
    #[error("Failed to convert decimal value: {0}")]
    Decimal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
