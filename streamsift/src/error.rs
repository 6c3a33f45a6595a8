//! Application-level error type.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(String),

    #[error("database error: {0}")]
    DatabaseSqlx(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Engine(#[from] sift_engine::EngineError),

    #[error("search failed: {0}")]
    Search(std::sync::Arc<sift_engine::EngineError>),

    #[error("metadata lookup failed: {0}")]
    Metadata(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config(reason.into())
    }

    pub fn metadata(reason: impl Into<String>) -> Self {
        Self::Metadata(reason.into())
    }
}
