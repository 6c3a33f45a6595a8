//! Persistent result cache on embedded SQLite.
//!
//! WAL mode keeps reads flowing while writes continue; a single-connection
//! write pool serializes conflicting upserts under last-write-wins. Upserts
//! from the request path go through a batching buffer so latency never waits
//! on the database.

pub mod batching;
pub mod maintenance;
pub mod models;
pub mod retry;
pub mod store;

use crate::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

pub type DbPool = SqlitePool;

/// Read and write pools over one database file.
///
/// The write pool holds a single connection: SQLite allows one writer at a
/// time and funneling writers avoids busy-loops under load.
pub async fn create_pools(database_url: &str) -> Result<(DbPool, DbPool)> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .busy_timeout(std::time::Duration::from_secs(5));

    let read_pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options.clone())
        .await?;
    let write_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&write_pool).await?;

    Ok((read_pool, write_pool))
}

/// Pool pair for a database file under `data_dir`, creating the directory on
/// first run.
pub async fn create_pools_at(path: &Path) -> Result<(DbPool, DbPool)> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let url = format!(
        "sqlite://{}",
        path.to_str()
            .ok_or_else(|| Error::Database("non-UTF8 database path".to_string()))?
    );
    create_pools(&url).await
}
