//! Retry helper for transient SQLite lock contention.
//!
//! Upserts funnel through one writer connection, but the TTL sweeper and the
//! batch writer can still collide. Busy errors are retried with exponential
//! backoff and jitter; everything else surfaces immediately.

use rand::random;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

use crate::{Error, Result};

const MAX_RETRIES: u32 = 10;
const BASE_DELAY_MS: u64 = 15;
const MAX_DELAY_MS: u64 = 1500;

/// SQLITE_BUSY (5) and SQLITE_LOCKED (6), with a message fallback for errors
/// the driver does not surface as database errors.
fn is_busy(err: &Error) -> bool {
    let Error::DatabaseSqlx(sqlx_err) = err else {
        return false;
    };
    if let sqlx::Error::Database(db_err) = sqlx_err
        && matches!(db_err.code().as_deref(), Some("5") | Some("6"))
    {
        return true;
    }
    let msg = sqlx_err.to_string().to_ascii_lowercase();
    msg.contains("database is locked") || msg.contains("database is busy")
}

fn backoff_delay(attempt: u32) -> Duration {
    let exp = BASE_DELAY_MS.saturating_mul(1u64 << attempt.min(16)).min(MAX_DELAY_MS);
    let jitter = random::<u64>() % (exp / 3 + 1);
    Duration::from_millis((exp + jitter).min(MAX_DELAY_MS))
}

/// Run `op` until it succeeds, fails with a non-busy error, or exhausts the
/// retry budget.
pub async fn retry_on_busy<T, F, Fut>(op_name: &'static str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if !is_busy(&err) || attempt >= MAX_RETRIES {
            return Err(err);
        }

        let delay = backoff_delay(attempt);
        attempt += 1;
        debug!(op = op_name, ?delay, attempt, "SQLite busy, backing off");
        sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_database_errors_are_not_busy() {
        assert!(!is_busy(&Error::Other("nope".to_string())));
    }

    #[test]
    fn backoff_grows_but_stays_capped() {
        assert!(backoff_delay(0) >= Duration::from_millis(BASE_DELAY_MS));
        assert!(backoff_delay(12) <= Duration::from_millis(MAX_DELAY_MS));
    }

    #[tokio::test]
    async fn gives_up_on_plain_errors_immediately() {
        let mut calls = 0;
        let result: Result<()> = retry_on_busy("test", || {
            calls += 1;
            async { Err(Error::Other("hard failure".to_string())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
