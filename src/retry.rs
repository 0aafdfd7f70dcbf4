// Copyright 2025 RisingWave Labs
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Retry. Bounded retry-with-backoff for transient storage errors, so a
//! passing deadlock or a momentarily exhausted pool does not fail an
//! otherwise-healthy import job. Modeled on
//! `src/frontend/src/scheduler/hummock_snapshot_manager.rs`'s
//! `pin_epoch_with_retry`.

use std::future::Future;
use std::time::Duration;

use sea_orm::{DbErr, RuntimeErr};
use tokio_retry::strategy::{jitter, ExponentialBackoff};

const MAX_RETRIES: usize = 5;
const BASE_DELAY_MS: u64 = 20;
const MAX_DELAY: Duration = Duration::from_secs(2);

/// Connection drops, pool exhaustion, and Postgres
/// serialization-failure/deadlock SQLSTATEs (40001/40P01) are worth
/// retrying. Constraint violations, decode errors, and anything else
/// are not: retrying a bad query just fails the same way again.
fn is_retryable(err: &DbErr) -> bool {
    let runtime = match err {
        DbErr::ConnectionAcquire(_) => return true,
        DbErr::Conn(r) | DbErr::Exec(r) | DbErr::Query(r) => r,
        _ => return false,
    };
    match runtime {
        RuntimeErr::SqlxError(sqlx_err) => match sqlx_err {
            sea_orm::sqlx::Error::Io(_)
            | sea_orm::sqlx::Error::PoolTimedOut
            | sea_orm::sqlx::Error::WorkerCrashed => true,
            sea_orm::sqlx::Error::Database(db_err) => {
                matches!(db_err.code().as_deref(), Some("40001") | Some("40P01"))
            }
            _ => false,
        },
        #[allow(unreachable_patterns)]
        _ => false,
    }
}

/// Runs `op`, retrying up to [`MAX_RETRIES`] times with exponential
/// backoff and jitter when the failure is classified as transient by
/// [`is_retryable`]. Fatal errors and exhausted retries propagate as-is.
/// `op` must be safe to call more than once: callers that mutate state
/// across attempts (a transaction, say) should build that state fresh
/// inside the closure rather than reuse it across retries.
pub async fn with_retry<F, Fut, T>(label: &'static str, op: F) -> Result<T, DbErr>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, DbErr>>,
{
    let mut backoff = ExponentialBackoff::from_millis(BASE_DELAY_MS)
        .max_delay(MAX_DELAY)
        .map(jitter);

    let mut attempt = 0usize;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if attempt < MAX_RETRIES && is_retryable(&e) => {
                attempt += 1;
                let delay = backoff.next().unwrap_or(MAX_DELAY);
                tracing::warn!(
                    label,
                    attempt,
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "retrying transient database error"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn record_not_found_is_not_retryable() {
        assert!(!is_retryable(&DbErr::RecordNotFound("x".into())));
    }

    #[test]
    fn custom_error_is_not_retryable() {
        assert!(!is_retryable(&DbErr::Custom("boom".into())));
    }

    #[test]
    fn pool_timeout_is_retryable() {
        let err = DbErr::Conn(RuntimeErr::SqlxError(sea_orm::sqlx::Error::PoolTimedOut));
        assert!(is_retryable(&err));
    }

    #[tokio::test]
    async fn succeeds_without_retry_on_first_try() {
        let calls = AtomicUsize::new(0);
        let result: Result<u32, DbErr> = with_retry("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(7) }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fatal_error_is_not_retried() {
        let calls = AtomicUsize::new(0);
        let result: Result<u32, DbErr> = with_retry("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(DbErr::RecordNotFound("missing".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retryable_error_is_retried_then_succeeds() {
        let calls = AtomicUsize::new(0);
        let result: Result<u32, DbErr> = with_retry("test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(DbErr::Conn(RuntimeErr::SqlxError(
                        sea_orm::sqlx::Error::PoolTimedOut,
                    )))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
