//! Transaction manager.
//!
//! Wraps explicit begin/commit/rollback so service code can run a named unit
//! of work inside one transaction. Transient failures (serialization
//! conflicts, deadlocks) retry the whole closure a bounded number of times
//! with a small linear backoff. READ COMMITTED is sufficient everywhere
//! because the claim query's row locks provide the needed serialization.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use notifier_common::{AppError, AppResult};
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};

/// Boxed future returned by transaction closures.
pub type TxFuture<'c, T> = Pin<Box<dyn Future<Output = AppResult<T>> + Send + 'c>>;

/// Default number of attempts for a transient transaction failure.
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Base backoff between transaction retries.
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// Scopes units of work to database transactions.
#[derive(Clone)]
pub struct TxManager {
    db: Arc<DatabaseConnection>,
    max_attempts: u32,
    retry_backoff: Duration,
}

impl TxManager {
    /// Create a transaction manager with default retry settings.
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    /// Override retry settings.
    #[must_use]
    pub fn with_retries(mut self, max_attempts: u32, retry_backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.retry_backoff = retry_backoff;
        self
    }

    /// The connection this manager opens transactions on.
    #[must_use]
    pub fn connection(&self) -> &DatabaseConnection {
        self.db.as_ref()
    }

    /// Run `f` inside a transaction named `name`.
    ///
    /// Commits iff `f` returns `Ok`; rolls back on any error (a dropped
    /// uncommitted transaction also rolls back, which covers panics).
    /// Transient errors re-run the whole closure up to the attempt limit.
    pub async fn execute<T, F>(&self, name: &str, f: F) -> AppResult<T>
    where
        T: Send,
        F: for<'c> Fn(&'c DatabaseTransaction) -> TxFuture<'c, T> + Send + Sync,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;

            let txn = self
                .db
                .begin()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

            match f(&txn).await {
                Ok(value) => match txn.commit().await {
                    Ok(()) => return Ok(value),
                    Err(e) => {
                        let err = AppError::Database(e.to_string());
                        if err.is_transient() && attempt < self.max_attempts {
                            tracing::warn!(tx = name, attempt, error = %err, "commit failed, retrying transaction");
                            tokio::time::sleep(self.retry_backoff * attempt).await;
                            continue;
                        }
                        return Err(err);
                    }
                },
                Err(err) => {
                    if let Err(rollback_err) = txn.rollback().await {
                        tracing::warn!(tx = name, error = %rollback_err, "rollback failed");
                    }
                    if err.is_transient() && attempt < self.max_attempts {
                        tracing::warn!(tx = name, attempt, error = %err, "transaction failed, retrying");
                        tokio::time::sleep(self.retry_backoff * attempt).await;
                        continue;
                    }
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn mock_db() -> Arc<DatabaseConnection> {
        Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection())
    }

    #[tokio::test]
    async fn test_execute_commits_on_ok() {
        let tm = TxManager::new(mock_db());
        let result = tm
            .execute("unit", |_txn| Box::pin(async move { Ok(42) }))
            .await
            .unwrap();
        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn test_execute_propagates_non_transient_errors() {
        let tm = TxManager::new(mock_db());
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = Arc::clone(&calls);

        let result: AppResult<()> = tm
            .execute("unit", move |_txn| {
                let calls = Arc::clone(&calls_in);
                Box::pin(async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(AppError::Validation("bad input".to_string()))
                })
            })
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1, "validation errors must not retry");
    }

    #[tokio::test]
    async fn test_execute_retries_transient_errors() {
        let tm = TxManager::new(mock_db()).with_retries(3, Duration::from_millis(1));
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = Arc::clone(&calls);

        let result: AppResult<()> = tm
            .execute("unit", move |_txn| {
                let calls = Arc::clone(&calls_in);
                Box::pin(async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(AppError::Database("deadlock detected".to_string()))
                })
            })
            .await;

        assert!(matches!(result, Err(AppError::Database(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3, "transient errors retry to the limit");
    }

    #[tokio::test]
    async fn test_execute_stops_retrying_after_success() {
        let tm = TxManager::new(mock_db()).with_retries(5, Duration::from_millis(1));
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = Arc::clone(&calls);

        let result = tm
            .execute("unit", move |_txn| {
                let calls = Arc::clone(&calls_in);
                Box::pin(async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(AppError::Database("SQLSTATE 40001".to_string()))
                    } else {
                        Ok("done")
                    }
                })
            })
            .await
            .unwrap();

        assert_eq!(result, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
