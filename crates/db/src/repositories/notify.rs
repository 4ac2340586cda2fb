//! Notification repository.

use chrono::{DateTime, Utc};
use notifier_common::{AppError, AppResult};
use sea_orm::sea_query::{Expr, LockBehavior, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, SqlErr,
};
use uuid::Uuid;

use crate::entities::notification::{self, NotifyStatus};
use crate::entities::Notification;

/// Notification repository for database operations.
///
/// Every method takes an explicit executor so the same call can run on the
/// pool or inside a caller's open transaction. Row claiming relies on
/// `FOR UPDATE SKIP LOCKED`, so [`NotifyRepository::claim_due`] only makes
/// sense inside a transaction.
#[derive(Clone, Debug, Default)]
pub struct NotifyRepository {
    _private: (),
}

impl NotifyRepository {
    /// Create a new notification repository.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Find a notification by ID.
    pub async fn find_by_id<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: Uuid,
    ) -> AppResult<Option<notification::Model>> {
        Notification::find_by_id(id)
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a notification by ID, returning an error if not found.
    pub async fn get_by_id<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: Uuid,
    ) -> AppResult<notification::Model> {
        self.find_by_id(conn, id)
            .await?
            .ok_or_else(|| AppError::DataNotFound(format!("notification {id} not found")))
    }

    /// Persist a new notification row.
    ///
    /// The caller supplies `status = waiting` and `created_at`; no
    /// state-machine check happens here. Primary-key collisions surface as
    /// `ConflictingData`.
    pub async fn create<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: notification::ActiveModel,
    ) -> AppResult<notification::Model> {
        model.insert(conn).await.map_err(|e| {
            if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                AppError::ConflictingData(e.to_string())
            } else {
                AppError::Database(e.to_string())
            }
        })
    }

    /// Claim up to `limit` due notifications for processing.
    ///
    /// Returns rows with `status = waiting` and `scheduled_at <= now()`,
    /// oldest schedule first, locked with `FOR UPDATE SKIP LOCKED` so
    /// concurrent claimers see disjoint sets. The rows stay locked until the
    /// caller's transaction ends.
    pub async fn claim_due<C: ConnectionTrait>(
        &self,
        conn: &C,
        limit: u64,
    ) -> AppResult<Vec<notification::Model>> {
        if limit == 0 {
            return Err(AppError::Validation("claim limit must be >= 1".to_string()));
        }

        Notification::find()
            .filter(notification::Column::Status.eq(NotifyStatus::Waiting))
            .filter(notification::Column::ScheduledAt.lte(Utc::now()))
            .order_by_asc(notification::Column::ScheduledAt)
            .limit(limit)
            .lock_with_behavior(LockType::Update, LockBehavior::SkipLocked)
            .all(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Write a status transition.
    ///
    /// Side effects by target status: `sent` sets `sent_at = now()`,
    /// `failed` atomically increments `retry_count`, `cancelled` clears
    /// `sent_at`. `last_error` is overwritten with the given value or NULL.
    /// A duplicate transition into `sent` is a no-op; updating a missing row
    /// fails with `DataNotFound`.
    pub async fn update_status<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: Uuid,
        status: NotifyStatus,
        last_error: Option<&str>,
    ) -> AppResult<()> {
        let mut update = Notification::update_many()
            .col_expr(notification::Column::Status, Expr::value(status))
            .col_expr(
                notification::Column::LastError,
                Expr::value(last_error.map(str::to_owned)),
            )
            .filter(notification::Column::Id.eq(id));

        match status {
            NotifyStatus::Sent => {
                update = update
                    .col_expr(notification::Column::SentAt, Expr::value(Utc::now()))
                    // duplicate deliveries must not move sent_at
                    .filter(notification::Column::Status.ne(NotifyStatus::Sent));
            }
            NotifyStatus::Failed => {
                update = update.col_expr(
                    notification::Column::RetryCount,
                    Expr::col(notification::Column::RetryCount).add(1),
                );
            }
            NotifyStatus::Cancelled => {
                update = update.col_expr(
                    notification::Column::SentAt,
                    Expr::value(None::<chrono::DateTime<chrono::FixedOffset>>),
                );
            }
            NotifyStatus::Waiting | NotifyStatus::InProcess => {}
        }

        let res = update
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if res.rows_affected == 0 {
            let existing = self.find_by_id(conn, id).await?;
            return match existing {
                Some(row) if status == NotifyStatus::Sent && row.status == NotifyStatus::Sent => {
                    Ok(())
                }
                Some(_) | None => {
                    Err(AppError::DataNotFound(format!("notification {id} not found")))
                }
            };
        }

        Ok(())
    }

    /// Move a notification back to `waiting` with a new schedule.
    ///
    /// Clears `last_error` and does NOT reset `retry_count`, so repeated
    /// failures keep accumulating toward the retry limit.
    pub async fn reschedule<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: Uuid,
        new_scheduled_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let res = Notification::update_many()
            .col_expr(
                notification::Column::ScheduledAt,
                Expr::value(new_scheduled_at),
            )
            .col_expr(
                notification::Column::Status,
                Expr::value(NotifyStatus::Waiting),
            )
            .col_expr(notification::Column::LastError, Expr::value(None::<String>))
            .filter(notification::Column::Id.eq(id))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if res.rows_affected == 0 {
            return Err(AppError::DataNotFound(format!(
                "notification {id} not found"
            )));
        }

        Ok(())
    }

    /// Delete terminal rows older than the cutoff (retention sweep).
    pub async fn delete_old_completed<C: ConnectionTrait>(
        &self,
        conn: &C,
        cutoff: DateTime<Utc>,
    ) -> AppResult<u64> {
        let res = Notification::delete_many()
            .filter(notification::Column::Status.is_in([
                NotifyStatus::Sent,
                NotifyStatus::Failed,
                NotifyStatus::Cancelled,
            ]))
            .filter(notification::Column::CreatedAt.lt(cutoff))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(res.rows_affected)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::notification::NotifyChannel;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn create_test_notification(status: NotifyStatus) -> notification::Model {
        notification::Model {
            id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            channel: NotifyChannel::Email,
            payload: "hello".to_string(),
            recipient_identifier: "a@x.example".to_string(),
            scheduled_at: Utc::now().into(),
            sent_at: None,
            status,
            retry_count: 0,
            last_error: None,
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_find_by_id() {
        let row = create_test_notification(NotifyStatus::Waiting);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[row.clone()]])
            .into_connection();

        let repo = NotifyRepository::new();
        let result = repo.find_by_id(&db, row.id).await.unwrap();
        assert_eq!(result.unwrap().id, row.id);
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<notification::Model>::new()])
            .into_connection();

        let repo = NotifyRepository::new();
        let result = repo.get_by_id(&db, Uuid::now_v7()).await;
        assert!(matches!(result, Err(AppError::DataNotFound(_))));
    }

    #[tokio::test]
    async fn test_claim_due_rejects_zero_limit() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

        let repo = NotifyRepository::new();
        let result = repo.claim_due(&db, 0).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_claim_due_returns_batch() {
        let rows = vec![
            create_test_notification(NotifyStatus::Waiting),
            create_test_notification(NotifyStatus::Waiting),
        ];
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([rows.clone()])
            .into_connection();

        let repo = NotifyRepository::new();
        let claimed = repo.claim_due(&db, 50).await.unwrap();
        assert_eq!(claimed.len(), 2);
    }

    #[tokio::test]
    async fn test_claim_due_query_uses_skip_locked() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<notification::Model>::new()])
            .into_connection();

        let repo = NotifyRepository::new();
        repo.claim_due(&db, 10).await.unwrap();

        let log = db.into_transaction_log();
        let sql = format!("{log:?}");
        assert!(sql.contains("FOR UPDATE SKIP LOCKED"), "claim must skip locked rows: {sql}");
    }

    #[tokio::test]
    async fn test_update_status_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .append_query_results([Vec::<notification::Model>::new()])
            .into_connection();

        let repo = NotifyRepository::new();
        let result = repo
            .update_status(&db, Uuid::now_v7(), NotifyStatus::Failed, Some("smtp timeout"))
            .await;
        assert!(matches!(result, Err(AppError::DataNotFound(_))));
    }

    #[tokio::test]
    async fn test_update_status_sent_is_idempotent() {
        // 0 rows updated because the row already carries status = sent
        let row = create_test_notification(NotifyStatus::Sent);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .append_query_results([[row.clone()]])
            .into_connection();

        let repo = NotifyRepository::new();
        let result = repo.update_status(&db, row.id, NotifyStatus::Sent, None).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_update_status_sent_updates_row() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();

        let repo = NotifyRepository::new();
        let result = repo
            .update_status(&db, Uuid::now_v7(), NotifyStatus::Sent, None)
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_reschedule_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();

        let repo = NotifyRepository::new();
        let result = repo
            .reschedule(&db, Uuid::now_v7(), Utc::now() + chrono::Duration::minutes(5))
            .await;
        assert!(matches!(result, Err(AppError::DataNotFound(_))));
    }

    #[tokio::test]
    async fn test_reschedule_keeps_retry_count() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();

        let repo = NotifyRepository::new();
        repo.reschedule(&db, Uuid::now_v7(), Utc::now()).await.unwrap();

        let log = db.into_transaction_log();
        let sql = format!("{log:?}");
        assert!(
            !sql.contains("retry_count"),
            "reschedule must not touch retry_count: {sql}"
        );
    }

    #[tokio::test]
    async fn test_delete_old_completed() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 7,
            }])
            .into_connection();

        let repo = NotifyRepository::new();
        let deleted = repo
            .delete_old_completed(&db, Utc::now() - chrono::Duration::days(30))
            .await
            .unwrap();
        assert_eq!(deleted, 7);
    }
}
