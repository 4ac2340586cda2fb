//! Notification service.
//!
//! Owns the notification state machine: creation, status reads through the
//! cache, cancellation, the scheduler's claim-and-publish tick and the
//! worker's delivery bookkeeping.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use notifier_common::{AppError, AppResult, IdGenerator};
use notifier_db::entities::notification::{self, NotifyChannel, NotifyStatus};
use notifier_db::repositories::{NotifyRepository, UserLinkRepository};
use notifier_db::TxManager;
use sea_orm::{ActiveValue::Set, DatabaseConnection};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::StatusCache;
use crate::queue::QueueHandle;
use crate::retry::RetryPolicy;
use crate::services::recipient::RecipientResolver;
use crate::services::sender::SenderHandle;

/// Maximum payload size in bytes.
const MAX_PAYLOAD_BYTES: usize = 64 * 1024;

/// Operations slower than this log a warning.
const SLOW_OPERATION_THRESHOLD: Duration = Duration::from_millis(200);

/// Request to create a notification.
#[derive(Debug, Clone)]
pub struct CreateNotificationRequest {
    pub user_id: Uuid,
    pub channel: NotifyChannel,
    pub payload: String,
    pub scheduled_at: DateTime<Utc>,
}

/// Per-tick processing statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessingStats {
    /// Notifications published and marked `in_process`.
    pub processed: usize,
    /// Notifications that failed to publish.
    pub failed: usize,
    /// Wall-clock duration of the tick.
    pub duration: Duration,
}

/// Service for managing delayed notifications.
#[derive(Clone)]
pub struct NotifyService {
    db: Arc<DatabaseConnection>,
    tx: TxManager,
    repo: NotifyRepository,
    resolver: RecipientResolver,
    queue: QueueHandle,
    cache: Option<StatusCache>,
    sender: Option<SenderHandle>,
    retry: RetryPolicy,
    id_gen: IdGenerator,
}

impl NotifyService {
    /// Create a new notification service.
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>, queue: QueueHandle) -> Self {
        let tx = TxManager::new(Arc::clone(&db));
        Self {
            db,
            tx,
            repo: NotifyRepository::new(),
            resolver: RecipientResolver::new(UserLinkRepository::new()),
            queue,
            cache: None,
            sender: None,
            retry: RetryPolicy::default(),
            id_gen: IdGenerator::new(),
        }
    }

    /// Attach a status cache.
    #[must_use]
    pub fn with_cache(mut self, cache: StatusCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Attach a channel sender (required for delivery workers).
    #[must_use]
    pub fn with_sender(mut self, sender: SenderHandle) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Override the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Create a new notification.
    ///
    /// Validates the request, clamps past schedules to `now + 1 min`, then
    /// resolves the recipient and inserts the row in a single transaction.
    pub async fn create(
        &self,
        req: CreateNotificationRequest,
    ) -> AppResult<notification::Model> {
        let start = Instant::now();

        validate_create_request(&req)?;

        let now = Utc::now();
        let scheduled_at = clamp_schedule(now, req.scheduled_at);
        if scheduled_at != req.scheduled_at {
            debug!(
                original = %req.scheduled_at,
                adjusted = %scheduled_at,
                "scheduled_at adjusted to future"
            );
        }

        let id = self.id_gen.generate();
        let resolver = self.resolver.clone();
        let repo = self.repo.clone();
        let req = Arc::new(req);

        let created = self
            .tx
            .execute("create_notification", move |txn| {
                let resolver = resolver.clone();
                let repo = repo.clone();
                let req = Arc::clone(&req);
                Box::pin(async move {
                    let recipient = resolver.resolve(txn, req.user_id, req.channel).await?;

                    let model = notification::ActiveModel {
                        id: Set(id),
                        user_id: Set(req.user_id),
                        channel: Set(req.channel),
                        payload: Set(req.payload.clone()),
                        recipient_identifier: Set(recipient),
                        scheduled_at: Set(scheduled_at.into()),
                        sent_at: Set(None),
                        status: Set(NotifyStatus::Waiting),
                        retry_count: Set(0),
                        last_error: Set(None),
                        created_at: Set(now.into()),
                    };

                    repo.create(txn, model).await
                })
            })
            .await?;

        info!(id = %created.id, channel = %created.channel, scheduled_at = %created.scheduled_at, "notification created");
        self.log_slow("create", start);

        Ok(created)
    }

    /// Get a notification, cache first.
    pub async fn get_status(&self, id: Uuid) -> AppResult<notification::Model> {
        let start = Instant::now();

        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(id).await {
                self.log_slow("get_status", start);
                return Ok(cached);
            }
        }

        let notification = self
            .repo
            .find_by_id(self.db.as_ref(), id)
            .await?
            .ok_or_else(|| AppError::NotificationNotFound(id.to_string()))?;

        if let Some(cache) = &self.cache {
            cache.put(&notification).await;
        }

        self.log_slow("get_status", start);
        Ok(notification)
    }

    /// Cancel a notification.
    ///
    /// Terminal rows refuse with `NotificationAlreadySent` /
    /// `NotificationAlreadyCancelled`; anything else transitions to
    /// `cancelled` in one transaction.
    pub async fn cancel(&self, id: Uuid) -> AppResult<()> {
        let start = Instant::now();

        let repo = self.repo.clone();
        self.tx
            .execute("cancel_notification", move |txn| {
                let repo = repo.clone();
                Box::pin(async move {
                    let row = repo.find_by_id(txn, id).await?.ok_or_else(|| {
                        AppError::NotificationNotFound(id.to_string())
                    })?;

                    match row.status {
                        NotifyStatus::Sent => {
                            Err(AppError::NotificationAlreadySent(id.to_string()))
                        }
                        NotifyStatus::Cancelled => {
                            Err(AppError::NotificationAlreadyCancelled(id.to_string()))
                        }
                        _ => {
                            repo.update_status(
                                txn,
                                id,
                                NotifyStatus::Cancelled,
                                Some("cancelled by user"),
                            )
                            .await
                        }
                    }
                })
            })
            .await?;

        if let Some(cache) = &self.cache {
            cache.invalidate(id).await;
        }

        info!(id = %id, "notification cancelled");
        self.log_slow("cancel", start);
        Ok(())
    }

    /// One scheduler tick: claim due notifications, publish each to the
    /// queue and mark it `in_process`, all inside a single transaction.
    ///
    /// A publish failure marks that row `failed` and moves on — one bad
    /// notification never blocks the rest of the batch. Row locks hold
    /// until commit, so no other claimer can touch the batch mid-flight.
    pub async fn process_due(&self, limit: u64) -> AppResult<ProcessingStats> {
        let start = Instant::now();

        let repo = self.repo.clone();
        let queue = Arc::clone(&self.queue);

        let (mut stats, touched) = self
            .tx
            .execute("process_queue", move |txn| {
                let repo = repo.clone();
                let queue = Arc::clone(&queue);
                Box::pin(async move {
                    let batch = repo.claim_due(txn, limit).await?;
                    let mut stats = ProcessingStats::default();
                    let mut touched = Vec::with_capacity(batch.len());

                    if batch.is_empty() {
                        return Ok((stats, touched));
                    }

                    debug!(count = batch.len(), "processing batch");

                    for n in batch {
                        match queue.publish(&n).await {
                            Ok(()) => {
                                repo.update_status(txn, n.id, NotifyStatus::InProcess, None)
                                    .await?;
                                stats.processed += 1;
                            }
                            Err(e) => {
                                warn!(id = %n.id, error = %e, "failed to publish notification");
                                repo.update_status(
                                    txn,
                                    n.id,
                                    NotifyStatus::Failed,
                                    Some(&format!("publish error: {e}")),
                                )
                                .await?;
                                stats.failed += 1;
                            }
                        }
                        touched.push(n.id);
                    }

                    Ok((stats, touched))
                })
            })
            .await?;

        if let Some(cache) = &self.cache {
            for id in touched {
                cache.invalidate(id).await;
            }
        }

        stats.duration = start.elapsed();
        Ok(stats)
    }

    /// Worker-side delivery of one queued notification.
    ///
    /// Duplicate deliveries for rows already in a terminal status are
    /// acknowledged without action. The send outcome is recorded durably
    /// before this returns; only infrastructure failures propagate (and
    /// trigger broker-side redelivery).
    pub async fn deliver(&self, notification: notification::Model) -> AppResult<()> {
        let start = Instant::now();
        let id = notification.id;

        let Some(current) = self.repo.find_by_id(self.db.as_ref(), id).await? else {
            warn!(id = %id, "queued notification no longer exists, dropping");
            return Ok(());
        };
        if current.status.is_terminal() {
            debug!(id = %id, status = %current.status, "duplicate delivery for terminal notification, ignoring");
            return Ok(());
        }

        info!(id = %id, channel = %notification.channel, recipient = %notification.recipient_identifier, "delivering notification");

        let send_err = match &self.sender {
            Some(sender) => sender.send(&notification).await.err(),
            None => Some(AppError::UnsupportedChannel(
                "no sender configured".to_string(),
            )),
        };

        let send_err_text = send_err.as_ref().map(ToString::to_string);
        self.record_outcome(id, send_err_text).await?;

        if let Some(cache) = &self.cache {
            cache.invalidate(id).await;
        }

        match send_err {
            None => info!(id = %id, "notification sent"),
            Some(e) => warn!(id = %id, error = %e, "notification send failed"),
        }

        self.log_slow("deliver", start);
        Ok(())
    }

    /// Delete terminal rows older than the retention window.
    pub async fn cleanup_old(&self, older_than_days: i64) -> AppResult<u64> {
        let cutoff = Utc::now() - chrono::Duration::days(older_than_days);
        self.repo.delete_old_completed(self.db.as_ref(), cutoff).await
    }

    /// Record the outcome of a send attempt in one transaction.
    ///
    /// On failure the authoritative `retry_count` is re-read before the
    /// increment so concurrent duplicates cannot double-schedule, and the
    /// row is rescheduled with exponential backoff while retries remain.
    async fn record_outcome(&self, id: Uuid, send_err: Option<String>) -> AppResult<()> {
        let repo = self.repo.clone();
        let retry = self.retry.clone();

        self.tx
            .execute("update_after_send", move |txn| {
                let repo = repo.clone();
                let retry = retry.clone();
                let send_err = send_err.clone();
                Box::pin(async move {
                    let Some(message) = send_err else {
                        return repo.update_status(txn, id, NotifyStatus::Sent, None).await;
                    };

                    let row = repo.get_by_id(txn, id).await?;
                    repo.update_status(txn, id, NotifyStatus::Failed, Some(&message))
                        .await?;

                    let new_retry_count = row.retry_count + 1;
                    if retry.should_retry(new_retry_count) {
                        let delay = retry.delay_for_retry(new_retry_count);
                        let delay = chrono::Duration::from_std(delay)
                            .map_err(|e| AppError::Internal(format!("backoff out of range: {e}")))?;
                        let next_attempt = Utc::now() + delay;

                        repo.reschedule(txn, id, next_attempt).await?;

                        info!(
                            id = %id,
                            retry_count = new_retry_count,
                            next_attempt = %next_attempt,
                            "notification rescheduled"
                        );
                    }

                    Ok(())
                })
            })
            .await
    }

    fn log_slow(&self, op: &str, start: Instant) {
        let elapsed = start.elapsed();
        if elapsed > SLOW_OPERATION_THRESHOLD {
            warn!(op, duration_ms = elapsed.as_millis() as u64, "slow operation detected");
        }
    }
}

fn validate_create_request(req: &CreateNotificationRequest) -> AppResult<()> {
    if req.user_id.is_nil() {
        return Err(AppError::Validation("user_id is required".to_string()));
    }
    if req.payload.is_empty() {
        return Err(AppError::Validation("payload is required".to_string()));
    }
    if req.payload.len() > MAX_PAYLOAD_BYTES {
        return Err(AppError::Validation(format!(
            "payload exceeds {MAX_PAYLOAD_BYTES} bytes"
        )));
    }
    Ok(())
}

/// A schedule in the past is moved to `now + 1 min` (documented behavior,
/// not an error).
fn clamp_schedule(now: DateTime<Utc>, scheduled_at: DateTime<Utc>) -> DateTime<Utc> {
    if scheduled_at < now {
        now + chrono::Duration::minutes(1)
    } else {
        scheduled_at
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::queue::{NoOpQueue, NotifyQueue};
    use async_trait::async_trait;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn create_test_notification(status: NotifyStatus, retry_count: i32) -> notification::Model {
        notification::Model {
            id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            channel: NotifyChannel::Email,
            payload: "hello".to_string(),
            recipient_identifier: "a@x.example".to_string(),
            scheduled_at: Utc::now().into(),
            sent_at: None,
            status,
            retry_count,
            last_error: None,
            created_at: Utc::now().into(),
        }
    }

    fn service_with(db: MockDatabase) -> NotifyService {
        NotifyService::new(Arc::new(db.into_connection()), Arc::new(NoOpQueue))
    }

    fn valid_request() -> CreateNotificationRequest {
        CreateNotificationRequest {
            user_id: Uuid::now_v7(),
            channel: NotifyChannel::Email,
            payload: "hello".to_string(),
            scheduled_at: Utc::now() + chrono::Duration::hours(1),
        }
    }

    #[tokio::test]
    async fn test_create_rejects_nil_user() {
        let service = service_with(MockDatabase::new(DatabaseBackend::Postgres));
        let req = CreateNotificationRequest {
            user_id: Uuid::nil(),
            ..valid_request()
        };
        let result = service.create(req).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_rejects_empty_payload() {
        let service = service_with(MockDatabase::new(DatabaseBackend::Postgres));
        let req = CreateNotificationRequest {
            payload: String::new(),
            ..valid_request()
        };
        let result = service.create(req).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_rejects_oversized_payload() {
        let service = service_with(MockDatabase::new(DatabaseBackend::Postgres));
        let req = CreateNotificationRequest {
            payload: "x".repeat(MAX_PAYLOAD_BYTES + 1),
            ..valid_request()
        };
        let result = service.create(req).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_clamp_schedule_moves_past_to_future() {
        let now = Utc::now();
        let past = now - chrono::Duration::hours(1);
        let clamped = clamp_schedule(now, past);
        assert_eq!(clamped, now + chrono::Duration::minutes(1));

        let future = now + chrono::Duration::hours(1);
        assert_eq!(clamp_schedule(now, future), future);
    }

    #[tokio::test]
    async fn test_get_status_reads_store() {
        let row = create_test_notification(NotifyStatus::Waiting, 0);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[row.clone()]]);

        let service = service_with(db);
        let result = service.get_status(row.id).await.unwrap();
        assert_eq!(result.id, row.id);
    }

    #[tokio::test]
    async fn test_get_status_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<notification::Model>::new()]);

        let service = service_with(db);
        let result = service.get_status(Uuid::now_v7()).await;
        assert!(matches!(result, Err(AppError::NotificationNotFound(_))));
    }

    #[tokio::test]
    async fn test_cancel_already_sent() {
        let row = create_test_notification(NotifyStatus::Sent, 0);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[row.clone()]]);

        let service = service_with(db);
        let result = service.cancel(row.id).await;
        assert!(matches!(result, Err(AppError::NotificationAlreadySent(_))));
    }

    #[tokio::test]
    async fn test_cancel_already_cancelled() {
        let row = create_test_notification(NotifyStatus::Cancelled, 0);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[row.clone()]]);

        let service = service_with(db);
        let result = service.cancel(row.id).await;
        assert!(matches!(result, Err(AppError::NotificationAlreadyCancelled(_))));
    }

    #[tokio::test]
    async fn test_cancel_waiting_notification() {
        let row = create_test_notification(NotifyStatus::Waiting, 0);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[row.clone()]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }]);

        let service = service_with(db);
        assert!(service.cancel(row.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_cancel_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<notification::Model>::new()]);

        let service = service_with(db);
        let result = service.cancel(Uuid::now_v7()).await;
        assert!(matches!(result, Err(AppError::NotificationNotFound(_))));
    }

    #[tokio::test]
    async fn test_process_due_empty_batch() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<notification::Model>::new()]);

        let service = service_with(db);
        let stats = service.process_due(50).await.unwrap();
        assert_eq!(stats.processed, 0);
        assert_eq!(stats.failed, 0);
    }

    #[tokio::test]
    async fn test_process_due_publishes_batch() {
        let batch = vec![
            create_test_notification(NotifyStatus::Waiting, 0),
            create_test_notification(NotifyStatus::Waiting, 0),
        ];
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([batch.clone()])
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
            ]);

        let service = service_with(db);
        let stats = service.process_due(50).await.unwrap();
        assert_eq!(stats.processed, 2);
        assert_eq!(stats.failed, 0);
    }

    /// Queue stub whose publishes always fail.
    struct FailingQueue;

    #[async_trait]
    impl NotifyQueue for FailingQueue {
        async fn publish(&self, _n: &notification::Model) -> AppResult<()> {
            Err(AppError::Queue("broker unavailable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_process_due_isolates_publish_failures() {
        let batch = vec![create_test_notification(NotifyStatus::Waiting, 0)];
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([batch])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }]);

        let service =
            NotifyService::new(Arc::new(db.into_connection()), Arc::new(FailingQueue));
        let stats = service.process_due(50).await.unwrap();
        assert_eq!(stats.processed, 0);
        assert_eq!(stats.failed, 1);
    }

    #[tokio::test]
    async fn test_deliver_skips_terminal_rows() {
        let row = create_test_notification(NotifyStatus::Sent, 0);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[row.clone()]]);

        let service = service_with(db);
        // no sender configured: would fail if delivery were attempted
        assert!(service.deliver(row).await.is_ok());
    }

    #[tokio::test]
    async fn test_deliver_drops_missing_rows() {
        let row = create_test_notification(NotifyStatus::InProcess, 0);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<notification::Model>::new()]);

        let service = service_with(db);
        assert!(service.deliver(row).await.is_ok());
    }

    #[tokio::test]
    async fn test_deliver_without_sender_records_failure_and_reschedules() {
        let row = create_test_notification(NotifyStatus::InProcess, 0);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            // idempotency gate read, then the authoritative re-read in the txn
            .append_query_results([vec![row.clone()], vec![row.clone()]])
            .append_exec_results([
                // mark failed
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
                // reschedule back to waiting
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
            ]);

        let service = service_with(db);
        assert!(service.deliver(row).await.is_ok());
    }

    #[tokio::test]
    async fn test_deliver_exhausted_retries_stay_failed() {
        let row = create_test_notification(NotifyStatus::InProcess, 3);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![row.clone()], vec![row.clone()]])
            // only the failed transition, no reschedule
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }]);

        let service = service_with(db);
        assert!(service.deliver(row).await.is_ok());
    }
}
