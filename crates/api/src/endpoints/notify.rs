//! Notification endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use notifier_common::AppResult;
use notifier_core::CreateNotificationRequest;
use notifier_db::entities::notification::{Model as NotificationModel, NotifyChannel};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::middleware::AppState;

/// Create notification request.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateNotifyRequest {
    /// Addressee user id.
    pub user_id: Uuid,
    /// Delivery channel.
    pub channel: NotifyChannel,
    /// Text to deliver.
    #[validate(length(min = 1))]
    pub payload: String,
    /// When to deliver (RFC 3339).
    pub scheduled_at: DateTime<Utc>,
}

/// Response for a created notification.
#[derive(Debug, Serialize)]
pub struct CreateNotifyResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub channel: NotifyChannel,
    pub status: String,
    pub scheduled_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub message: String,
}

/// Full notification status view.
#[derive(Debug, Serialize)]
pub struct NotifyStatusResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub channel: NotifyChannel,
    pub status: String,
    pub payload: String,
    pub scheduled_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<NotificationModel> for NotifyStatusResponse {
    fn from(n: NotificationModel) -> Self {
        Self {
            id: n.id,
            user_id: n.user_id,
            channel: n.channel,
            status: n.status.to_string(),
            payload: n.payload,
            scheduled_at: n.scheduled_at.to_utc(),
            sent_at: n.sent_at.map(|t| t.to_utc()),
            retry_count: n.retry_count,
            last_error: n.last_error,
            created_at: n.created_at.to_utc(),
        }
    }
}

/// Generic success response.
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

/// `POST /notify` — schedule a notification.
pub async fn create_notification(
    State(state): State<AppState>,
    Json(req): Json<CreateNotifyRequest>,
) -> AppResult<(StatusCode, Json<CreateNotifyResponse>)> {
    req.validate()?;

    let created = state
        .notify_service
        .create(CreateNotificationRequest {
            user_id: req.user_id,
            channel: req.channel,
            payload: req.payload,
            scheduled_at: req.scheduled_at,
        })
        .await?;

    let response = CreateNotifyResponse {
        id: created.id,
        user_id: created.user_id,
        channel: created.channel,
        status: created.status.to_string(),
        scheduled_at: created.scheduled_at.to_utc(),
        created_at: created.created_at.to_utc(),
        message: "Notification created successfully".to_string(),
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// `GET /notify/{id}` — read a notification's status.
pub async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<NotifyStatusResponse>> {
    let notification = state.notify_service.get_status(id).await?;
    Ok(Json(notification.into()))
}

/// `DELETE /notify/{id}` — cancel a scheduled notification.
pub async fn cancel_notification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SuccessResponse>> {
    state.notify_service.cancel(id).await?;
    Ok(Json(SuccessResponse {
        message: "Notification cancelled successfully".to_string(),
    }))
}

/// `GET /health`.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "time": Utc::now().to_rfc3339(),
    }))
}
