//! HTTP API for the delayed notifier.

pub mod endpoints;
pub mod middleware;

pub use middleware::AppState;

use axum::routing::{get, post};
use axum::Router;

/// Build the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/notify", post(endpoints::notify::create_notification))
        .route(
            "/notify/{id}",
            get(endpoints::notify::get_status).delete(endpoints::notify::cancel_notification),
        )
        .route("/health", get(endpoints::notify::health))
}
