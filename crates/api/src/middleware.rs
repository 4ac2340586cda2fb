//! API state.

use notifier_core::NotifyService;

/// Application state shared across endpoints.
#[derive(Clone)]
pub struct AppState {
    /// Notification service façade.
    pub notify_service: NotifyService,
}
