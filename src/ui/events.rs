//! Application event handling.
//!
//! View events rebuild the card list; the rest report background task
//! results in the status bar.

use crate::api::HealthStatus;
use crate::app::{App, AppEvent};
use crate::feed::FeedStatus;

/// Handle an event from the controller or a background task.
pub(super) fn handle_app_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::HealthChecked(status) => {
            app.health = Some(status);
            app.set_status(match status {
                HealthStatus::Ok => "Category service: ok",
                HealthStatus::Degraded => "Category service: degraded",
                HealthStatus::Down => "Category service: unreachable",
            });
        }
        AppEvent::ProfileLoaded { id, result } => {
            let accepted = match app.detail.as_mut() {
                Some(detail) => detail.accept(id, result),
                None => false,
            };
            if !accepted {
                tracing::debug!(id = %id, "Dropping profile for a closed overlay");
            }
        }
        AppEvent::TaskPanicked { task, error } => {
            tracing::error!(task, error = %error, "Background task panicked");
            app.set_status(format!("Internal error in {}: {}", task, error));
        }
        AppEvent::StatusChanged(FeedStatus::Failed(ref message)) => {
            app.set_status(format!("Load failed: {} (scroll to retry)", message));
            app.pane.apply(event);
        }
        AppEvent::ItemsAppended(_) | AppEvent::ScrollRestored(_) => {
            app.pane.apply(event);
            app.pane.clamp_selection();
        }
        event => {
            app.pane.apply(event);
        }
    }
}
