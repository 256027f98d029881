//! Helper functions for UI operations.
//!
//! Background task spawning shared by input handling and the tick, plus
//! URL opening.

use crate::app::{App, AppEvent, DetailView};
use crate::feed::{FeedController, FeedMode, LoadToken, ModeSwitch};
use crate::util::validate_open_url;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Error message for items without a page URL
pub(super) const ERR_ITEM_NO_URL: &str = "Item has no page URL";
/// Error message when the detail overlay has no files to download
pub(super) const ERR_NO_FILES: &str = "No downloadable files";

/// Wraps a future to catch panics and convert them to errors.
///
/// Instead of a spawned task silently disappearing (caught by Tokio's
/// runtime but not handled), the panic is converted to `Err(String)`
/// containing the panic message.
///
/// # Returns
///
/// - `Ok(result)` if the future completes normally
/// - `Err(panic_message)` if the future panics
pub(super) async fn catch_task_panic<F, T>(future: F) -> Result<T, String>
where
    F: std::future::Future<Output = T>,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|panic| {
            if let Some(s) = panic.downcast_ref::<&'static str>() {
                s.to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else {
                format!("Unknown panic: {:?}", (*panic).type_id())
            }
        })
}

/// Spawns a page batch for `token`.
///
/// Stale batches exit on their own once a newer switch has advanced the
/// epoch, so the previous handle is simply replaced.
pub(super) fn spawn_load(
    controller: &FeedController,
    token: LoadToken,
    is_initial: bool,
    event_tx: &mpsc::UnboundedSender<AppEvent>,
) -> JoinHandle<()> {
    let controller = controller.clone();
    let tx = event_tx.clone();
    tokio::spawn(async move {
        match catch_task_panic(controller.load_pages(is_initial, token)).await {
            Ok(outcome) => {
                tracing::debug!(mode = %token.mode(), epoch = token.epoch(), ?outcome, "Batch finished");
            }
            Err(error) => {
                tracing::error!(error = %error, "Feed load task panicked");
                let _ = tx.send(AppEvent::TaskPanicked {
                    task: "feed_load",
                    error,
                });
            }
        }
    })
}

/// Probes the metadata service in the background.
pub(super) fn spawn_health_check(app: &App, event_tx: &mpsc::UnboundedSender<AppEvent>) {
    let api = app.api.clone();
    let tx = event_tx.clone();
    tokio::spawn(async move {
        match catch_task_panic(api.health_check()).await {
            Ok(status) => {
                let _ = tx.send(AppEvent::HealthChecked(status));
            }
            Err(error) => {
                tracing::error!(error = %error, "Health check task panicked");
                let _ = tx.send(AppEvent::TaskPanicked {
                    task: "health_check",
                    error,
                });
            }
        }
    });
}

/// Switches to `mode` and starts its initial batch if the track is empty.
pub(super) fn switch_mode(app: &mut App, mode: FeedMode, event_tx: &mpsc::UnboundedSender<AppEvent>) {
    let outcome = app.controller.set_mode(mode, mode.title());
    start_if_needed(app, outcome, event_tx);
}

/// Drops every track and reloads the active one.
pub(super) fn refresh(app: &mut App, event_tx: &mpsc::UnboundedSender<AppEvent>) {
    let outcome = app.controller.refresh();
    start_if_needed(app, outcome, event_tx);
    app.set_status("Refreshing...");
}

pub(super) fn start_if_needed(
    app: &mut App,
    outcome: ModeSwitch,
    event_tx: &mpsc::UnboundedSender<AppEvent>,
) {
    match outcome {
        ModeSwitch::Load(token) => {
            app.load_task = Some(spawn_load(&app.controller, token, true, event_tx));
        }
        // Whatever was running belongs to an older epoch; let it drain detached.
        ModeSwitch::Restored => app.load_task = None,
        ModeSwitch::AlreadyActive => {}
    }
}

/// Requests the next batch when the list end is in view.
///
/// Does nothing while a batch task is still running or the track is done.
pub(super) fn load_more(app: &mut App, event_tx: &mpsc::UnboundedSender<AppEvent>) {
    if app.load_running() {
        return;
    }
    if let Some(token) = app.controller.on_near_bottom() {
        app.load_task = Some(spawn_load(&app.controller, token, false, event_tx));
    }
}

/// Opens the detail overlay for the selected card and fetches its profile.
pub(super) fn open_detail(app: &mut App, event_tx: &mpsc::UnboundedSender<AppEvent>) {
    let Some(card) = app.pane.selected_card() else {
        return;
    };
    let detail = DetailView::loading(card);
    let (id, kind) = (card.id, card.kind.clone());
    app.detail = Some(detail);

    let api = app.api.clone();
    let overlay = app.controller.overlay().clone();
    let tx = event_tx.clone();
    tokio::spawn(async move {
        let fetch = async {
            api.fetch_profile(kind, id).await.map(|mut profile| {
                profile.name = overlay.translate(&profile.name).into_owned();
                Box::new(profile)
            })
        };
        match catch_task_panic(fetch).await {
            Ok(result) => {
                if let Err(e) = &result {
                    tracing::warn!(id = %id, error = %e, "Profile fetch failed");
                }
                let _ = tx.send(AppEvent::ProfileLoaded {
                    id,
                    result: result.map_err(|e| e.to_string()),
                });
            }
            Err(error) => {
                tracing::error!(error = %error, "Profile task panicked");
                let _ = tx.send(AppEvent::TaskPanicked {
                    task: "profile_fetch",
                    error,
                });
            }
        }
    });
}

/// Opens the selected item's page in the system browser.
pub(super) fn open_selected(app: &mut App) {
    let url = app.pane.selected_card().and_then(|c| c.page_url.clone());
    open_url(app, url, ERR_ITEM_NO_URL);
}

/// Opens the detail overlay's item page in the system browser.
pub(super) fn open_detail_page(app: &mut App) {
    let url = app.detail.as_ref().and_then(|d| d.page_url.clone());
    open_url(app, url, ERR_ITEM_NO_URL);
}

/// Opens the first file's direct download link from the detail overlay.
pub(super) fn download_first_file(app: &mut App) {
    let url = app
        .detail
        .as_ref()
        .and_then(|d| d.profile())
        .and_then(|p| p.files.first())
        .map(|f| f.download_url());
    open_url(app, url, ERR_NO_FILES);
}

fn open_url(app: &mut App, url: Option<String>, missing: &'static str) {
    let Some(url) = url else {
        app.set_status(missing);
        return;
    };
    // Validate before open::that() so only public http(s) pages reach the shell
    match validate_open_url(&url) {
        Err(e) => app.set_status(e.to_string()),
        Ok(valid) => {
            if let Err(e) = open::that(valid.as_str()) {
                app.set_status(format!("Failed to open browser: {}", e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_catch_task_panic_ok() {
        assert_eq!(catch_task_panic(async { 42 }).await, Ok(42));
    }

    #[tokio::test]
    async fn test_catch_task_panic_message() {
        let result = catch_task_panic(async {
            if true {
                panic!("lookup exploded");
            }
        })
        .await;
        assert_eq!(result, Err("lookup exploded".to_string()));
    }

    #[tokio::test]
    async fn test_catch_task_panic_formatted_message() {
        let id = 7;
        let result: Result<(), String> = catch_task_panic(async move {
            panic!("item {} exploded", id);
        })
        .await;
        assert_eq!(result, Err("item 7 exploded".to_string()));
    }
}
