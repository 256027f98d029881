//! Terminal User Interface module.
//!
//! # Module Structure
//!
//! - `loop_runner` - Main event loop and terminal management
//! - `input` - Keyboard input handling
//! - `events` - Controller and background task event processing
//! - `render` - Layout and tabs
//! - `helpers` - Task spawning shared by input and the tick
//! - `cards` - Card list widget
//! - `status` - Status bar widget
//! - `detail` - Item detail overlay
//! - `help` - Key table overlay

mod cards;
mod detail;
mod events;
mod help;
mod helpers;
mod input;
mod loop_runner;
mod render;
mod status;

pub use loop_runner::{run, Action};

use crate::app::{App, AppEvent};
use crate::feed::FeedMode;
use tokio::sync::mpsc;

/// Shows `mode` and starts its first batch. Used once at startup, before
/// [`run`] takes over.
pub fn open_mode(app: &mut App, mode: FeedMode, event_tx: &mpsc::UnboundedSender<AppEvent>) {
    helpers::switch_mode(app, mode, event_tx);
}
