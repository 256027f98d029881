//! Input handling for the TUI.

use crate::app::{App, AppEvent};
use crate::feed::FeedMode;
use crossterm::event::{KeyCode, KeyModifiers};
use tokio::sync::mpsc;

use super::helpers::{
    download_first_file, load_more, open_detail, open_detail_page, open_selected, refresh,
    spawn_health_check, start_if_needed, switch_mode,
};
use super::Action;

/// Rows from the end of the list at which the next batch is requested.
pub(super) const NEAR_BOTTOM_ROWS: usize = 5;

/// Main input dispatch function.
pub(super) fn handle_input(
    app: &mut App,
    code: KeyCode,
    modifiers: KeyModifiers,
    event_tx: &mpsc::UnboundedSender<AppEvent>,
) -> Action {
    if modifiers.contains(KeyModifiers::CONTROL) && code == KeyCode::Char('c') {
        return Action::Quit;
    }

    // Help overlay captures all keys while visible
    if app.show_help {
        if matches!(code, KeyCode::Char('?') | KeyCode::Esc | KeyCode::Char('q')) {
            app.show_help = false;
        }
        return Action::Continue;
    }

    if app.detail.is_some() {
        handle_detail_input(app, code);
        return Action::Continue;
    }

    match code {
        KeyCode::Char('q') => return Action::Quit,
        KeyCode::Char('?') => app.show_help = true,
        KeyCode::Char(c @ '1'..='4') => {
            let index = (c as usize) - ('1' as usize);
            switch_mode(app, FeedMode::ALL[index], event_tx);
        }
        KeyCode::Tab => {
            let next = FeedMode::ALL[(app.mode().index() + 1) % FeedMode::ALL.len()];
            switch_mode(app, next, event_tx);
        }
        KeyCode::Char('r') => refresh(app, event_tx),
        KeyCode::Char('j') | KeyCode::Down => move_and_maybe_load(app, 1, event_tx),
        KeyCode::Char('k') | KeyCode::Up => app.pane.move_selection(-1),
        KeyCode::PageDown => {
            let page = app.list_rows.max(1) as isize;
            move_and_maybe_load(app, page, event_tx);
        }
        KeyCode::PageUp => {
            let page = app.list_rows.max(1) as isize;
            app.pane.move_selection(-page);
        }
        KeyCode::Char('g') | KeyCode::Home => app.pane.select_first(),
        KeyCode::Char('G') | KeyCode::End => {
            app.pane.select_last();
            load_more(app, event_tx);
        }
        KeyCode::Char('f') => {
            let mut filters = app.controller.filters();
            filters.content = filters.content.next();
            let content = filters.content;
            let outcome = app.controller.set_filters(filters);
            start_if_needed(app, outcome, event_tx);
            app.set_status(format!("Content filter: {}", content));
        }
        KeyCode::Char('a') => {
            let mode = app.pane.cycle_advisory();
            app.set_status(format!("Advisory items: {}", mode));
        }
        KeyCode::Enter => open_detail(app, event_tx),
        KeyCode::Char('o') => open_selected(app),
        KeyCode::Char('h') => {
            app.set_status("Checking category service...");
            spawn_health_check(app, event_tx);
        }
        _ => {}
    }
    Action::Continue
}

/// Keys while the detail overlay is open.
fn handle_detail_input(app: &mut App, code: KeyCode) {
    let page = app.list_rows.max(1) as isize;
    match code {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Backspace => app.detail = None,
        KeyCode::Char('o') => open_detail_page(app),
        KeyCode::Char('d') => download_first_file(app),
        code => {
            let Some(detail) = app.detail.as_mut() else {
                return;
            };
            match code {
                KeyCode::Char('j') | KeyCode::Down => detail.scroll_by(1),
                KeyCode::Char('k') | KeyCode::Up => detail.scroll_by(-1),
                KeyCode::PageDown | KeyCode::Char(' ') => detail.scroll_by(page),
                KeyCode::PageUp => detail.scroll_by(-page),
                KeyCode::Char('g') | KeyCode::Home => detail.scroll = 0,
                KeyCode::Char('G') | KeyCode::End => detail.scroll = detail.max_scroll,
                _ => {}
            }
        }
    }
}

fn move_and_maybe_load(app: &mut App, delta: isize, event_tx: &mpsc::UnboundedSender<AppEvent>) {
    app.pane.move_selection(delta);
    if app.pane.near_bottom(NEAR_BOTTOM_ROWS) {
        load_more(app, event_tx);
    }
}
