use crate::api::HealthStatus;
use crate::app::App;
use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use std::borrow::Cow;

const KEY_HINTS: &str = "[1-4]mode [r]efresh [f]ilter [a]dvisory [Enter]details [o]pen [h]ealth [?]help [q]uit";

/// Render the status bar
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    if area.width < 1 || area.height < 1 {
        return;
    }

    let text: Cow<'_, str> = match &app.status_message {
        Some((msg, _)) => Cow::Borrowed(&**msg),
        None => Cow::Borrowed(KEY_HINTS),
    };

    let pending = app.controller.poller().pending_count();
    let mut spans = vec![Span::raw(text)];
    if pending > 0 {
        spans.push(Span::styled(
            format!("  resolving {}", pending),
            Style::default().fg(Color::Yellow),
        ));
    }
    if let Some(health) = app.health {
        let (label, color) = match health {
            HealthStatus::Ok => ("●", Color::Green),
            HealthStatus::Degraded => ("●", Color::Yellow),
            HealthStatus::Down => ("●", Color::Red),
        };
        spans.push(Span::styled(format!("  {}", label), Style::default().fg(color)));
    }

    let style = Style::default().bg(Color::DarkGray).fg(Color::White);
    f.render_widget(Paragraph::new(Line::from(spans)).style(style), area);
}
