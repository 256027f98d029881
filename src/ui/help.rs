//! Help overlay with the key table.

use ratatui::{
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Clear, Row, Table},
    Frame,
};

const BINDINGS: [(&str, &str); 15] = [
    ("1 2 3 4", "Recommended / Latest / Updated / Subscriptions"),
    ("Tab", "Next mode"),
    ("j / k", "Move down / up"),
    ("PgDn / PgUp", "Move a page"),
    ("g / G", "First / last item"),
    ("r", "Refresh every mode"),
    ("f", "Cycle content filter"),
    ("a", "Cycle advisory display"),
    ("Enter", "Show item details"),
    ("o", "Open item page in browser"),
    ("d", "Download first file (details)"),
    ("Esc", "Close details"),
    ("h", "Check category service"),
    ("?", "Toggle this help"),
    ("q", "Quit"),
];

/// Render the help overlay on top of the current view.
pub fn render(f: &mut Frame) {
    let overlay = centered_rect(70, 70, f.area());
    if overlay.width < 20 || overlay.height < 6 {
        return;
    }
    f.render_widget(Clear, overlay);

    let rows = BINDINGS
        .iter()
        .map(|(key, action)| Row::new(vec![format!("  {}", key), action.to_string()]));
    let widths = [Constraint::Length(14), Constraint::Min(20)];

    let table = Table::new(rows, widths)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(" Help (? to close) "),
        )
        .header(
            Row::new(vec!["Key", "Action"])
                .style(
                    Style::default()
                        .add_modifier(Modifier::BOLD)
                        .add_modifier(Modifier::UNDERLINED),
                )
                .bottom_margin(1),
        );

    f.render_widget(table, overlay);
}

/// Create a centered rectangle with the given percentage of the parent area.
pub(super) fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let width = area.width * percent_x / 100;
    let height = area.height * percent_y / 100;
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_rect_stays_inside() {
        let area = Rect::new(0, 0, 100, 40);
        let r = centered_rect(70, 70, area);
        assert_eq!(r, Rect::new(15, 6, 70, 28));
    }
}
