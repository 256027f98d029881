use crate::app::App;
use crate::feed::{AdvisoryMode, Category, FeedStatus, ResolvedItem};
use crate::util::{display_width, truncate_to_width};
use chrono::{DateTime, Utc};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
    Frame,
};

pub(super) const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Format timestamp as relative time
pub fn format_relative_time(timestamp: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(ts) = timestamp else {
        return String::new();
    };

    let diff = (now - ts).num_seconds();

    // Clock skew between us and the API
    if diff < 0 {
        return "now".to_string();
    }
    if diff < 3600 {
        return format!("{}m", diff / 60);
    }
    if diff < 86400 {
        return format!("{}h", diff / 3600);
    }
    if diff < 604800 {
        return format!("{}d", diff / 86400);
    }
    ts.format("%b %d").to_string()
}

/// Short badge for the category column.
fn category_badge(item: &ResolvedItem) -> (String, Style) {
    match &item.category {
        Category::Pending => ("…".to_string(), Style::default().fg(Color::DarkGray)),
        Category::Resolved { label, .. } => (label.clone(), Style::default().fg(Color::Green)),
        Category::Unknown => ("?".to_string(), Style::default().fg(Color::DarkGray)),
    }
}

fn card_line(
    item: &ResolvedItem,
    advisory: AdvisoryMode,
    width: usize,
    now: DateTime<Utc>,
) -> Line<'static> {
    let (badge, badge_style) = category_badge(item);
    let badge = format!("[{}] ", badge);
    let time_str = format_relative_time(item.added_at, now);
    let meta = format!(" {} ♥{}", item.author.name, item.stats.likes);

    let masked = advisory.is_masked(item.has_advisory);
    let name: &str = if masked { "(hidden)" } else { &item.name };

    let fixed = display_width(&badge) + display_width(&meta) + display_width(&time_str) + 2;
    let name = truncate_to_width(name, width.saturating_sub(fixed)).into_owned();
    let used = fixed - 2 + display_width(&name);

    let mut name_style = Style::default().add_modifier(Modifier::BOLD);
    if masked {
        name_style = Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC);
    }

    let mut spans = vec![
        Span::styled(badge, badge_style),
        Span::styled(name, name_style),
        Span::styled(meta, Style::default().fg(Color::Gray)),
    ];
    if !time_str.is_empty() {
        let padding = width.saturating_sub(used);
        spans.push(Span::styled(
            format!("{:>width$}", time_str, width = padding.max(display_width(&time_str) + 1)),
            Style::default().fg(Color::DarkGray),
        ));
    }
    Line::from(spans)
}

/// Render the card list, trailing placeholders and the footer row.
pub fn render(f: &mut Frame, app: &mut App, area: Rect) {
    if area.width < 3 || area.height < 3 {
        return;
    }
    app.list_rows = area.height.saturating_sub(2) as usize;

    let width = area.width.saturating_sub(4) as usize;
    let now = Utc::now();
    let pane = &app.pane;

    let mut items: Vec<ListItem> = pane
        .visible_cards()
        .map(|item| ListItem::new(card_line(item, pane.advisory, width, now)))
        .collect();

    let placeholder_style = Style::default().fg(Color::DarkGray);
    items.extend(
        (0..pane.placeholders).map(|_| ListItem::new(Span::styled("░░░░░░░░░░░░░░░░", placeholder_style))),
    );

    let footer = match &pane.status {
        FeedStatus::Idle if items.is_empty() => Some(Span::raw("Nothing here yet")),
        FeedStatus::Idle => None,
        FeedStatus::Loading => Some(Span::styled(
            format!("{} Loading...", SPINNER[app.spinner_frame % SPINNER.len()]),
            Style::default().fg(Color::Yellow),
        )),
        FeedStatus::Exhausted => Some(Span::styled("- end -", placeholder_style)),
        FeedStatus::Failed(msg) => Some(Span::styled(
            format!("Failed: {}", msg),
            Style::default().fg(Color::Red),
        )),
    };
    if let Some(footer) = footer {
        items.push(ListItem::new(footer));
    }

    let title = format!(" {} ", pane.title);
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(title),
        )
        .highlight_style(Style::default().bg(Color::DarkGray).fg(Color::White));

    let mut state = ListState::default();
    if pane.visible_len() > 0 {
        state.select(Some(pane.selected()));
    }
    f.render_stateful_widget(list, area, &mut state);
}
