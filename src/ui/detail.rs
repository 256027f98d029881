//! Item detail overlay: files, requirements, submitter and gallery from
//! the profile page.

use crate::api::{format_size, ItemProfile};
use crate::app::{App, DetailState};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use super::cards::SPINNER;
use super::help::centered_rect;

const MAX_SCROLL: usize = u16::MAX as usize;

/// Render the detail overlay on top of the card list.
pub fn render(f: &mut Frame, app: &mut App) {
    let spinner = SPINNER[app.spinner_frame % SPINNER.len()];
    let Some(detail) = app.detail.as_mut() else {
        return;
    };
    let overlay = centered_rect(90, 90, f.area());
    if overlay.width < 20 || overlay.height < 6 {
        return;
    }

    let name = detail.profile().map_or(detail.title.as_str(), |p| p.name.as_str());
    let title = format!(" {} (Esc close, o page, d download) ", name);
    let lines = match &detail.state {
        DetailState::Loading => vec![Line::from(format!("{} Loading details...", spinner))],
        DetailState::Failed(error) => vec![Line::from(Span::styled(
            format!("Failed to load details: {}", error),
            Style::default().fg(Color::Red),
        ))],
        DetailState::Loaded(profile) => profile_lines(profile),
    };

    let inner_width = overlay.width.saturating_sub(2).max(1) as usize;
    let inner_height = overlay.height.saturating_sub(2) as usize;
    detail.max_scroll = wrapped_height(&lines, inner_width)
        .saturating_sub(inner_height)
        .min(MAX_SCROLL);
    detail.clamp_scroll();

    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(title),
        )
        .wrap(Wrap { trim: false })
        .scroll((detail.scroll as u16, 0));

    f.render_widget(Clear, overlay);
    f.render_widget(paragraph, overlay);
}

/// Rows `lines` take once wrapped to `width` columns.
fn wrapped_height(lines: &[Line<'_>], width: usize) -> usize {
    lines
        .iter()
        .map(|line| line.width().div_ceil(width).max(1))
        .sum()
}

fn heading(text: &'static str) -> Line<'static> {
    Line::from(Span::styled(
        text,
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    ))
}

fn dim(text: String) -> Span<'static> {
    Span::styled(text, Style::default().fg(Color::DarkGray))
}

pub(super) fn profile_lines(profile: &ItemProfile) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    let mut meta = vec![profile.kind.name().to_string()];
    if let Some(added) = profile.added_at {
        meta.push(format!("added {}", added.format("%Y-%m-%d")));
    }
    meta.push(format!(
        "{} views, {} likes, {} downloads",
        profile.views, profile.likes, profile.downloads
    ));
    lines.push(Line::from(dim(meta.join(" · "))));

    if let Some(submitter) = &profile.submitter {
        let mut spans = vec![Span::raw("By "), Span::raw(submitter.name.clone())];
        if let Some(title) = &submitter.title {
            spans.push(dim(format!(" ({})", title)));
        }
        if submitter.online {
            spans.push(Span::styled(" ●", Style::default().fg(Color::Green)));
        }
        if !submitter.medals.is_empty() {
            spans.push(dim(format!(" {} medals", submitter.medals.len())));
        }
        lines.push(Line::from(spans));
    }
    if let Some(game) = &profile.game {
        lines.push(Line::from(dim(format!("Game: {}", game))));
    }

    if !profile.files.is_empty() {
        lines.push(Line::from(""));
        lines.push(heading("Files"));
        for file in &profile.files {
            let mut info = vec![format_size(file.size), format!("{} downloads", file.downloads)];
            if let Some(added) = file.added_at {
                info.push(added.format("%Y-%m-%d").to_string());
            }
            lines.push(Line::from(vec![
                Span::styled(
                    format!("  {}", file.name),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                dim(format!("  {}", info.join(" · "))),
            ]));
            if let Some(md5) = &file.md5 {
                lines.push(Line::from(dim(format!("    MD5 {}", md5))));
            }
            lines.push(Line::from(Span::styled(
                format!("    {}", file.download_url()),
                Style::default().fg(Color::Blue),
            )));
            if let Some(description) = &file.description {
                lines.push(Line::from(format!("    {}", description)));
            }
        }
    }

    if !profile.requirements.is_empty() {
        lines.push(Line::from(""));
        lines.push(heading("Requirements"));
        for requirement in &profile.requirements {
            let mut spans = vec![Span::raw(format!("  - {}", requirement.name))];
            if let Some(url) = &requirement.url {
                spans.push(dim(format!("  {}", url)));
            }
            lines.push(Line::from(spans));
        }
    }

    if !profile.gallery.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::styled(
                "Gallery",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ),
            dim(format!(" ({} images)", profile.gallery.len())),
        ]));
        for url in &profile.gallery {
            lines.push(Line::from(dim(format!("  {}", url))));
        }
    }

    if let Some(license) = &profile.license {
        lines.push(Line::from(""));
        lines.push(heading("License"));
        lines.extend(license.lines().map(|l| Line::from(l.to_string())));
    }

    if !profile.description.is_empty() {
        lines.push(Line::from(""));
        lines.push(heading("Description"));
        lines.extend(profile.description.lines().map(|l| Line::from(l.to_string())));
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ProfileFile, Requirement};
    use crate::feed::{ItemId, ItemKind};
    use pretty_assertions::assert_eq;

    fn text(lines: &[Line<'_>]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    fn profile() -> ItemProfile {
        ItemProfile {
            id: ItemId(9),
            kind: ItemKind::Mod,
            name: "Skin".into(),
            added_at: None,
            views: 10,
            likes: 2,
            downloads: 5,
            description: "Line one\nLine two".into(),
            license: None,
            page_url: None,
            download_url: None,
            gallery: Vec::new(),
            requirements: vec![Requirement {
                name: "Loader".into(),
                url: None,
            }],
            files: vec![ProfileFile {
                id: 77,
                name: "skin.zip".into(),
                description: None,
                size: 1536,
                downloads: 4,
                md5: Some("abc".into()),
                added_at: None,
            }],
            submitter: None,
            game: None,
        }
    }

    #[test]
    fn test_profile_lines_sections() {
        let lines = text(&profile_lines(&profile()));
        assert_eq!(
            lines,
            vec![
                "Mod · 10 views, 2 likes, 5 downloads",
                "",
                "Files",
                "  skin.zip  1.5 KB · 4 downloads",
                "    MD5 abc",
                "    https://gamebanana.com/dl/77",
                "",
                "Requirements",
                "  - Loader",
                "",
                "Description",
                "Line one",
                "Line two",
            ]
        );
    }

    #[test]
    fn test_wrapped_height_counts_wrapped_rows() {
        let lines = vec![Line::from("abcdefghij"), Line::from(""), Line::from("abc")];
        assert_eq!(wrapped_height(&lines, 4), 3 + 1 + 1);
        assert_eq!(wrapped_height(&[Line::from("角色角色")], 4), 2);
    }
}
