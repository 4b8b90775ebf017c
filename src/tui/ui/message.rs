//! Message rendering

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::{messages::Role, tui::app::App};

/// Render messages area
pub fn render(f: &mut Frame, area: Rect, app: &App) {
    let mut lines = Vec::new();

    for msg in app.conversation().messages() {
        let (who, color) = match msg.role {
            Role::User => ("You", Color::Blue),
            Role::Assistant => ("Assistant", Color::Green),
        };

        lines.push(Line::from(vec![
            Span::styled(
                format!("{who} "),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("[{}]", msg.timestamp),
                Style::default().fg(Color::DarkGray),
            ),
        ]));

        let content_style = if msg.is_pending() {
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC)
        } else {
            Style::default()
        };
        for line in msg.content.lines() {
            lines.push(Line::from(Span::styled(line.to_string(), content_style)));
        }

        lines.push(Line::from("")); // Empty line for spacing
    }

    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Chat "))
        .scroll((app.scroll_offset() as u16, 0))
        .wrap(Wrap { trim: false });

    f.render_widget(paragraph, area);
}
