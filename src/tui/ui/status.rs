//! Status bar rendering

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::tui::app::App;

/// Render status bar
pub fn render(f: &mut Frame, area: Rect, app: &App) {
    let mut spans = vec![];

    if app.is_sending() {
        spans.push(Span::styled(" ● streaming ", Style::default().fg(Color::Yellow)));
    } else {
        spans.push(Span::raw(" "));
    }

    if let Some(session_id) = app.conversation().session_id() {
        spans.push(Span::styled(
            format!("session {session_id} "),
            Style::default().fg(Color::DarkGray),
        ));
    }

    if let Some(notice) = app.notice() {
        spans.push(Span::styled(
            format!("{notice} "),
            Style::default().fg(Color::Red),
        ));
    }

    spans.push(Span::styled(
        "| Enter send | Esc cancel/quit | Ctrl+C quit",
        Style::default().fg(Color::DarkGray),
    ));

    let status = Paragraph::new(Line::from(spans));
    f.render_widget(status, area);
}
