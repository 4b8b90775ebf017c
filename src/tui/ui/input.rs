//! Input field rendering

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::tui::app::App;

/// Render input field
pub fn render(f: &mut Frame, area: Rect, app: &App) {
    let border_color = if app.is_sending() {
        Color::DarkGray
    } else {
        Color::Green
    };

    let input = Paragraph::new(app.input_buffer()).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Ask ")
            .border_style(Style::default().fg(border_color)),
    );

    f.render_widget(input, area);

    // Set cursor position (inside the border)
    if !app.is_sending() {
        let cursor_x = area.x + app.input_buffer().len() as u16 + 1;
        let cursor_y = area.y + 1;

        if cursor_x < area.x + area.width - 1 && cursor_y < area.y + area.height {
            f.set_cursor_position((cursor_x, cursor_y));
        }
    }
}
