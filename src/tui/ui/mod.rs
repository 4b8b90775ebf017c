//! UI rendering components

mod input;
mod layout;
mod message;
mod status;

use ratatui::Frame;

use crate::tui::app::App;

/// Main draw function, renders the entire UI
pub fn draw(f: &mut Frame, app: &App) {
    layout::draw(f, app);
}
