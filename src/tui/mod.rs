//! TUI module for Sage
//!
//! Provides a terminal chat interface using ratatui + crossterm. Rendering
//! consumes immutable conversation snapshots only; all state transitions
//! happen in the turn task and arrive over the app event channel.

mod app;
mod event;
mod terminal;
mod ui;

pub use app::{App, AppEvent};
pub use terminal::{restore_terminal, setup_terminal};

use std::sync::Arc;

use crate::{conversation::Conversation, error::Result, services::ChatService};

/// Run the TUI application
pub async fn run(service: Arc<dyn ChatService>, conversation: Conversation) -> Result<()> {
    // Set up terminal
    let mut terminal = setup_terminal()?;

    // Create app state
    let mut app = App::new(service, conversation);

    // Run the main loop
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    restore_terminal(terminal)?;

    result
}

async fn run_app(terminal: &mut terminal::SageTerminal, app: &mut App) -> Result<()> {
    let mut event_stream = event::EventStream::new();

    loop {
        // Render UI
        terminal.draw(|f| ui::draw(f, app))?;

        // Wait for next event
        tokio::select! {
            // Terminal events (keyboard, resize)
            Some(event) = event_stream.next() => {
                app.handle_terminal_event(event);
            }

            // Application events (snapshots from the turn task)
            Some(event) = app.next_event() => {
                app.handle_app_event(event);
            }
        }

        // Check for quit
        if app.should_quit() {
            break;
        }
    }

    Ok(())
}
