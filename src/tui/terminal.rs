//! Terminal setup and cleanup
//!
//! Handles raw mode and the alternate screen for the TUI.

use std::io::{self, Stdout};

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::error::{Result, SageError};

/// Terminal type alias for convenience
pub type SageTerminal = Terminal<CrosstermBackend<Stdout>>;

/// Set up the terminal for TUI mode
///
/// Enables raw mode and enters the alternate screen.
///
/// # Errors
/// Returns an error if terminal setup fails
pub fn setup_terminal() -> Result<SageTerminal> {
    enable_raw_mode().map_err(|e| SageError::Other(format!("Failed to enable raw mode: {e}")))?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)
        .map_err(|e| SageError::Other(format!("Failed to enter alternate screen: {e}")))?;

    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)
        .map_err(|e| SageError::Other(format!("Failed to create terminal: {e}")))?;

    Ok(terminal)
}

/// Restore the terminal to its original state
///
/// # Errors
/// Returns an error if terminal restoration fails
pub fn restore_terminal(mut terminal: SageTerminal) -> Result<()> {
    disable_raw_mode().map_err(|e| SageError::Other(format!("Failed to disable raw mode: {e}")))?;

    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .map_err(|e| SageError::Other(format!("Failed to leave alternate screen: {e}")))?;

    terminal
        .show_cursor()
        .map_err(|e| SageError::Other(format!("Failed to show cursor: {e}")))?;

    Ok(())
}
