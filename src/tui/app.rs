//! Application state for the TUI
//!
//! [`App`] holds the latest conversation snapshot and the input buffer. A
//! submitted query runs in a spawned turn task; each new snapshot arrives
//! through the app event channel and replaces the rendered one wholesale.

use std::sync::Arc;

use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    conversation::{run_turn, Conversation},
    error::Result,
    services::ChatService,
};

/// Application events
#[derive(Debug)]
pub enum AppEvent {
    /// A new conversation snapshot from the in-flight turn
    Snapshot(Conversation),

    /// The turn reached its terminal state (or was rejected on submit)
    TurnFinished(Result<Conversation>),
}

/// Handle to the in-flight turn task
struct ActiveTurn {
    cancel: CancellationToken,
    _handle: tokio::task::JoinHandle<()>,
}

/// Main application state
pub struct App {
    /// Latest conversation snapshot
    conversation: Conversation,

    /// Current input buffer
    input_buffer: String,

    /// Scroll offset for the message view
    scroll_offset: usize,

    /// Should quit flag
    should_quit: bool,

    /// Transient notice shown in the status bar
    notice: Option<String>,

    /// Backend service
    service: Arc<dyn ChatService>,

    /// Event channel for app events
    event_tx: mpsc::UnboundedSender<AppEvent>,
    event_rx: mpsc::UnboundedReceiver<AppEvent>,

    /// In-flight turn, if any
    turn: Option<ActiveTurn>,
}

impl App {
    /// Create a new app
    pub fn new(service: Arc<dyn ChatService>, conversation: Conversation) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Self {
            conversation,
            input_buffer: String::new(),
            scroll_offset: 0,
            should_quit: false,
            notice: None,
            service,
            event_tx,
            event_rx,
            turn: None,
        }
    }

    /// Get the next application event
    pub async fn next_event(&mut self) -> Option<AppEvent> {
        self.event_rx.recv().await
    }

    /// Check if should quit
    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Latest conversation snapshot
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Get input buffer
    pub fn input_buffer(&self) -> &str {
        &self.input_buffer
    }

    /// Get scroll offset
    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    /// Whether a turn is in flight
    pub fn is_sending(&self) -> bool {
        self.turn.is_some() || self.conversation.is_sending()
    }

    /// Transient status notice, if any
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Handle terminal event
    pub fn handle_terminal_event(&mut self, event: Event) {
        if let Event::Key(key_event) = event {
            self.handle_key_event(key_event);
        }
    }

    /// Handle key event
    fn handle_key_event(&mut self, key: KeyEvent) {
        // Handle Ctrl+C to quit
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        match key.code {
            KeyCode::Char(c) => {
                self.input_buffer.push(c);
            }
            KeyCode::Backspace => {
                self.input_buffer.pop();
            }
            KeyCode::Enter => {
                self.submit();
            }
            KeyCode::Up => {
                self.scroll_offset = self.scroll_offset.saturating_sub(1);
            }
            KeyCode::Down => {
                self.scroll_offset += 1;
            }
            KeyCode::Esc => {
                if let Some(turn) = &self.turn {
                    turn.cancel.cancel();
                } else {
                    self.should_quit = true;
                }
            }
            _ => {}
        }
    }

    /// Submit the current input as a query
    ///
    /// A submission while a turn is in flight is rejected; the input buffer
    /// is kept so nothing is lost.
    fn submit(&mut self) {
        if self.input_buffer.trim().is_empty() {
            return;
        }
        if self.is_sending() {
            self.notice = Some("Still waiting for the previous reply".to_string());
            return;
        }

        let text = std::mem::take(&mut self.input_buffer);
        self.notice = None;

        let cancel = CancellationToken::new();
        let service = Arc::clone(&self.service);
        let conversation = self.conversation.clone();
        let event_tx = self.event_tx.clone();
        let turn_cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            let tx = event_tx.clone();
            let result = run_turn(
                service.as_ref(),
                &conversation,
                &text,
                turn_cancel,
                move |snapshot| {
                    let _ = tx.send(AppEvent::Snapshot(snapshot.clone()));
                },
            )
            .await;

            let _ = event_tx.send(AppEvent::TurnFinished(result));
        });

        self.turn = Some(ActiveTurn {
            cancel,
            _handle: handle,
        });
    }

    /// Handle application event
    pub fn handle_app_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Snapshot(snapshot) => {
                self.conversation = snapshot;
            }
            AppEvent::TurnFinished(Ok(snapshot)) => {
                self.conversation = snapshot;
                self.turn = None;
            }
            AppEvent::TurnFinished(Err(err)) => {
                self.turn = None;
                self.notice = Some(err.to_string());
            }
        }
    }
}
