//! Message types for conversations with the assistant backend
//!
//! Mirrors the backend wire shape: every message carries an opaque id, a
//! role, plain-text content, and a display timestamp assigned at creation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Content shown in the assistant placeholder until the first delta arrives
pub const PENDING_CONTENT: &str = "Thinking…";

/// Message role in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: String,
}

impl Message {
    /// Create a new user message
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            role: Role::User,
            content: text.into(),
            timestamp: now_stamp(),
        }
    }

    /// Create a new assistant message
    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            role: Role::Assistant,
            content: text.into(),
            timestamp: now_stamp(),
        }
    }

    /// Create the assistant placeholder appended when a request begins
    #[must_use]
    pub fn pending() -> Self {
        Self::assistant(PENDING_CONTENT)
    }

    /// Check whether this message still shows the pending marker
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.role == Role::Assistant && self.content == PENDING_CONTENT
    }
}

fn new_id() -> String {
    format!("msg-{}", Uuid::new_v4())
}

/// Display timestamp for newly created messages
fn now_stamp() -> String {
    chrono::Local::now().format("%H:%M").to_string()
}
