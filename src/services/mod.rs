//! Service layer for the remote assistant backend
//!
//! Defines the wire request/response types shared by the streaming and
//! single-shot paths, and the [`ChatService`] trait the conversation driver
//! is written against so it can be exercised without a network.

pub mod backend;
pub mod streaming;

pub use backend::BackendClient;
pub use streaming::StreamEvent;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{error::Result, messages::Message};

/// Request body for both `/chat` and `/chat/stream`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub query: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Response body of the single-shot `/chat` call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: Message,
    pub session_id: String,

    /// Structured analysis attached by the backend, passed through opaquely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsed: Option<serde_json::Value>,
}

/// Response body of `/chat/history/{session_id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub messages: Vec<Message>,
    pub created_at: String,
    pub last_activity: String,
}

/// Handler invoked for each decoded stream event, in arrival order
///
/// Returning `Err` aborts the stream read; this is how a caller escalates a
/// protocol-level `error` event into a failure of the streaming path.
pub type OnEvent<'a> = &'a mut (dyn FnMut(StreamEvent) -> Result<()> + Send);

/// Backend chat operations
///
/// One implementation talks HTTP ([`BackendClient`]); tests substitute a
/// scripted mock to drive the conversation state machine deterministically.
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Single request/response exchange (the fallback path)
    async fn send_chat(&self, query: &str, session_id: Option<&str>) -> Result<ChatResponse>;

    /// Streaming exchange: decode events and hand each to `on_event`
    /// before the next chunk is read
    ///
    /// Resolves `Ok(())` when the stream ends, whether or not a terminal
    /// event was seen; the caller judges success from the events received.
    async fn stream_chat(
        &self,
        query: &str,
        session_id: Option<&str>,
        on_event: OnEvent<'_>,
        cancel: CancellationToken,
    ) -> Result<()>;

    /// Fetch the stored transcript for a session
    async fn chat_history(&self, session_id: &str) -> Result<SessionInfo>;
}
