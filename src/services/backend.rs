//! HTTP client for the assistant backend
//!
//! Implements [`ChatService`] over reqwest: the streaming `/chat/stream`
//! endpoint, the single-shot `/chat` fallback, and the read-only session
//! history endpoint.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    error::{Result, SageError},
    services::{
        streaming::{parse_frame, FrameDecoder},
        ChatRequest, ChatResponse, ChatService, OnEvent, SessionInfo,
    },
};

/// Client for one backend base URL
pub struct BackendClient {
    client: Client,
    base_url: String,
}

impl BackendClient {
    /// Create a new client
    ///
    /// `base_url` is the API root (e.g. `http://127.0.0.1:8000/api/v1`);
    /// a trailing slash is tolerated. The timeout applies to the whole
    /// single-shot call and to connection setup of the streaming call.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().connect_timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Convert a non-success response into a transport error carrying the
    /// server-supplied detail when present
    async fn error_for_status(response: Response) -> SageError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        SageError::transport(status.as_u16(), extract_detail(status, &body))
    }
}

/// Pull `{detail}` or `{message}` out of an error body, else derive from status
fn extract_detail(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["detail", "message"] {
            if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
                return text.to_string();
            }
        }
    }
    format!("HTTP {}", status.as_u16())
}

#[async_trait]
impl ChatService for BackendClient {
    async fn send_chat(&self, query: &str, session_id: Option<&str>) -> Result<ChatResponse> {
        let request = ChatRequest {
            query: query.to_string(),
            session_id: session_id.map(str::to_string),
        };

        let response = self
            .client
            .post(self.url("chat"))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for_status(response).await);
        }

        Ok(response.json().await?)
    }

    async fn stream_chat(
        &self,
        query: &str,
        session_id: Option<&str>,
        on_event: OnEvent<'_>,
        cancel: CancellationToken,
    ) -> Result<()> {
        let request = ChatRequest {
            query: query.to_string(),
            session_id: session_id.map(str::to_string),
        };

        let response = self
            .client
            .post(self.url("chat/stream"))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for_status(response).await);
        }

        let mut decoder = FrameDecoder::new();
        let mut byte_stream = Box::pin(response.bytes_stream());

        loop {
            // Each event is handled before the next chunk is awaited, so
            // the client never reads ahead of event processing.
            let chunk = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(SageError::Cancelled),
                chunk = byte_stream.next() => chunk,
            };

            let Some(chunk) = chunk else {
                break;
            };

            for frame in decoder.push(&chunk?)? {
                if let Some(event) = parse_frame(&frame) {
                    on_event(event)?;
                }
            }
        }

        decoder.finish();
        debug!("Chat stream ended");
        Ok(())
    }

    async fn chat_history(&self, session_id: &str) -> Result<SessionInfo> {
        let response = self
            .client
            .get(self.url(&format!("chat/history/{session_id}")))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for_status(response).await);
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_detail_prefers_detail_field() {
        let detail = extract_detail(
            StatusCode::NOT_FOUND,
            r#"{"detail":"Session s-1 not found"}"#,
        );
        assert_eq!(detail, "Session s-1 not found");
    }

    #[test]
    fn test_extract_detail_falls_back_to_message_field() {
        let detail = extract_detail(StatusCode::BAD_GATEWAY, r#"{"message":"upstream down"}"#);
        assert_eq!(detail, "upstream down");
    }

    #[test]
    fn test_extract_detail_non_json_body() {
        let detail = extract_detail(StatusCode::INTERNAL_SERVER_ERROR, "<html>oops</html>");
        assert_eq!(detail, "HTTP 500");
    }

    #[test]
    fn test_base_url_trailing_slash_tolerated() {
        let client = BackendClient::new("http://localhost:8000/api/v1/", Duration::from_secs(5))
            .unwrap();
        assert_eq!(client.url("chat"), "http://localhost:8000/api/v1/chat");
    }
}
