//! Conversation state machine
//!
//! [`Conversation`] is an immutable snapshot of the chat: the ordered
//! message list, the adopted session id, and the in-flight exchange. Every
//! transition produces a new snapshot with the message list replaced
//! wholesale, so a renderer holding a snapshot never observes a
//! half-applied event.
//!
//! [`run_turn`] drives one user submission through
//! `Sent -> Streaming -> {Completed | Fallback -> {Completed | Failed}}`:
//! it prefers the streaming path, falls back to the single-shot call at most
//! once, and always leaves the assistant placeholder in a terminal state.

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    error::{Result, SageError},
    messages::Message,
    services::{
        streaming::{DoneData, StreamEvent},
        ChatResponse, ChatService,
    },
};

/// Prefix of the user-visible message composed when both paths fail
pub const FAILURE_PREFIX: &str = "Sorry, failed to reach the assistant: ";

/// The exchange currently being streamed
#[derive(Debug, Clone, PartialEq, Eq)]
struct ActiveExchange {
    /// Id of the assistant placeholder message
    placeholder_id: String,

    /// Delta fragments accumulated so far, in arrival order
    streamed: String,
}

/// Immutable snapshot of the conversation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    session_id: Option<String>,
    sending: bool,
    active: Option<ActiveExchange>,
}

impl Conversation {
    /// Empty conversation with no session
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty conversation resuming an existing backend session
    #[must_use]
    pub fn with_session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..Self::default()
        }
    }

    /// Messages in display order
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Session id adopted from the backend, if any
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Whether an exchange is in flight
    #[must_use]
    pub fn is_sending(&self) -> bool {
        self.sending
    }

    /// Begin a new exchange: append the user message and the assistant
    /// placeholder, and set the send-in-progress flag
    ///
    /// # Errors
    ///
    /// [`SageError::Busy`] while another exchange is in flight;
    /// [`SageError::InvalidInput`] when the trimmed text is empty.
    pub fn begin(&self, text: &str) -> Result<Self> {
        if self.sending {
            return Err(SageError::Busy);
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(SageError::InvalidInput("Query must not be empty".to_string()));
        }

        let placeholder = Message::pending();
        let placeholder_id = placeholder.id.clone();

        let mut messages = self.messages.clone();
        messages.push(Message::user(text));
        messages.push(placeholder);

        Ok(Self {
            messages,
            session_id: self.session_id.clone(),
            sending: true,
            active: Some(ActiveExchange {
                placeholder_id,
                streamed: String::new(),
            }),
        })
    }

    /// Apply one streaming event to the active exchange
    ///
    /// `meta` adopts the session id; `delta` grows the placeholder to the
    /// full accumulation so far; `done` replaces the placeholder wholesale
    /// and adopts the session id. `error` events carry no state change;
    /// the driver escalates them into the fallback path.
    #[must_use]
    pub fn apply_stream_event(&self, event: &StreamEvent) -> Self {
        match event {
            StreamEvent::Meta(meta) => {
                let mut next = self.clone();
                next.session_id = Some(meta.session_id.clone());
                next
            }
            StreamEvent::Delta(delta) => {
                let Some(active) = &self.active else {
                    warn!("Ignoring delta event with no active exchange");
                    return self.clone();
                };
                let mut exchange = active.clone();
                exchange.streamed.push_str(&delta.delta);

                let mut next = self.replace_content(&exchange.placeholder_id, &exchange.streamed);
                next.active = Some(exchange);
                next
            }
            StreamEvent::Done(done) => self.complete(done),
            StreamEvent::Error(_) => self.clone(),
        }
    }

    /// Terminal success from the stream's `done` event
    #[must_use]
    fn complete(&self, done: &DoneData) -> Self {
        let mut next = match &self.active {
            Some(active) => self.replace_message(&active.placeholder_id, done.message.clone()),
            None => self.clone(),
        };
        next.session_id = Some(done.session_id.clone());
        next.active = None;
        next
    }

    /// Terminal success from the fallback response
    ///
    /// The fallback's session id overwrites anything a prior `meta` adopted.
    #[must_use]
    pub fn apply_response(&self, response: &ChatResponse) -> Self {
        let mut next = match &self.active {
            Some(active) => self.replace_message(&active.placeholder_id, response.message.clone()),
            None => self.clone(),
        };
        next.session_id = Some(response.session_id.clone());
        next.active = None;
        next
    }

    /// Terminal failure: surface the detail in the placeholder content
    #[must_use]
    pub fn fail(&self, detail: &str) -> Self {
        let mut next = match &self.active {
            Some(active) => self.replace_content(
                &active.placeholder_id,
                &format!("{FAILURE_PREFIX}{detail}"),
            ),
            None => self.clone(),
        };
        next.active = None;
        next
    }

    /// Clear the send-in-progress flag; invoked on every terminal path
    #[must_use]
    pub fn finish(&self) -> Self {
        let mut next = self.clone();
        next.sending = false;
        next.active = None;
        next
    }

    fn replace_content(&self, id: &str, content: &str) -> Self {
        let mut next = self.clone();
        next.messages = self
            .messages
            .iter()
            .map(|msg| {
                if msg.id == id {
                    let mut updated = msg.clone();
                    updated.content = content.to_string();
                    updated
                } else {
                    msg.clone()
                }
            })
            .collect();
        next
    }

    fn replace_message(&self, id: &str, replacement: Message) -> Self {
        let mut next = self.clone();
        next.messages = self
            .messages
            .iter()
            .map(|msg| {
                if msg.id == id {
                    replacement.clone()
                } else {
                    msg.clone()
                }
            })
            .collect();
        next
    }
}

/// Drive one submission to its terminal state
///
/// `on_update` receives every intermediate snapshot, in order; the returned
/// snapshot is the terminal one. Streaming failures (transport errors,
/// cancellation, an `error` event, or a stream that ends without a terminal
/// event) trigger exactly one fallback attempt; a fallback failure is
/// surfaced in the assistant message content, never as an `Err`.
///
/// # Errors
///
/// Only submission-time rejections ([`SageError::Busy`],
/// [`SageError::InvalidInput`]) are returned as errors; the caller's
/// snapshot is unchanged in that case.
pub async fn run_turn<S>(
    service: &S,
    conversation: &Conversation,
    text: &str,
    cancel: CancellationToken,
    mut on_update: impl FnMut(&Conversation) + Send,
) -> Result<Conversation>
where
    S: ChatService + ?Sized,
{
    let mut state = conversation.begin(text)?;
    on_update(&state);

    let query = text.trim().to_string();
    let session_at_submit = state.session_id.clone();

    let mut completed = false;
    let stream_outcome = {
        let state = &mut state;
        let completed = &mut completed;
        let on_update = &mut on_update;
        let mut handler = move |event: StreamEvent| -> Result<()> {
            if *completed {
                // Terminal event already seen; later events are not processed.
                return Ok(());
            }
            if let StreamEvent::Error(err) = &event {
                return Err(SageError::Protocol(err.error.clone()));
            }
            if matches!(event, StreamEvent::Done(_)) {
                *completed = true;
            }
            *state = state.apply_stream_event(&event);
            on_update(state);
            Ok(())
        };

        service
            .stream_chat(&query, session_at_submit.as_deref(), &mut handler, cancel)
            .await
    };

    let stream_failure = match stream_outcome {
        Ok(()) if completed => None,
        Ok(()) => Some(SageError::Protocol(
            "stream ended before a terminal event".to_string(),
        )),
        Err(err) => Some(err),
    };

    if let Some(failure) = stream_failure {
        debug!("Streaming failed ({failure}); falling back to single-shot chat");

        match service.send_chat(&query, state.session_id()).await {
            Ok(response) => {
                state = state.apply_response(&response);
                on_update(&state);
            }
            Err(fallback_err) => {
                state = state.fail(&fallback_err.detail());
                on_update(&state);
            }
        }
    }

    state = state.finish();
    on_update(&state);
    Ok(state)
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        messages::{Role, PENDING_CONTENT},
        services::{
            streaming::{DeltaData, ErrorData, MetaData},
            OnEvent, SessionInfo,
        },
    };

    fn meta(session: &str) -> StreamEvent {
        StreamEvent::Meta(MetaData {
            session_id: session.to_string(),
            message_id: "m1".to_string(),
        })
    }

    fn delta(text: &str) -> StreamEvent {
        StreamEvent::Delta(DeltaData {
            delta: text.to_string(),
        })
    }

    fn done(content: &str, session: &str) -> StreamEvent {
        StreamEvent::Done(DoneData {
            message: Message::assistant(content),
            session_id: session.to_string(),
            parsed: None,
        })
    }

    fn response(content: &str, session: &str) -> ChatResponse {
        ChatResponse {
            message: Message::assistant(content),
            session_id: session.to_string(),
            parsed: None,
        }
    }

    /// Scripted [`ChatService`]: one streaming outcome, one fallback outcome
    struct ScriptedService {
        events: Vec<StreamEvent>,
        stream_error: Mutex<Option<SageError>>,
        fallback: Mutex<Option<Result<ChatResponse>>>,
        fallback_calls: AtomicUsize,
        fallback_session: Mutex<Option<Option<String>>>,
    }

    impl ScriptedService {
        fn new(
            events: Vec<StreamEvent>,
            stream_error: Option<SageError>,
            fallback: Option<Result<ChatResponse>>,
        ) -> Self {
            Self {
                events,
                stream_error: Mutex::new(stream_error),
                fallback: Mutex::new(fallback),
                fallback_calls: AtomicUsize::new(0),
                fallback_session: Mutex::new(None),
            }
        }

        fn fallback_calls(&self) -> usize {
            self.fallback_calls.load(Ordering::SeqCst)
        }

        fn fallback_session(&self) -> Option<Option<String>> {
            self.fallback_session.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatService for ScriptedService {
        async fn send_chat(
            &self,
            _query: &str,
            session_id: Option<&str>,
        ) -> Result<ChatResponse> {
            self.fallback_calls.fetch_add(1, Ordering::SeqCst);
            *self.fallback_session.lock().unwrap() = Some(session_id.map(str::to_string));
            self.fallback
                .lock()
                .unwrap()
                .take()
                .expect("unexpected fallback call")
        }

        async fn stream_chat(
            &self,
            _query: &str,
            _session_id: Option<&str>,
            on_event: OnEvent<'_>,
            _cancel: CancellationToken,
        ) -> Result<()> {
            for event in self.events.clone() {
                on_event(event)?;
            }
            match self.stream_error.lock().unwrap().take() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }

        async fn chat_history(&self, _session_id: &str) -> Result<SessionInfo> {
            unimplemented!("not used by the driver")
        }
    }

    fn assistant_content(conversation: &Conversation) -> &str {
        let last = conversation.messages().last().expect("no messages");
        assert_eq!(last.role, Role::Assistant);
        &last.content
    }

    #[test]
    fn test_begin_appends_user_and_placeholder() {
        let conv = Conversation::new().begin("  Hello  ").unwrap();
        assert_eq!(conv.messages().len(), 2);
        assert_eq!(conv.messages()[0].role, Role::User);
        assert_eq!(conv.messages()[0].content, "Hello");
        assert_eq!(assistant_content(&conv), PENDING_CONTENT);
        assert!(conv.is_sending());
    }

    #[test]
    fn test_begin_rejects_empty_text() {
        let result = Conversation::new().begin("   ");
        assert!(matches!(result, Err(SageError::InvalidInput(_))));
    }

    #[test]
    fn test_begin_rejects_while_sending() {
        let conv = Conversation::new().begin("one").unwrap();
        let result = conv.begin("two");
        assert!(matches!(result, Err(SageError::Busy)));
        assert_eq!(conv.messages().len(), 2);
    }

    #[test]
    fn test_delta_accumulation_preserves_order() {
        let conv = Conversation::new().begin("hi").unwrap();

        let forward = conv
            .apply_stream_event(&delta("He"))
            .apply_stream_event(&delta("llo"));
        assert_eq!(assistant_content(&forward), "Hello");

        let reversed = conv
            .apply_stream_event(&delta("llo"))
            .apply_stream_event(&delta("He"));
        assert_eq!(assistant_content(&reversed), "lloHe");
    }

    #[test]
    fn test_meta_adopts_session_id() {
        let conv = Conversation::new()
            .begin("hi")
            .unwrap()
            .apply_stream_event(&meta("s1"));
        assert_eq!(conv.session_id(), Some("s1"));
    }

    #[test]
    fn test_meta_after_delta_still_adopts() {
        let conv = Conversation::new()
            .begin("hi")
            .unwrap()
            .apply_stream_event(&delta("partial"))
            .apply_stream_event(&meta("s1"));
        assert_eq!(conv.session_id(), Some("s1"));
        assert_eq!(assistant_content(&conv), "partial");
    }

    #[test]
    fn test_done_replaces_placeholder_wholesale() {
        let conv = Conversation::new()
            .begin("hi")
            .unwrap()
            .apply_stream_event(&meta("s1"))
            .apply_stream_event(&delta("Hi"))
            .apply_stream_event(&done("Hi there", "s1"));

        assert_eq!(conv.messages().len(), 2);
        assert_eq!(assistant_content(&conv), "Hi there");
        assert_eq!(conv.session_id(), Some("s1"));
    }

    #[test]
    fn test_snapshots_are_independent() {
        let before = Conversation::new().begin("hi").unwrap();
        let after = before.apply_stream_event(&delta("Hello"));
        // The earlier snapshot is untouched by the transition.
        assert_eq!(assistant_content(&before), PENDING_CONTENT);
        assert_eq!(assistant_content(&after), "Hello");
    }

    #[tokio::test]
    async fn test_turn_streaming_happy_path() {
        let service = ScriptedService::new(
            vec![meta("s1"), delta("Hi"), done("Hi there", "s1")],
            None,
            None,
        );

        let mut snapshots = Vec::new();
        let conv = run_turn(
            &service,
            &Conversation::new(),
            "hello",
            CancellationToken::new(),
            |snapshot| snapshots.push(snapshot.clone()),
        )
        .await
        .unwrap();

        assert_eq!(conv.messages().len(), 2);
        assert_eq!(assistant_content(&conv), "Hi there");
        assert_eq!(conv.session_id(), Some("s1"));
        assert!(!conv.is_sending());
        assert_eq!(service.fallback_calls(), 0);

        // Placeholder content always equals the accumulation so far.
        let streamed: Vec<&str> = snapshots
            .iter()
            .map(|s| s.messages().last().unwrap().content.as_str())
            .collect();
        assert_eq!(
            streamed,
            vec![PENDING_CONTENT, PENDING_CONTENT, "Hi", "Hi there", "Hi there"]
        );
    }

    #[tokio::test]
    async fn test_turn_transport_failure_falls_back_once() {
        let service = ScriptedService::new(
            vec![],
            Some(SageError::transport(502, "bad gateway")),
            Some(Ok(response("Recovered", "s2"))),
        );

        let conv = run_turn(
            &service,
            &Conversation::new(),
            "hello",
            CancellationToken::new(),
            |_| {},
        )
        .await
        .unwrap();

        assert_eq!(service.fallback_calls(), 1);
        assert_eq!(service.fallback_session(), Some(None));
        assert_eq!(assistant_content(&conv), "Recovered");
        assert_eq!(conv.session_id(), Some("s2"));
        assert!(!conv.is_sending());
    }

    #[tokio::test]
    async fn test_turn_error_event_escalates_then_fallback_failure_surfaces_detail() {
        let service = ScriptedService::new(
            vec![
                meta("s1"),
                delta("par"),
                StreamEvent::Error(ErrorData {
                    error: "agent exploded".to_string(),
                }),
            ],
            None,
            Some(Err(SageError::transport(500, "boom"))),
        );

        let mut error_events_applied = false;
        let conv = run_turn(
            &service,
            &Conversation::new(),
            "hello",
            CancellationToken::new(),
            |snapshot| {
                error_events_applied |= assistant_content(snapshot).contains("agent exploded");
            },
        )
        .await
        .unwrap();

        assert_eq!(service.fallback_calls(), 1);
        // The error event never lands in message content directly.
        assert!(!error_events_applied);
        assert!(assistant_content(&conv).starts_with(FAILURE_PREFIX));
        assert!(assistant_content(&conv).contains("boom"));
        assert!(!conv.is_sending());
    }

    #[tokio::test]
    async fn test_turn_fallback_uses_session_adopted_from_meta() {
        let service = ScriptedService::new(
            vec![meta("s1")],
            Some(SageError::Protocol("stream cut".to_string())),
            Some(Ok(response("Recovered", "s2"))),
        );

        let conv = run_turn(
            &service,
            &Conversation::new(),
            "hello",
            CancellationToken::new(),
            |_| {},
        )
        .await
        .unwrap();

        // Fallback carries the current session; its response then wins.
        assert_eq!(service.fallback_session(), Some(Some("s1".to_string())));
        assert_eq!(conv.session_id(), Some("s2"));
    }

    #[tokio::test]
    async fn test_turn_stream_without_terminal_event_falls_back() {
        let service = ScriptedService::new(
            vec![meta("s1"), delta("half")],
            None,
            Some(Ok(response("Full answer", "s1"))),
        );

        let conv = run_turn(
            &service,
            &Conversation::new(),
            "hello",
            CancellationToken::new(),
            |_| {},
        )
        .await
        .unwrap();

        assert_eq!(service.fallback_calls(), 1);
        assert_eq!(assistant_content(&conv), "Full answer");
    }

    #[tokio::test]
    async fn test_turn_busy_rejection_leaves_state_untouched() {
        let service = ScriptedService::new(vec![], None, None);
        let sending = Conversation::new().begin("first").unwrap();

        let result = run_turn(
            &service,
            &sending,
            "second",
            CancellationToken::new(),
            |_| {},
        )
        .await;

        assert!(matches!(result, Err(SageError::Busy)));
        assert_eq!(sending.messages().len(), 2);
        assert_eq!(service.fallback_calls(), 0);
    }

    #[tokio::test]
    async fn test_turn_never_leaves_placeholder_pending() {
        let service = ScriptedService::new(
            vec![],
            Some(SageError::transport(502, "down")),
            Some(Err(SageError::transport(502, "still down"))),
        );

        let conv = run_turn(
            &service,
            &Conversation::new(),
            "hello",
            CancellationToken::new(),
            |_| {},
        )
        .await
        .unwrap();

        assert!(!conv.messages().last().unwrap().is_pending());
        assert!(assistant_content(&conv).contains("still down"));
    }
}
