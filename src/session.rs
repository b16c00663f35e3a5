//! Chat Session
//!
//! Owns the transport and the transcript for one conversation and folds
//! transport events into them, one event at a time.

use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::Config;
use crate::protocol::QuestionMode;
use crate::transcript::{Applied, MessageId, Transcript, TranscriptError, Turn};
use crate::transport::{ConnectionState, Transport, TransportError, TransportEvent};

/// Optional answer assist; at most one can be selected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assist {
    DeepSearch,
    Think,
}

impl Assist {
    pub fn label(&self) -> &'static str {
        match self {
            Assist::DeepSearch => "Deep Search",
            Assist::Think => "Think",
        }
    }
}

/// Connection status shown to the user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub connected: bool,
    /// Last transport error, cleared on the next successful connect
    pub error: Option<String>,
}

/// What a processed transport event changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    Connected,
    Disconnected { reason: String },
    Reconnecting { attempt: u32, delay: Duration },
    GaveUp { attempts: u32 },
    Error(String),
    Transcript(Applied),
}

/// Errors returned by session operations
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Input(#[from] TranscriptError),

    #[error("Not connected to {endpoint}")]
    NotConnected { endpoint: String },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Result type alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// One conversation with the chat backend
pub struct ChatSession {
    id: Uuid,
    endpoint: String,
    transport: Transport,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    transcript: Transcript,
    status: ConnectionStatus,
    mode: QuestionMode,
    /// Answers to masked questions; the backend never terminates these
    masked_answers: HashSet<MessageId>,
    assist: Option<Assist>,
}

impl ChatSession {
    /// Create an unconnected session from configuration
    pub fn new(config: &Config) -> Self {
        let (transport, events) = Transport::new(config.connection.reconnect_policy());

        Self {
            id: Uuid::new_v4(),
            endpoint: config.connection.endpoint.clone(),
            transport,
            events,
            transcript: Transcript::new(),
            status: ConnectionStatus::default(),
            mode: config.connection.mode,
            masked_answers: HashSet::new(),
            assist: None,
        }
    }

    /// Connect to the configured endpoint
    pub fn connect(&mut self) -> SessionResult<()> {
        tracing::info!(session_id = %self.id, endpoint = %self.endpoint, "Opening chat session");
        self.transport.connect(&self.endpoint)?;
        Ok(())
    }

    /// Submit a question
    ///
    /// Blank input and a closed socket are rejected without touching the
    /// transcript. Submitting while an answer is still streaming is allowed;
    /// serialize turns at the call site if that matters.
    pub fn submit(&mut self, text: &str) -> SessionResult<Turn> {
        if text.trim().is_empty() {
            return Err(TranscriptError::EmptyInput.into());
        }
        if !self.transport.is_connected() {
            return Err(SessionError::NotConnected {
                endpoint: self.endpoint.clone(),
            });
        }

        self.transport.send(text, self.mode)?;
        let turn = self.transcript.submit(text)?;
        if self.mode == QuestionMode::Masked {
            self.masked_answers.insert(turn.bot);
        }

        tracing::debug!(
            session_id = %self.id,
            user_id = %turn.user,
            bot_id = %turn.bot,
            mode = %self.mode,
            assist = ?self.assist,
            "Question submitted"
        );
        Ok(turn)
    }

    /// Wait for the next transport event and apply it
    ///
    /// The session's own transport keeps the event channel open, so this
    /// waits indefinitely while the session is idle or closed rather than
    /// returning `None`.
    pub async fn next_update(&mut self) -> Option<SessionUpdate> {
        let event = self.events.recv().await?;
        Some(self.apply_event(event))
    }

    /// Fold one transport event into status and transcript
    pub fn apply_event(&mut self, event: TransportEvent) -> SessionUpdate {
        match event {
            TransportEvent::Connected => {
                self.status.connected = true;
                self.status.error = None;
                SessionUpdate::Connected
            }
            TransportEvent::Stream(event) => {
                let applied = self.transcript.apply(event);
                if applied == Applied::Ignored {
                    tracing::debug!(session_id = %self.id, "Terminal signal with no open answer");
                }
                SessionUpdate::Transcript(applied)
            }
            TransportEvent::Error(message) => {
                self.status.error = Some(message.clone());
                SessionUpdate::Error(message)
            }
            TransportEvent::Disconnected { reason } => {
                self.status.connected = false;
                if let Some(open) = self.transcript.open_message() {
                    tracing::warn!(
                        session_id = %self.id,
                        message_id = %open.id,
                        "Disconnected while an answer was streaming"
                    );
                }
                SessionUpdate::Disconnected { reason }
            }
            TransportEvent::Reconnecting { attempt, delay } => {
                SessionUpdate::Reconnecting { attempt, delay }
            }
            TransportEvent::GaveUp { attempts } => {
                self.status.connected = false;
                self.status.error = Some(format!(
                    "Gave up reconnecting after {} attempts",
                    attempts
                ));
                SessionUpdate::GaveUp { attempts }
            }
        }
    }

    /// Whether answer `id` has arrived in full
    ///
    /// Auto answers finish with the end-of-answer signal. Masked answers come
    /// as one frame with no such signal, so they finish at their first
    /// fragment.
    pub fn answer_finished(&self, id: MessageId) -> bool {
        match self.transcript.get(id) {
            Some(message) if message.complete => true,
            Some(message) => self.masked_answers.contains(&id) && !message.loading,
            None => false,
        }
    }

    /// Select or clear an assist; selecting one deselects the other
    pub fn toggle_assist(&mut self, assist: Assist) -> Option<Assist> {
        self.assist = if self.assist == Some(assist) {
            None
        } else {
            Some(assist)
        };
        self.assist
    }

    pub fn assist(&self) -> Option<Assist> {
        self.assist
    }

    pub fn set_mode(&mut self, mode: QuestionMode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> QuestionMode {
        self.mode
    }

    pub fn status(&self) -> &ConnectionStatus {
        &self.status
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.transport.state()
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Start over with an empty transcript; the connection is kept
    pub fn reset(&mut self) {
        tracing::info!(session_id = %self.id, messages = self.transcript.len(), "Transcript reset");
        self.transcript = Transcript::new();
        self.masked_answers.clear();
    }

    /// Release the connection and cancel any pending reconnect
    pub async fn close(&mut self) {
        self.transport.shutdown().await;
        self.status.connected = false;
        tracing::info!(session_id = %self.id, "Chat session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::StreamEvent;

    fn session() -> ChatSession {
        ChatSession::new(&Config::default())
    }

    fn fragment(text: &str) -> TransportEvent {
        TransportEvent::Stream(StreamEvent::Fragment(text.to_string()))
    }

    #[test]
    fn test_submit_rejects_blank_before_connection_check() {
        let mut session = session();
        assert!(matches!(
            session.submit("   "),
            Err(SessionError::Input(TranscriptError::EmptyInput))
        ));
    }

    #[test]
    fn test_submit_while_disconnected_leaves_transcript_alone() {
        let mut session = session();
        let err = session.submit("hi").unwrap_err();
        assert!(matches!(err, SessionError::NotConnected { .. }));
        assert_eq!(err.to_string(), "Not connected to ws://localhost:8000/ws");
        assert!(session.transcript().is_empty());
    }

    #[test]
    fn test_connection_status_tracks_events() {
        let mut session = session();
        assert!(!session.status().connected);

        session.apply_event(TransportEvent::Error("WebSocket error occurred".to_string()));
        assert_eq!(session.status().error.as_deref(), Some("WebSocket error occurred"));

        assert_eq!(session.apply_event(TransportEvent::Connected), SessionUpdate::Connected);
        assert!(session.status().connected);
        assert!(session.status().error.is_none());

        session.apply_event(TransportEvent::Disconnected {
            reason: "stream ended".to_string(),
        });
        assert!(!session.status().connected);

        session.apply_event(TransportEvent::GaveUp { attempts: 4 });
        assert_eq!(
            session.status().error.as_deref(),
            Some("Gave up reconnecting after 4 attempts")
        );
    }

    #[test]
    fn test_stream_events_reach_transcript() {
        let mut session = session();
        let update = session.apply_event(fragment("Hello"));
        assert!(matches!(update, SessionUpdate::Transcript(Applied::Started(_))));

        session.apply_event(fragment(" world"));
        let update = session.apply_event(TransportEvent::Stream(StreamEvent::Terminal));
        assert!(matches!(update, SessionUpdate::Transcript(Applied::Completed(_))));

        let last = session.transcript().last().unwrap();
        assert_eq!(last.text, "Hello world");
        assert!(last.complete);
    }

    #[test]
    fn test_drop_mid_stream_keeps_partial_answer() {
        let mut session = session();
        session.apply_event(TransportEvent::Connected);
        session.apply_event(fragment("Hel"));

        let update = session.apply_event(TransportEvent::Disconnected {
            reason: "closed by server".to_string(),
        });
        assert!(matches!(update, SessionUpdate::Disconnected { .. }));
        session.apply_event(TransportEvent::Reconnecting {
            attempt: 1,
            delay: Duration::from_millis(3000),
        });

        let open = session.transcript().last().unwrap();
        assert_eq!(open.text, "Hel");
        assert!(!open.complete);
        assert!(session.transcript().is_streaming());
    }

    #[test]
    fn test_answer_finishes_on_terminal() {
        let mut session = session();
        let update = session.apply_event(fragment("Hel"));
        let SessionUpdate::Transcript(Applied::Started(id)) = update else {
            panic!("Expected Started, got {:?}", update);
        };
        assert!(!session.answer_finished(id));

        session.apply_event(fragment("lo"));
        assert!(!session.answer_finished(id));

        session.apply_event(TransportEvent::Stream(StreamEvent::Terminal));
        assert!(session.answer_finished(id));
        assert!(!session.answer_finished(MessageId(0)));
    }

    #[tokio::test]
    async fn test_next_update_waits_while_closed() {
        let mut session = session();
        session.close().await;

        let waited =
            tokio::time::timeout(Duration::from_millis(50), session.next_update()).await;
        assert!(waited.is_err());
    }

    #[test]
    fn test_assist_toggle_is_exclusive() {
        let mut session = session();
        assert_eq!(session.assist(), None);

        assert_eq!(session.toggle_assist(Assist::DeepSearch), Some(Assist::DeepSearch));
        assert_eq!(session.toggle_assist(Assist::Think), Some(Assist::Think));
        assert_eq!(session.toggle_assist(Assist::Think), None);
    }

    #[test]
    fn test_reset_clears_transcript() {
        let mut session = session();
        session.apply_event(fragment("stale"));
        session.reset();
        assert!(session.transcript().is_empty());
        assert!(!session.transcript().is_streaming());
    }

    #[test]
    fn test_mode_from_config() {
        let mut config = Config::default();
        config.connection.mode = QuestionMode::Masked;
        let mut session = ChatSession::new(&config);
        assert_eq!(session.mode(), QuestionMode::Masked);
        session.set_mode(QuestionMode::Auto);
        assert_eq!(session.mode(), QuestionMode::Auto);
    }
}
