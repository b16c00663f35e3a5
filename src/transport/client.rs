//! WebSocket Client
//!
//! Owns one logical connection to the chat backend. The socket lives in a
//! spawned connection task; the owner talks to it through a command channel
//! and receives [`TransportEvent`]s in order on an unbounded channel.

use futures_util::{SinkExt, StreamExt};
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::error::{TransportError, TransportResult};
use super::events::{ConnectionState, TransportEvent};
use super::policy::ReconnectPolicy;
use crate::protocol::{parse_inbound, OutgoingFrame, QuestionMode};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long `shutdown` waits for the connection task to say goodbye
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Commands from the handle to the connection task
#[derive(Debug)]
enum Command {
    Send(String),
    Close,
}

/// How a connected session ended
enum Outcome {
    /// Owner asked to close
    Shutdown,
    /// Socket dropped; reconnect per policy
    Dropped(String),
}

/// The connection task currently owned by a [`Transport`]
struct ActiveConnection {
    endpoint: String,
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

/// Handle to the chat backend connection
///
/// Must be used from within a tokio runtime. Dropping the handle closes the
/// connection and cancels any pending reconnect.
pub struct Transport {
    policy: ReconnectPolicy,
    events: mpsc::UnboundedSender<TransportEvent>,
    state: watch::Receiver<ConnectionState>,
    active: Option<ActiveConnection>,
}

impl Transport {
    /// Create an unconnected transport and the receiver for its events
    pub fn new(policy: ReconnectPolicy) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let transport = Self {
            policy,
            events,
            state: detached_state(ConnectionState::Idle),
            active: None,
        };
        (transport, events_rx)
    }

    /// Connect to `endpoint`
    ///
    /// No-op while a live connection task for the same endpoint exists. A
    /// different endpoint, or a task that has closed or given up, is
    /// replaced with a fresh one.
    pub fn connect(&mut self, endpoint: &str) -> TransportResult<()> {
        if let Some(active) = &self.active {
            if active.endpoint == endpoint && !active.task.is_finished() {
                tracing::debug!(endpoint = %endpoint, "Connection already held");
                return Ok(());
            }
        }

        validate_endpoint(endpoint)?;
        self.close();

        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);

        let worker = ConnectionWorker {
            endpoint: endpoint.to_string(),
            policy: self.policy,
            commands: commands_rx,
            events: self.events.clone(),
            state: state_tx,
        };
        let task = tokio::spawn(worker.run());

        tracing::info!(endpoint = %endpoint, policy = ?self.policy, "Connecting");

        self.state = state_rx;
        self.active = Some(ActiveConnection {
            endpoint: endpoint.to_string(),
            commands,
            task,
        });
        Ok(())
    }

    /// Send a question to the backend
    ///
    /// Returns [`TransportError::NotReady`] without sending when the socket is
    /// not open.
    pub fn send(&self, question: &str, mode: QuestionMode) -> TransportResult<()> {
        let active = match &self.active {
            Some(active) if self.is_connected() => active,
            _ => {
                tracing::warn!(state = ?self.state(), "Socket not ready, question not sent");
                return Err(TransportError::NotReady);
            }
        };

        let frame = OutgoingFrame::new(question, mode).to_json()?;
        tracing::debug!(mode = %mode, len = question.len(), "Sending question");

        active
            .commands
            .send(Command::Send(frame))
            .map_err(|_| TransportError::ChannelClosed)
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_open()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch connection state changes of the current connection task
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.endpoint.as_str())
    }

    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }

    /// Release the connection and cancel any pending reconnect
    pub fn close(&mut self) {
        if let Some(active) = self.active.take() {
            tracing::debug!(endpoint = %active.endpoint, "Closing connection");
            // The task may already have finished
            let _ = active.commands.send(Command::Close);
            self.state = detached_state(ConnectionState::Closed);
        }
    }

    /// Close and wait briefly for the connection task to finish its goodbye
    pub async fn shutdown(&mut self) {
        if let Some(active) = self.active.take() {
            let _ = active.commands.send(Command::Close);
            self.state = detached_state(ConnectionState::Closed);

            let mut task = active.task;
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await.is_err() {
                tracing::debug!("Connection task slow to stop, aborting");
                task.abort();
            }
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.close();
    }
}

/// A state receiver whose sender is already gone
fn detached_state(state: ConnectionState) -> watch::Receiver<ConnectionState> {
    let (_tx, rx) = watch::channel(state);
    rx
}

fn validate_endpoint(endpoint: &str) -> TransportResult<()> {
    if !(endpoint.starts_with("ws://") || endpoint.starts_with("wss://")) {
        return Err(TransportError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: "expected ws:// or wss:// URL".to_string(),
        });
    }

    endpoint
        .into_client_request()
        .map(|_| ())
        .map_err(|e| TransportError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
}

/// Runs inside the spawned connection task
struct ConnectionWorker {
    endpoint: String,
    policy: ReconnectPolicy,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<TransportEvent>,
    state: watch::Sender<ConnectionState>,
}

impl ConnectionWorker {
    async fn run(mut self) {
        let mut attempt: u32 = 0;

        loop {
            self.set_state(ConnectionState::Connecting);

            let connect = tokio_tungstenite::connect_async(self.endpoint.clone());
            let reason = match self.until_closed(connect).await {
                None => break,
                Some(Ok((socket, _response))) => {
                    attempt = 0;
                    self.set_state(ConnectionState::Open);
                    tracing::info!(endpoint = %self.endpoint, "WebSocket connected");
                    self.emit(TransportEvent::Connected);

                    match self.pump(socket).await {
                        Outcome::Shutdown => break,
                        Outcome::Dropped(reason) => reason,
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(endpoint = %self.endpoint, error = %e, "WebSocket connection failed");
                    self.emit(TransportEvent::Error(format!("WebSocket error occurred: {}", e)));
                    e.to_string()
                }
            };

            tracing::info!(endpoint = %self.endpoint, reason = %reason, "WebSocket disconnected");
            self.emit(TransportEvent::Disconnected { reason });

            attempt = attempt.saturating_add(1);
            let Some(delay) = self.policy.delay_for(attempt) else {
                let attempts = attempt - 1;
                tracing::error!(endpoint = %self.endpoint, attempts, "Max reconnect attempts reached");
                self.set_state(ConnectionState::GaveUp);
                self.emit(TransportEvent::GaveUp { attempts });
                return;
            };

            tracing::info!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Scheduling reconnect"
            );
            self.emit(TransportEvent::Reconnecting { attempt, delay });
            self.set_state(ConnectionState::Reconnecting { attempt });

            if self.until_closed(tokio::time::sleep(delay)).await.is_none() {
                break;
            }
        }

        self.set_state(ConnectionState::Closed);
        tracing::debug!(endpoint = %self.endpoint, "Connection task stopped");
    }

    /// Drive an open socket until it drops or the owner closes it
    async fn pump(&mut self, socket: Socket) -> Outcome {
        let (mut sink, mut source) = socket.split();

        loop {
            tokio::select! {
                inbound = source.next() => match inbound {
                    Some(Ok(message)) => {
                        if let Some(reason) = self.handle_inbound(message) {
                            return Outcome::Dropped(reason);
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "WebSocket receive error");
                        self.emit(TransportEvent::Error(format!("WebSocket error occurred: {}", e)));
                        return Outcome::Dropped(e.to_string());
                    }
                    None => return Outcome::Dropped("stream ended".to_string()),
                },
                command = self.commands.recv() => match command {
                    Some(Command::Send(frame)) => {
                        if let Err(e) = sink.send(Message::text(frame)).await {
                            tracing::warn!(error = %e, "WebSocket send failed");
                            self.emit(TransportEvent::Error(format!("WebSocket error occurred: {}", e)));
                            return Outcome::Dropped(e.to_string());
                        }
                    }
                    Some(Command::Close) | None => {
                        if let Err(e) = sink.close().await {
                            tracing::debug!(error = %e, "Close handshake failed");
                        }
                        return Outcome::Shutdown;
                    }
                },
            }
        }
    }

    /// Forward one inbound message; returns a reason when the peer closed
    fn handle_inbound(&self, message: Message) -> Option<String> {
        match message {
            Message::Text(text) => {
                match parse_inbound(text.as_str()) {
                    Ok(event) => self.emit(TransportEvent::Stream(event)),
                    Err(e) => {
                        tracing::warn!(error = %e, frame = %text.as_str(), "Dropping malformed frame");
                    }
                }
                None
            }
            Message::Binary(data) => {
                tracing::debug!(len = data.len(), "Ignoring binary frame");
                None
            }
            // tungstenite answers pings on its own
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => None,
            Message::Close(frame) => Some(match frame {
                Some(frame) => format!(
                    "closed by server: code={}, reason={}",
                    u16::from(frame.code),
                    frame.reason.as_str()
                ),
                None => "closed by server".to_string(),
            }),
        }
    }

    /// Await `fut` while servicing commands; `None` if the owner closed first
    async fn until_closed<F: Future>(&mut self, fut: F) -> Option<F::Output> {
        tokio::pin!(fut);
        loop {
            tokio::select! {
                output = &mut fut => return Some(output),
                command = self.commands.recv() => match command {
                    Some(Command::Send(frame)) => {
                        tracing::warn!(frame = %frame, "Socket not ready, dropping frame");
                    }
                    Some(Command::Close) | None => return None,
                },
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        // send_replace succeeds even when the handle has moved on
        self.state.send_replace(state);
    }

    fn emit(&self, event: TransportEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("Transport owner gone, event dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_endpoint() {
        assert!(validate_endpoint("ws://localhost:8000/ws").is_ok());
        assert!(validate_endpoint("wss://chat.example.com/ws").is_ok());
        assert!(matches!(
            validate_endpoint("http://localhost:8000/ws"),
            Err(TransportError::InvalidEndpoint { .. })
        ));
        assert!(validate_endpoint("localhost:8000").is_err());
    }

    #[tokio::test]
    async fn test_send_before_connect_is_not_ready() {
        let (transport, _events) = Transport::new(ReconnectPolicy::default());
        assert_eq!(transport.state(), ConnectionState::Idle);
        assert!(!transport.is_connected());
        assert!(matches!(
            transport.send("hi", QuestionMode::Auto),
            Err(TransportError::NotReady)
        ));
    }

    #[tokio::test]
    async fn test_invalid_endpoint_rejected_without_spawning() {
        let (mut transport, _events) = Transport::new(ReconnectPolicy::default());
        assert!(transport.connect("tcp://nowhere").is_err());
        assert!(transport.endpoint().is_none());
        assert_eq!(transport.state(), ConnectionState::Idle);
    }

    #[tokio::test]
    async fn test_close_cancels_pending_reconnect() {
        // Nothing listens on port 1, so the first connect fails and a long
        // reconnect delay is scheduled.
        let (mut transport, mut events) =
            Transport::new(ReconnectPolicy::fixed(Duration::from_secs(3600)));
        transport.connect("ws://127.0.0.1:1/ws").unwrap();

        let mut watch = transport.watch_state();
        tokio::time::timeout(
            Duration::from_secs(5),
            watch.wait_for(|s| matches!(s, ConnectionState::Reconnecting { .. })),
        )
        .await
        .expect("reconnect never scheduled")
        .unwrap();

        transport.shutdown().await;
        assert_eq!(transport.state(), ConnectionState::Closed);
        assert_eq!(*watch.borrow(), ConnectionState::Closed);

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert!(matches!(seen.first(), Some(TransportEvent::Error(_))));
        assert!(seen.contains(&TransportEvent::Reconnecting {
            attempt: 1,
            delay: Duration::from_secs(3600),
        }));
        assert!(!seen.contains(&TransportEvent::Connected));
    }

    #[tokio::test]
    async fn test_drop_cancels_pending_reconnect() {
        let (mut transport, mut events) =
            Transport::new(ReconnectPolicy::fixed(Duration::from_secs(3600)));
        transport.connect("ws://127.0.0.1:1/ws").unwrap();

        let mut watch = transport.watch_state();
        tokio::time::timeout(
            Duration::from_secs(5),
            watch.wait_for(|s| matches!(s, ConnectionState::Reconnecting { .. })),
        )
        .await
        .expect("reconnect never scheduled")
        .unwrap();

        drop(transport);

        tokio::time::timeout(
            Duration::from_secs(5),
            watch.wait_for(|s| *s == ConnectionState::Closed),
        )
        .await
        .expect("connection task still sleeping")
        .unwrap();

        // The event channel closes once the task has let go of its sender
        let drained = tokio::time::timeout(Duration::from_secs(5), async {
            while events.recv().await.is_some() {}
        })
        .await;
        assert!(drained.is_ok());
    }

    #[tokio::test]
    async fn test_capped_policy_gives_up() {
        let (mut transport, mut events) =
            Transport::new(ReconnectPolicy::capped(Duration::from_millis(10), 2));
        transport.connect("ws://127.0.0.1:1/ws").unwrap();

        let gave_up = tokio::time::timeout(Duration::from_secs(10), async {
            while let Some(event) = events.recv().await {
                if let TransportEvent::GaveUp { attempts } = event {
                    return attempts;
                }
            }
            0
        })
        .await
        .expect("policy never gave up");

        assert_eq!(gave_up, 2);
        let mut watch = transport.watch_state();
        watch.wait_for(|s| s.is_terminal()).await.unwrap();
        assert_eq!(transport.state(), ConnectionState::GaveUp);
    }
}
