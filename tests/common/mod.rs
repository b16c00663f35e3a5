//! Local chat backend for integration tests
//!
//! Routes:
//! - `/ws`   answers every question; auto answers end with `""`
//! - `/drop` first connection sends one fragment then closes; later ones idle

#![allow(dead_code)]

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use chatline::TransportEvent;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
pub struct Counters {
    pub answer_connections: AtomicUsize,
    pub drop_connections: AtomicUsize,
}

pub struct Backend {
    pub addr: SocketAddr,
    pub counters: Arc<Counters>,
}

impl Backend {
    pub fn url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    pub fn answer_connections(&self) -> usize {
        self.counters.answer_connections.load(Ordering::SeqCst)
    }

    pub fn drop_connections(&self) -> usize {
        self.counters.drop_connections.load(Ordering::SeqCst)
    }
}

pub async fn spawn_backend() -> Backend {
    let counters = Arc::new(Counters::default());
    let app = Router::new()
        .route("/ws", get(answer_handler))
        .route("/drop", get(drop_handler))
        .with_state(Arc::clone(&counters));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Backend { addr, counters }
}

/// Next transport event, failing the test if none arrives in time
pub async fn next_event(events: &mut mpsc::UnboundedReceiver<TransportEvent>) -> TransportEvent {
    tokio::time::timeout(EVENT_TIMEOUT, events.recv())
        .await
        .expect("timed out waiting for transport event")
        .expect("transport event channel closed")
}

async fn answer_handler(ws: WebSocketUpgrade, State(counters): State<Arc<Counters>>) -> Response {
    counters.answer_connections.fetch_add(1, Ordering::SeqCst);
    ws.on_upgrade(answer_questions)
}

async fn drop_handler(ws: WebSocketUpgrade, State(counters): State<Arc<Counters>>) -> Response {
    let previous = counters.drop_connections.fetch_add(1, Ordering::SeqCst);
    ws.on_upgrade(move |socket| async move {
        if previous == 0 {
            drop_after_fragment(socket).await;
        } else {
            idle(socket).await;
        }
    })
}

/// `2+2?` gets `4`; anything else gets `[auto] question` in two fragments,
/// each answer closed with `""`. Masked questions get one `[masked] question`
/// frame and no terminal. Questions starting with `noise` are preceded by junk
/// frames.
async fn answer_questions(mut socket: WebSocket) {
    while let Some(Ok(message)) = socket.recv().await {
        let Message::Text(text) = message else {
            continue;
        };

        let Ok(frame) = serde_json::from_str::<serde_json::Value>(&text) else {
            let _ = socket.send(Message::Text("Error: Invalid frame.".to_string())).await;
            continue;
        };
        let mode = frame["type"].as_str().unwrap_or_default().to_string();
        let question = frame["question"].as_str().unwrap_or_default().trim().to_string();

        if question.is_empty() {
            let _ = socket
                .send(Message::Text("Error: No question provided.".to_string()))
                .await;
            continue;
        }

        if question.starts_with("noise") {
            let _ = socket
                .send(Message::Text("Error: Unknown question type.".to_string()))
                .await;
            let _ = socket.send(Message::Binary(vec![1, 2, 3])).await;
            let _ = socket.send(Message::Text(r#"{"answer": 7}"#.to_string())).await;
        }

        if mode == "masked" {
            let frame = serde_json::json!({ "answer": format!("[masked] {}", question) }).to_string();
            if socket.send(Message::Text(frame)).await.is_err() {
                return;
            }
            continue;
        }

        let fragments = if question == "2+2?" {
            vec!["4".to_string()]
        } else {
            vec![format!("[{}] ", mode), question]
        };

        for fragment in fragments.into_iter().chain(std::iter::once(String::new())) {
            let frame = serde_json::json!({ "answer": fragment }).to_string();
            if socket.send(Message::Text(frame)).await.is_err() {
                return;
            }
        }
    }
}

async fn drop_after_fragment(mut socket: WebSocket) {
    while let Some(Ok(message)) = socket.recv().await {
        if let Message::Text(_) = message {
            let frame = serde_json::json!({ "answer": "Hel" }).to_string();
            let _ = socket.send(Message::Text(frame)).await;
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    }
}

async fn idle(mut socket: WebSocket) {
    while let Some(Ok(_)) = socket.recv().await {}
}
