//! Chat Frame Types
//!
//! JSON frames exchanged with the question-answering backend.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// How the backend should answer a question
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionMode {
    /// Generated answer, streamed fragment by fragment
    #[default]
    Auto,
    /// Extractive answer, sent as a single fragment
    Masked,
}

impl QuestionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionMode::Auto => "auto",
            QuestionMode::Masked => "masked",
        }
    }
}

impl fmt::Display for QuestionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(QuestionMode::Auto),
            "masked" => Ok(QuestionMode::Masked),
            other => Err(format!("unknown question mode: {}", other)),
        }
    }
}

/// Frame sent from client to backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingFrame {
    #[serde(rename = "type")]
    pub mode: QuestionMode,
    pub question: String,
}

impl OutgoingFrame {
    pub fn new(question: impl Into<String>, mode: QuestionMode) -> Self {
        Self {
            mode,
            question: question.into(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Frame sent from backend to client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingFrame {
    /// Answer fragment; the empty string marks the end of the answer
    pub answer: String,
}

impl IncomingFrame {
    pub fn into_event(self) -> StreamEvent {
        if self.answer.is_empty() {
            StreamEvent::Terminal
        } else {
            StreamEvent::Fragment(self.answer)
        }
    }
}

/// Classified inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Non-empty piece of answer text
    Fragment(String),
    /// The current answer is finished (not the connection)
    Terminal,
}

/// Inbound frame could not be understood
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Malformed frame: {error}")]
    Malformed { error: String, frame: String },
}

/// Parse a text frame into a stream event
pub fn parse_inbound(text: &str) -> Result<StreamEvent, ProtocolError> {
    serde_json::from_str::<IncomingFrame>(text)
        .map(IncomingFrame::into_event)
        .map_err(|e| ProtocolError::Malformed {
            error: e.to_string(),
            frame: text.to_string(),
        })
}
