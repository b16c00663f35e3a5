//! Transcript error types

use thiserror::Error;

/// Errors raised at the transcript boundary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranscriptError {
    /// Submission was empty or whitespace only
    #[error("Message is empty")]
    EmptyInput,
}

/// Result type alias for transcript operations
pub type TranscriptResult<T> = Result<T, TranscriptError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(TranscriptError::EmptyInput.to_string(), "Message is empty");
    }
}
