//! Error types shared by the session core and the service adapters.
//!
//! Nothing here is fatal: every variant is recovered at the orchestrator boundary
//! and turned into user-visible session state.

use std::time::Duration;

pub type Result<T> = std::result::Result<T, PracticeError>;

/// Hand-edited test-case text that is not a JSON array of `{input, expected}` records.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid test cases (line {line}, column {column}): {message}")]
pub struct ParseError {
  pub message: String,
  pub line: usize,
  pub column: usize,
}

impl From<serde_json::Error> for ParseError {
  fn from(e: serde_json::Error) -> Self {
    Self { message: e.to_string(), line: e.line(), column: e.column() }
  }
}

#[derive(Debug, thiserror::Error)]
pub enum PracticeError {
  /// Network or service failure while generating a problem or an alternate answer.
  #[error("Generation failed: {0}")]
  Generation(String),

  #[error(transparent)]
  Decode(#[from] ParseError),

  /// Network or service failure while grading.
  #[error("Grading service failed: {0}")]
  GradingService(String),

  /// The grader returned a different number of results than test cases were sent.
  #[error("Grading protocol mismatch: sent {sent} test cases, received {received} results")]
  GradingProtocolMismatch { sent: usize, received: usize },

  #[error("{operation} timed out after {after:?}")]
  Timeout { operation: &'static str, after: Duration },

  #[error("Stats store error: {0}")]
  Store(String),

  #[error("Archive error: {0}")]
  Archive(String),

  /// Topic/difficulty combination the catalog does not allow.
  #[error("Invalid selection: {0}")]
  InvalidSelection(String),

  #[error("Invalid configuration: {0}")]
  Config(String),

  /// The session actor has stopped and no longer accepts commands.
  #[error("Session is not running")]
  SessionClosed,
}

