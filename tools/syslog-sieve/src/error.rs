//! Structured error types for the sieve.

use std::io;

use thiserror::Error;

/// A line that could not be turned into a Record. Always recoverable: the
/// runner hands it to every processor's `parse_failed` and moves on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
  #[error("line does not match grammar: {line}")]
  Mismatch { line: String },

  #[error("unknown severity level '{token}': {line}")]
  InvalidSeverity { token: String, line: String },
}

impl ParseError {
  pub fn mismatch(line: impl Into<String>) -> Self {
    Self::Mismatch { line: line.into() }
  }

  /// The raw line that failed to parse.
  pub fn line(&self) -> &str {
    match self {
      Self::Mismatch { line } | Self::InvalidSeverity { line, .. } => line,
    }
  }
}

/// A severity token outside `emerg alert crit err warning notice info debug`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown severity level '{0}'")]
pub struct UnknownSeverity(pub String);

/// Defects in a rule set. Never recovered from.
#[derive(Debug, Error)]
pub enum RuleError {
  #[error("invalid pattern '{pattern}': {source}")]
  Pattern {
    pattern: String,
    #[source]
    source: regex::Error,
  },

  #[error("field '{field}' does not support '{op}'")]
  TypeMisuse { field: &'static str, op: String },

  #[error("field '{field}': {reason}")]
  Value { field: &'static str, reason: String },
}

impl RuleError {
  pub fn type_misuse(field: &'static str, op: &str) -> Self {
    Self::TypeMisuse {
      field,
      op: op.to_string(),
    }
  }

  pub fn value(field: &'static str, reason: impl Into<String>) -> Self {
    Self::Value {
      field,
      reason: reason.into(),
    }
  }
}

/// Failures loading or compiling a rule-set document.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("read {path}: {source}")]
  Io {
    path: String,
    #[source]
    source: io::Error,
  },

  #[error("json: {0}")]
  Json(#[from] serde_json::Error),

  #[error("rule: {0}")]
  Rule(#[from] RuleError),

  #[error("configuration defines no processors")]
  Empty,
}

/// Failures of a stream run. Per-line data errors never surface here.
#[derive(Debug, Error)]
pub enum SieveError {
  #[error("io: {0}")]
  Io(#[from] io::Error),

  #[error("runner already finished; processors report once")]
  AlreadyFinished,
}
