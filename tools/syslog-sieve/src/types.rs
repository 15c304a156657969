//! Core types: the severity scale and the parsed Record.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::error::UnknownSeverity;

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Syslog severity. Ordering is by urgency, the reverse of the numeric level:
/// `Emerg > Alert > ... > Debug`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Severity {
  Emerg,
  Alert,
  Crit,
  Err,
  Warning,
  Notice,
  Info,
  Debug,
}

impl Severity {
  pub const ALL: [Severity; 8] = [
    Self::Emerg,
    Self::Alert,
    Self::Crit,
    Self::Err,
    Self::Warning,
    Self::Notice,
    Self::Info,
    Self::Debug,
  ];

  /// Numeric syslog level, 0 (emerg) through 7 (debug).
  pub fn rank(self) -> u8 {
    self as u8
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Emerg => "emerg",
      Self::Alert => "alert",
      Self::Crit => "crit",
      Self::Err => "err",
      Self::Warning => "warning",
      Self::Notice => "notice",
      Self::Info => "info",
      Self::Debug => "debug",
    }
  }
}

impl Ord for Severity {
  fn cmp(&self, other: &Self) -> Ordering {
    other.rank().cmp(&self.rank())
  }
}

impl PartialOrd for Severity {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl FromStr for Severity {
  type Err = UnknownSeverity;

  fn from_str(s: &str) -> Result<Self, UnknownSeverity> {
    Self::ALL
      .into_iter()
      .find(|level| level.as_str() == s)
      .ok_or_else(|| UnknownSeverity(s.to_string()))
  }
}

impl TryFrom<String> for Severity {
  type Error = UnknownSeverity;

  fn try_from(s: String) -> Result<Self, UnknownSeverity> {
    s.parse()
  }
}

impl From<Severity> for String {
  fn from(s: Severity) -> Self {
    s.as_str().to_string()
  }
}

impl fmt::Display for Severity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One parsed log line. Processors only ever see it by shared reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
  pub time: DateTime<FixedOffset>,
  pub host: String,
  pub facility: String,
  pub severity: Severity,
  pub program: Option<String>,
  pub pid: Option<String>,
  pub message: String,
  /// The line exactly as it was parsed.
  pub raw: String,
}

impl Record {
  /// Program name, or `""` when the line carried none.
  pub fn program(&self) -> &str {
    self.program.as_deref().unwrap_or("")
  }

  /// Pid, or `""` when the line carried none.
  pub fn pid(&self) -> &str {
    self.pid.as_deref().unwrap_or("")
  }
}
