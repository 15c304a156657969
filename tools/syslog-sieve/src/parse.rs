//! Parse raw log lines into Records.
//!
//! Grammar (whitespace between tokens as shown):
//! ```text
//! <timestamp> <hostname> <facility>.<severity> [<program>][<pid>]: <message>
//! ```
//!
//! The timestamp is any non-blank token; [`parse_timestamp`] decides whether
//! it is a time. Blanks between the program and `[` are tolerated.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ParseError;
use crate::types::{Record, Severity};

static GRAMMAR: Lazy<Regex> = Lazy::new(|| {
  Regex::new(concat!(
    r"^(?P<time>\S+)\s+",
    r"(?P<host>[A-Za-z0-9\-]+)\s+",
    r"(?P<facility>[A-Za-z0-9]+)\.(?P<severity>[A-Za-z]+)\s*",
    r"(?P<program>[A-Za-z0-9_.\-]*)\s*\[(?P<pid>[0-9\-]*)\]:\s*",
    r"(?P<message>.*)$",
  ))
  .expect("record grammar is a valid regex")
});

/// Offset-bearing layouts, tried after RFC 3339.
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%dT%H:%M:%S%.f%z"];

/// Layouts without an offset; read as UTC.
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// Parse one trimmed, non-blank line.
///
/// A line that fails the grammar, or whose timestamp is not a calendar time,
/// is a `Mismatch`; a well-formed line with a severity outside the fixed
/// vocabulary is an `InvalidSeverity`. Both carry the raw line.
pub fn parse_line(line: &str) -> Result<Record, ParseError> {
  let caps = GRAMMAR
    .captures(line)
    .ok_or_else(|| ParseError::mismatch(line))?;

  let time = parse_timestamp(&caps["time"]).ok_or_else(|| ParseError::mismatch(line))?;

  let token = &caps["severity"];
  let severity: Severity = token.parse().map_err(|_| ParseError::InvalidSeverity {
    token: token.to_string(),
    line: line.to_string(),
  })?;

  Ok(Record {
    time,
    host: caps["host"].to_string(),
    facility: caps["facility"].to_string(),
    severity,
    program: non_empty(&caps["program"]),
    pid: non_empty(&caps["pid"]),
    message: caps["message"].to_string(),
    raw: line.to_string(),
  })
}

/// Parse a timestamp token in any of the accepted layouts.
pub fn parse_timestamp(token: &str) -> Option<DateTime<FixedOffset>> {
  if let Ok(t) = DateTime::parse_from_rfc3339(token) {
    return Some(t);
  }
  if let Some(t) = OFFSET_FORMATS
    .iter()
    .find_map(|fmt| DateTime::parse_from_str(token, fmt).ok())
  {
    return Some(t);
  }

  let naive = NAIVE_FORMATS
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(token, fmt).ok())
    .or_else(|| {
      NaiveDate::parse_from_str(token, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    })?;

  FixedOffset::east_opt(0).map(|utc| utc.from_utc_datetime(&naive))
}

fn non_empty(s: &str) -> Option<String> {
  if s.is_empty() {
    None
  } else {
    Some(s.to_string())
  }
}
