//! Printer: echo every record that no discard rule claims.

use std::io;

use serde::Deserialize;
use tracing::trace;

use crate::error::ParseError;
use crate::processor::{LineSink, Processor};
use crate::rule::Rule;
use crate::types::Record;

/// Marker prefixed to unparseable lines when failure reporting is on.
pub const PARSE_FAILURE_MARKER: &str = "PARSE FAILURE:";

/// How a surviving record is printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrintFormat {
  /// The line exactly as read.
  #[default]
  Raw,
  /// `host program message`.
  Fields,
}

#[derive(Debug)]
pub struct Printer {
  name: String,
  discard: Vec<Rule>,
  format: PrintFormat,
  report_parse_failures: bool,
}

impl Default for Printer {
  fn default() -> Self {
    Self::new("printer")
  }
}

impl Printer {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      discard: Vec::new(),
      format: PrintFormat::default(),
      report_parse_failures: false,
    }
  }

  /// Append discard rules. Rules are checked in the order they were added.
  pub fn discard(&mut self, rules: impl IntoIterator<Item = Rule>) -> &mut Self {
    self.discard.extend(rules);
    self
  }

  pub fn with_format(mut self, format: PrintFormat) -> Self {
    self.format = format;
    self
  }

  pub fn report_parse_failures(mut self, enabled: bool) -> Self {
    self.report_parse_failures = enabled;
    self
  }

  /// The first discard rule that matches, if any.
  pub fn discarded_by(&self, record: &Record) -> Option<&Rule> {
    self.discard.iter().find(|rule| rule.eval(record))
  }

  fn render(&self, record: &Record) -> String {
    match self.format {
      PrintFormat::Raw => record.raw.clone(),
      PrintFormat::Fields => format!("{} {} {}", record.host, record.program(), record.message),
    }
  }
}

impl Processor for Printer {
  fn name(&self) -> &str {
    &self.name
  }

  fn process(&mut self, record: &Record, out: &mut dyn LineSink) -> io::Result<bool> {
    if let Some(rule) = self.discarded_by(record) {
      trace!(printer = %self.name, rule = %rule, "discarded");
      return Ok(true);
    }
    out.write_line(&self.render(record))?;
    Ok(false)
  }

  fn parse_failed(&mut self, error: &ParseError, out: &mut dyn LineSink) -> io::Result<()> {
    if self.report_parse_failures {
      out.write_line(&format!("{} {}", PARSE_FAILURE_MARKER, error.line()))?;
    }
    Ok(())
  }

  fn postprocess(&mut self, _out: &mut dyn LineSink) -> io::Result<()> {
    Ok(())
  }
}
