//! The processor contract shared by printers and counters, and the line sink
//! they write to.

use std::io::{self, Write};

use crate::error::ParseError;
use crate::types::Record;

/// Destination for report lines. Every `Write` is a sink; a newline is
/// appended to each line.
pub trait LineSink {
  fn write_line(&mut self, line: &str) -> io::Result<()>;
}

impl<W: Write> LineSink for W {
  fn write_line(&mut self, line: &str) -> io::Result<()> {
    writeln!(self, "{}", line)
  }
}

/// A consumer of parsed records. All hooks are driven by the runner, in
/// registration order; processors never call each other.
pub trait Processor {
  /// Short name used in logs.
  fn name(&self) -> &str;

  /// Consume one record. Returns whether the processor claimed it.
  fn process(&mut self, record: &Record, out: &mut dyn LineSink) -> io::Result<bool>;

  /// Called once for every line that failed to parse.
  fn parse_failed(&mut self, _error: &ParseError, _out: &mut dyn LineSink) -> io::Result<()> {
    Ok(())
  }

  /// Called once after the input is exhausted to emit the final report.
  fn postprocess(&mut self, out: &mut dyn LineSink) -> io::Result<()>;
}
