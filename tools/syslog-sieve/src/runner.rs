//! Single-pass driver: parse each line once, fan it out to every processor,
//! then let each processor report.

use std::borrow::Cow;
use std::io::BufRead;

use tracing::{debug, info};

use crate::error::SieveError;
use crate::parse::parse_line;
use crate::processor::{LineSink, Processor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
  Streaming,
  Done,
}

/// Line tallies for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
  pub lines: u64,
  pub blank: u64,
  pub parsed: u64,
  pub failed: u64,
}

/// Owns the processors for one invocation.
pub struct Runner {
  processors: Vec<Box<dyn Processor>>,
  state: RunState,
}

impl Default for Runner {
  fn default() -> Self {
    Self::new()
  }
}

impl Runner {
  pub fn new() -> Self {
    Self {
      processors: Vec::new(),
      state: RunState::Streaming,
    }
  }

  /// Register a processor. Dispatch follows registration order.
  pub fn register(&mut self, processor: impl Processor + 'static) -> &mut Self {
    self.processors.push(Box::new(processor));
    self
  }

  pub fn register_boxed(&mut self, processor: Box<dyn Processor>) -> &mut Self {
    self.processors.push(processor);
    self
  }

  pub fn state(&self) -> RunState {
    self.state
  }

  /// Consume `source` to the end, then run every processor's report.
  ///
  /// Lines are trimmed; blank lines are skipped. Bytes that are not UTF-8
  /// are replaced with U+FFFD. Lines that fail to parse go to `parse_failed`
  /// and never stop the run. Only I/O errors abort.
  pub fn run<R: BufRead>(
    &mut self,
    mut source: R,
    out: &mut dyn LineSink,
  ) -> Result<RunSummary, SieveError> {
    if self.state == RunState::Done {
      return Err(SieveError::AlreadyFinished);
    }

    let mut summary = RunSummary::default();
    let mut buf = Vec::new();
    loop {
      buf.clear();
      if source.read_until(b'\n', &mut buf)? == 0 {
        break;
      }
      summary.lines += 1;

      let line = String::from_utf8_lossy(&buf);
      if let Cow::Owned(_) = line {
        debug!(line = summary.lines, "invalid UTF-8 replaced");
      }

      let trimmed = line.trim();
      if trimmed.is_empty() {
        summary.blank += 1;
        continue;
      }

      match parse_line(trimmed) {
        Ok(record) => {
          summary.parsed += 1;
          for p in self.processors.iter_mut() {
            p.process(&record, out)?;
          }
        }
        Err(e) => {
          summary.failed += 1;
          debug!(line = summary.lines, error = %e, "parse failed");
          for p in self.processors.iter_mut() {
            p.parse_failed(&e, out)?;
          }
        }
      }
    }

    self.finish(out)?;
    info!(
      lines = summary.lines,
      parsed = summary.parsed,
      failed = summary.failed,
      blank = summary.blank,
      "run complete"
    );
    Ok(summary)
  }

  fn finish(&mut self, out: &mut dyn LineSink) -> Result<(), SieveError> {
    self.state = RunState::Done;
    for p in self.processors.iter_mut() {
      debug!(processor = p.name(), "postprocess");
      p.postprocess(out)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::ParseError;
  use crate::types::Record;
  use std::cell::RefCell;
  use std::io;
  use std::rc::Rc;

  /// Records every hook call into a shared journal.
  struct Spy {
    tag: &'static str,
    journal: Rc<RefCell<Vec<String>>>,
  }

  impl Processor for Spy {
    fn name(&self) -> &str {
      self.tag
    }

    fn process(&mut self, record: &Record, _out: &mut dyn LineSink) -> io::Result<bool> {
      self
        .journal
        .borrow_mut()
        .push(format!("{} process {}", self.tag, record.message));
      Ok(false)
    }

    fn parse_failed(&mut self, error: &ParseError, _out: &mut dyn LineSink) -> io::Result<()> {
      self
        .journal
        .borrow_mut()
        .push(format!("{} failed {}", self.tag, error.line()));
      Ok(())
    }

    fn postprocess(&mut self, _out: &mut dyn LineSink) -> io::Result<()> {
      self.journal.borrow_mut().push(format!("{} post", self.tag));
      Ok(())
    }
  }

  fn spies() -> (Runner, Rc<RefCell<Vec<String>>>) {
    let journal = Rc::new(RefCell::new(Vec::new()));
    let mut runner = Runner::new();
    runner.register(Spy {
      tag: "a",
      journal: Rc::clone(&journal),
    });
    runner.register(Spy {
      tag: "b",
      journal: Rc::clone(&journal),
    });
    (runner, journal)
  }

  #[test]
  fn dispatch_order_and_lifecycle() {
    let (mut runner, journal) = spies();
    let input = "\
2013-05-01T10:22:01Z h mail.info exim[1]: one

   \t
garbage not a log line
2013-05-01T10:22:02Z h mail.info exim[1]: two
";
    let mut out: Vec<u8> = Vec::new();
    let summary = runner.run(input.as_bytes(), &mut out).unwrap();

    assert_eq!(
      *journal.borrow(),
      vec![
        "a process one",
        "b process one",
        "a failed garbage not a log line",
        "b failed garbage not a log line",
        "a process two",
        "b process two",
        "a post",
        "b post",
      ]
    );
    assert_eq!(
      summary,
      RunSummary {
        lines: 5,
        blank: 2,
        parsed: 2,
        failed: 1,
      }
    );
    assert_eq!(runner.state(), RunState::Done);
  }

  #[test]
  fn lines_are_trimmed_before_parsing() {
    let (mut runner, journal) = spies();
    let input = "   2013-05-01T10:22:01Z h mail.info exim[1]: padded   \n";
    runner.run(input.as_bytes(), &mut Vec::<u8>::new()).unwrap();
    assert_eq!(journal.borrow()[0], "a process padded");
  }

  #[test]
  fn empty_input_still_reports() {
    let (mut runner, journal) = spies();
    let summary = runner.run(&b""[..], &mut Vec::<u8>::new()).unwrap();
    assert_eq!(summary, RunSummary::default());
    assert_eq!(*journal.borrow(), vec!["a post", "b post"]);
  }

  #[test]
  fn undecodable_bytes_do_not_stop_the_run() {
    let (mut runner, journal) = spies();
    let mut input = b"2013-05-01T10:22:01Z h mail.info exim[1]: one\n".to_vec();
    input.extend_from_slice(b"caf\xe9\n");
    input.extend_from_slice(b"2013-05-01T10:22:02Z h mail.info exim[1]: caf\xe9 two\n");
    let summary = runner.run(&input[..], &mut Vec::<u8>::new()).unwrap();

    assert_eq!(
      *journal.borrow(),
      vec![
        "a process one",
        "b process one",
        "a failed caf\u{fffd}",
        "b failed caf\u{fffd}",
        "a process caf\u{fffd} two",
        "b process caf\u{fffd} two",
        "a post",
        "b post",
      ]
    );
    assert_eq!(summary.parsed, 2);
    assert_eq!(summary.failed, 1);
  }

  #[test]
  fn second_run_is_rejected() {
    let (mut runner, journal) = spies();
    runner.run(&b""[..], &mut Vec::<u8>::new()).unwrap();
    let err = runner.run(&b""[..], &mut Vec::<u8>::new()).unwrap_err();
    assert!(matches!(err, SieveError::AlreadyFinished));
    assert_eq!(journal.borrow().len(), 2);
  }
}
