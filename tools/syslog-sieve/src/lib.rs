//! Syslog Sieve: single-pass filtering and counting of structured log lines.
//!
//! Each line is parsed into a [`Record`], then offered to every registered
//! [`Processor`] in order. [`Printer`]s echo what their discard rules do not
//! claim; [`Counter`]s tally records into named buckets and report once the
//! input is exhausted. Rules are built from typed field accessors in [`rule`].
//!
//! ```
//! use syslog_sieve::rule::{MESSAGE, PROGRAM};
//! use syslog_sieve::{Counter, Runner};
//!
//! let mut counter = Counter::new("exim notices");
//! counter.require([PROGRAM.eq("exim")]);
//! counter.count_above("unrouteable address", MESSAGE.matches([".*Unrouteable address$"]).unwrap(), 0);
//!
//! let mut runner = Runner::new();
//! runner.register(counter);
//!
//! let input = "2013-05-01T10:22:01+00:00 mailhost mail.notice exim[1]: Unrouteable address\n";
//! let mut out: Vec<u8> = Vec::new();
//! runner.run(input.as_bytes(), &mut out).unwrap();
//! assert_eq!(String::from_utf8(out).unwrap(), "exim notices\n  1 unrouteable address\n\n");
//! ```

pub mod config;
pub mod counter;
pub mod error;
pub mod logging;
pub mod parse;
pub mod printer;
pub mod processor;
pub mod rule;
pub mod runner;
pub mod types;

pub use config::Config;
pub use counter::{Counter, CounterOptions};
pub use error::{ConfigError, ParseError, RuleError, SieveError};
pub use parse::parse_line;
pub use printer::{PrintFormat, Printer};
pub use processor::{LineSink, Processor};
pub use rule::Rule;
pub use runner::{RunSummary, Runner};
pub use types::{Record, Severity};
