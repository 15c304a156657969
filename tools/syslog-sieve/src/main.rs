//! Binary entrypoint: load a rule set, stream log lines from stdin (or a
//! file), write reports to stdout.
//!
//! Lines that fail to parse never change the exit status. A rule set that
//! fails to load or compile exits non-zero before any input is read.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use syslog_sieve::logging::init_logging;
use syslog_sieve::{Config, Runner};

#[derive(Debug, Parser)]
#[command(name = "syslog-sieve", version, about = "Filter and count structured syslog lines")]
struct Cli {
  /// JSON rule set describing the printers and counters to run
  #[arg(short, long)]
  rules: PathBuf,

  /// Read log lines from this file instead of stdin
  #[arg(short, long)]
  input: Option<PathBuf>,

  /// Make every printer report lines that fail to parse
  #[arg(long)]
  report_parse_failures: bool,

  /// Increase log verbosity on stderr (-v, -vv, -vvv)
  #[arg(short, long, action = clap::ArgAction::Count)]
  verbose: u8,
}

fn main() {
  let cli = Cli::parse();
  init_logging(cli.verbose);

  if let Err(e) = run(&cli) {
    let _ = writeln!(io::stderr(), "syslog-sieve: {}", e);
    process::exit(1);
  }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
  let mut config = Config::from_path(&cli.rules)?;
  if cli.report_parse_failures {
    config.report_parse_failures();
  }

  let mut runner = Runner::new();
  for processor in config.build()? {
    runner.register_boxed(processor);
  }

  let source: Box<dyn BufRead> = match &cli.input {
    Some(path) => Box::new(BufReader::new(File::open(path)?)),
    None => Box::new(io::stdin().lock()),
  };

  let stdout = io::stdout();
  let mut out = io::BufWriter::new(stdout.lock());
  runner.run(source, &mut out)?;
  out.flush()?;
  Ok(())
}
