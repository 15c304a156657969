//! Counter: tally records into named buckets, first matching rule wins.
//!
//! Preconditions gate participation: a record failing any of them is
//! invisible to the counter. A record that passes lands in exactly one place,
//! either the first bucket whose rule matches or the "other" bucket.

use std::collections::{HashMap, HashSet, VecDeque};
use std::io;

use tracing::trace;

use crate::processor::{LineSink, Processor};
use crate::rule::Rule;
use crate::types::Record;

/// Reporting and retention knobs for a Counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterOptions {
  /// Include the "other" bucket in the report.
  pub report_other: bool,
  /// Keep unmatched records so the report can list them.
  pub retain_other: bool,
  /// Report buckets (and "other") whose count is zero.
  pub report_zero: bool,
  /// Keep at most this many unmatched records, dropping the oldest.
  /// `None` keeps everything.
  pub other_limit: Option<usize>,
}

impl Default for CounterOptions {
  fn default() -> Self {
    Self {
      report_other: true,
      retain_other: true,
      report_zero: false,
      other_limit: None,
    }
  }
}

/// One classification rule. Several buckets may share a name and so add to
/// the same count.
#[derive(Debug, Clone)]
pub struct Bucket {
  pub name: String,
  pub rule: Rule,
  /// Counts at or below this are hidden from the report.
  pub threshold: Option<u64>,
}

#[derive(Debug)]
pub struct Counter {
  title: String,
  require: Vec<Rule>,
  buckets: Vec<Bucket>,
  counts: HashMap<String, u64>,
  other_count: u64,
  other: VecDeque<Record>,
  other_dropped: u64,
  options: CounterOptions,
}

impl Counter {
  pub fn new(title: impl Into<String>) -> Self {
    Self::with_options(title, CounterOptions::default())
  }

  pub fn with_options(title: impl Into<String>, options: CounterOptions) -> Self {
    Self {
      title: title.into(),
      require: Vec::new(),
      buckets: Vec::new(),
      counts: HashMap::new(),
      other_count: 0,
      other: VecDeque::new(),
      other_dropped: 0,
      options,
    }
  }

  /// Add preconditions. Every one must hold for a record to be counted.
  pub fn require(&mut self, rules: impl IntoIterator<Item = Rule>) -> &mut Self {
    self.require.extend(rules);
    self
  }

  /// Add a bucket with no threshold.
  pub fn count(&mut self, name: impl Into<String>, rule: Rule) -> &mut Self {
    self.bucket(name, rule, None)
  }

  /// Add a bucket that only shows up in the report once its count exceeds
  /// `threshold`.
  pub fn count_above(&mut self, name: impl Into<String>, rule: Rule, threshold: u64) -> &mut Self {
    self.bucket(name, rule, Some(threshold))
  }

  pub fn bucket(
    &mut self,
    name: impl Into<String>,
    rule: Rule,
    threshold: Option<u64>,
  ) -> &mut Self {
    self.buckets.push(Bucket {
      name: name.into(),
      rule,
      threshold,
    });
    self
  }

  /// Current count for a bucket name (0 if never hit).
  pub fn get(&self, name: &str) -> u64 {
    self.counts.get(name).copied().unwrap_or(0)
  }

  pub fn other_count(&self) -> u64 {
    self.other_count
  }

  /// Unmatched records still retained, oldest first.
  pub fn other_records(&self) -> impl Iterator<Item = &Record> {
    self.other.iter()
  }

  /// Sum of every named bucket plus "other".
  pub fn total(&self) -> u64 {
    self.counts.values().sum::<u64>() + self.other_count
  }

  fn passes_preconditions(&self, record: &Record) -> bool {
    self.require.iter().all(|rule| rule.eval(record))
  }

  fn retain_other(&mut self, record: &Record) {
    if !self.options.retain_other {
      return;
    }
    if self.options.other_limit == Some(0) {
      self.other_dropped += 1;
      return;
    }
    self.other.push_back(record.clone());
    if let Some(limit) = self.options.other_limit {
      while self.other.len() > limit {
        self.other.pop_front();
        self.other_dropped += 1;
      }
    }
  }

  /// The report lines, without the trailing separator. Empty when nothing
  /// survives the thresholds.
  pub fn report(&self) -> Vec<String> {
    let mut lines = Vec::new();
    let mut seen = HashSet::new();

    for bucket in &self.buckets {
      // A shared name is reported once, under its first declaration.
      if !seen.insert(bucket.name.as_str()) {
        continue;
      }
      let count = self.get(&bucket.name);
      if bucket.threshold.is_some_and(|t| count <= t) {
        continue;
      }
      if count == 0 && !self.options.report_zero {
        continue;
      }
      lines.push(format!("  {} {}", count, bucket.name));
    }

    if self.options.report_other && (self.other_count > 0 || self.options.report_zero) {
      lines.push(format!("  {} other", self.other_count));
      for r in &self.other {
        lines.push(format!("    {} {}: {}", r.host, r.program(), r.message));
      }
      if self.other_dropped > 0 {
        lines.push(format!("    ({} earlier unmatched lines not kept)", self.other_dropped));
      }
    }

    if !lines.is_empty() {
      lines.insert(0, self.title.clone());
    }
    lines
  }
}

impl Processor for Counter {
  fn name(&self) -> &str {
    &self.title
  }

  fn process(&mut self, record: &Record, _out: &mut dyn LineSink) -> io::Result<bool> {
    if !self.passes_preconditions(record) {
      return Ok(false);
    }

    let hit = self
      .buckets
      .iter()
      .find(|bucket| bucket.rule.eval(record))
      .map(|bucket| bucket.name.clone());

    match hit {
      Some(name) => {
        trace!(counter = %self.title, bucket = %name, "counted");
        *self.counts.entry(name).or_insert(0) += 1;
        Ok(true)
      }
      None => {
        self.other_count += 1;
        self.retain_other(record);
        Ok(false)
      }
    }
  }

  fn postprocess(&mut self, out: &mut dyn LineSink) -> io::Result<()> {
    let lines = self.report();
    if lines.is_empty() {
      return Ok(());
    }
    for line in &lines {
      out.write_line(line)?;
    }
    out.write_line("")
  }
}
