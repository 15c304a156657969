//! Predicate algebra over Records.
//!
//! A [`Rule`] is an immutable predicate. Leaf rules come from typed field
//! accessors ([`HOST`], [`SEVERITY`], ...); composites come from [`all_of`],
//! [`any_of`], [`Rule::and`], [`Rule::or`] and [`Rule::negate`]. Composition
//! always builds a new Rule and leaves its inputs reusable. A Rule has no
//! conversion to `bool`; the only way to get a truth value is [`Rule::eval`].

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use regex::RegexSet;

use crate::error::RuleError;
use crate::types::{Record, Severity};

type Test = dyn Fn(&Record) -> bool + Send + Sync;

/// A pure predicate over a Record.
#[derive(Clone)]
pub struct Rule {
  label: Arc<str>,
  test: Arc<Test>,
}

impl Rule {
  /// Wrap an arbitrary predicate. `label` is what `Debug`/`Display` show.
  pub fn new<F>(label: impl Into<String>, test: F) -> Self
  where
    F: Fn(&Record) -> bool + Send + Sync + 'static,
  {
    Self {
      label: Arc::from(label.into()),
      test: Arc::new(test),
    }
  }

  pub fn eval(&self, record: &Record) -> bool {
    (self.test)(record)
  }

  pub fn label(&self) -> &str {
    &self.label
  }

  pub fn and(&self, other: &Rule) -> Rule {
    all_of([self.clone(), other.clone()])
  }

  pub fn or(&self, other: &Rule) -> Rule {
    any_of([self.clone(), other.clone()])
  }

  pub fn negate(&self) -> Rule {
    let inner = self.clone();
    Rule::new(format!("!({})", inner.label), move |r| !inner.eval(r))
  }
}

impl fmt::Debug for Rule {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("Rule").field(&self.label).finish()
  }
}

impl fmt::Display for Rule {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.label)
  }
}

/// True iff every rule holds, evaluated left to right and stopping at the
/// first failure. An empty list is true.
pub fn all_of(rules: impl IntoIterator<Item = Rule>) -> Rule {
  let rules: Vec<Rule> = rules.into_iter().collect();
  let label = join_labels(&rules, " & ", "true");
  Rule::new(label, move |r| rules.iter().all(|rule| rule.eval(r)))
}

/// True iff any rule holds, evaluated left to right and stopping at the
/// first success. An empty list is false.
pub fn any_of(rules: impl IntoIterator<Item = Rule>) -> Rule {
  let rules: Vec<Rule> = rules.into_iter().collect();
  let label = join_labels(&rules, " | ", "false");
  Rule::new(label, move |r| rules.iter().any(|rule| rule.eval(r)))
}

pub fn not(rule: &Rule) -> Rule {
  rule.negate()
}

fn join_labels(rules: &[Rule], sep: &str, empty: &str) -> String {
  match rules {
    [] => empty.to_string(),
    [only] => only.label.to_string(),
    _ => {
      let parts: Vec<String> = rules.iter().map(|r| format!("({})", r.label)).collect();
      parts.join(sep)
    }
  }
}

// ---------------------------------------------------------------------------
// Text fields
// ---------------------------------------------------------------------------

/// Accessor for a string-valued Record attribute. Absent optional values
/// read as `""`.
#[derive(Clone, Copy)]
pub struct TextField {
  name: &'static str,
  get: fn(&Record) -> &str,
}

fn host(r: &Record) -> &str {
  &r.host
}

fn facility(r: &Record) -> &str {
  &r.facility
}

fn program(r: &Record) -> &str {
  r.program()
}

fn pid(r: &Record) -> &str {
  r.pid()
}

fn message(r: &Record) -> &str {
  &r.message
}

pub const HOST: TextField = TextField::new("host", host);
pub const FACILITY: TextField = TextField::new("facility", facility);
pub const PROGRAM: TextField = TextField::new("program", program);
pub const PID: TextField = TextField::new("pid", pid);
pub const MESSAGE: TextField = TextField::new("message", message);

impl TextField {
  pub const fn new(name: &'static str, get: fn(&Record) -> &str) -> Self {
    Self { name, get }
  }

  pub fn name(&self) -> &'static str {
    self.name
  }

  pub fn value<'a>(&self, record: &'a Record) -> &'a str {
    (self.get)(record)
  }

  pub fn eq(&self, value: impl Into<String>) -> Rule {
    let value = value.into();
    let get = self.get;
    Rule::new(format!("{} == {:?}", self.name, value), move |r| get(r) == value)
  }

  pub fn ne(&self, value: impl Into<String>) -> Rule {
    let value = value.into();
    let get = self.get;
    Rule::new(format!("{} != {:?}", self.name, value), move |r| get(r) != value)
  }

  /// Membership: true iff the value equals any of `values`.
  pub fn one_of<I, S>(&self, values: I) -> Rule
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let values: Vec<String> = values.into_iter().map(Into::into).collect();
    let get = self.get;
    Rule::new(format!("{} in {:?}", self.name, values), move |r| {
      let v = get(r);
      values.iter().any(|candidate| candidate == v)
    })
  }

  /// True iff any pattern matches at the start of the value. Patterns are not
  /// implicitly anchored at the end; use `$` for a whole-value match.
  pub fn matches<I, S>(&self, patterns: I) -> Result<Rule, RuleError>
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let patterns: Vec<String> = patterns.into_iter().map(|p| p.as_ref().to_string()).collect();
    let anchored: Vec<String> = patterns.iter().map(|p| format!("^(?:{})", p)).collect();
    let set = RegexSet::new(&anchored).map_err(|source| {
      // RegexSet reports one error for the whole set; find the culprit.
      let pattern = patterns
        .iter()
        .zip(&anchored)
        .find(|(_, a)| regex::Regex::new(a).is_err())
        .map(|(p, _)| p.clone())
        .unwrap_or_else(|| patterns.join(", "));
      RuleError::Pattern { pattern, source }
    })?;
    let get = self.get;
    Ok(Rule::new(
      format!("{} =~ {:?}", self.name, patterns),
      move |r| set.is_match(get(r)),
    ))
  }

  /// True iff the value contains any of `needles` as a literal substring.
  pub fn contains<I, S>(&self, needles: I) -> Rule
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let needles: Vec<String> = needles.into_iter().map(Into::into).collect();
    let get = self.get;
    Rule::new(format!("{} contains {:?}", self.name, needles), move |r| {
      let v = get(r);
      needles.iter().any(|n| v.contains(n.as_str()))
    })
  }

  pub fn lt(&self, value: impl Into<String>) -> Rule {
    self.ordered("<", value.into(), Ordering::is_lt)
  }

  pub fn le(&self, value: impl Into<String>) -> Rule {
    self.ordered("<=", value.into(), Ordering::is_le)
  }

  pub fn gt(&self, value: impl Into<String>) -> Rule {
    self.ordered(">", value.into(), Ordering::is_gt)
  }

  pub fn ge(&self, value: impl Into<String>) -> Rule {
    self.ordered(">=", value.into(), Ordering::is_ge)
  }

  fn ordered(&self, op: &str, value: String, accept: fn(Ordering) -> bool) -> Rule {
    let get = self.get;
    Rule::new(format!("{} {} {:?}", self.name, op, value), move |r| {
      accept(compare_text(get(r), &value))
    })
  }
}

/// Numeric when both sides are integers (pids), lexical otherwise.
fn compare_text(a: &str, b: &str) -> Ordering {
  match (a.parse::<i64>(), b.parse::<i64>()) {
    (Ok(x), Ok(y)) => x.cmp(&y),
    _ => a.cmp(b),
  }
}

// ---------------------------------------------------------------------------
// Ordered fields (severity, time)
// ---------------------------------------------------------------------------

/// Accessor for a Record attribute with its own ordering.
pub struct OrdField<T> {
  name: &'static str,
  get: fn(&Record) -> &T,
}

impl<T> Clone for OrdField<T> {
  fn clone(&self) -> Self {
    *self
  }
}

impl<T> Copy for OrdField<T> {}

fn severity(r: &Record) -> &Severity {
  &r.severity
}

fn time(r: &Record) -> &DateTime<FixedOffset> {
  &r.time
}

/// Compared by urgency: `SEVERITY.ge(Severity::Warning)` holds for warning,
/// err, crit, alert and emerg.
pub const SEVERITY: OrdField<Severity> = OrdField::new("severity", severity);
pub const TIME: OrdField<DateTime<FixedOffset>> = OrdField::new("time", time);

impl<T> OrdField<T>
where
  T: Ord + fmt::Display + Send + Sync + 'static,
{
  pub const fn new(name: &'static str, get: fn(&Record) -> &T) -> Self {
    Self { name, get }
  }

  pub fn name(&self) -> &'static str {
    self.name
  }

  pub fn eq(&self, value: T) -> Rule {
    self.ordered("==", value, Ordering::is_eq)
  }

  pub fn ne(&self, value: T) -> Rule {
    self.ordered("!=", value, Ordering::is_ne)
  }

  pub fn lt(&self, value: T) -> Rule {
    self.ordered("<", value, Ordering::is_lt)
  }

  pub fn le(&self, value: T) -> Rule {
    self.ordered("<=", value, Ordering::is_le)
  }

  pub fn gt(&self, value: T) -> Rule {
    self.ordered(">", value, Ordering::is_gt)
  }

  pub fn ge(&self, value: T) -> Rule {
    self.ordered(">=", value, Ordering::is_ge)
  }

  pub fn one_of(&self, values: impl IntoIterator<Item = T>) -> Rule {
    let values: Vec<T> = values.into_iter().collect();
    let shown: Vec<String> = values.iter().map(ToString::to_string).collect();
    let get = self.get;
    Rule::new(format!("{} in [{}]", self.name, shown.join(", ")), move |r| {
      values.contains(get(r))
    })
  }

  fn ordered(&self, op: &str, value: T, accept: fn(Ordering) -> bool) -> Rule {
    let get = self.get;
    Rule::new(format!("{} {} {}", self.name, op, value), move |r| {
      accept(get(r).cmp(&value))
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::parse::parse_line;
  use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

  fn record(line: &str) -> Record {
    parse_line(line).unwrap()
  }

  fn exim() -> Record {
    record("2013-05-01T10:22:01Z mailhost mail.notice exim[1234]: Unrouteable address to foo")
  }

  #[test]
  fn scalar_equality() {
    let r = exim();
    assert!(PROGRAM.eq("exim").eval(&r));
    assert!(!PROGRAM.eq("exi").eval(&r));
    assert!(PROGRAM.ne("sudo").eval(&r));
    assert!(SEVERITY.eq(Severity::Notice).eval(&r));
    assert!(!SEVERITY.eq(Severity::Info).eval(&r));
  }

  #[test]
  fn membership_equality() {
    let r = exim();
    assert!(PROGRAM.one_of(["CRON", "exim", "kernel"]).eval(&r));
    assert!(!PROGRAM.one_of(["CRON", "kernel"]).eval(&r));
    assert!(!PROGRAM.one_of(Vec::<String>::new()).eval(&r));
    assert!(SEVERITY.one_of([Severity::Info, Severity::Notice]).eval(&r));
  }

  #[test]
  fn matches_is_anchored_at_start_only() {
    let r = exim();
    assert!(MESSAGE.matches(["Unrouteable"]).unwrap().eval(&r));
    assert!(!MESSAGE.matches(["address"]).unwrap().eval(&r));
    assert!(MESSAGE.matches([".*address"]).unwrap().eval(&r));
    assert!(!MESSAGE.matches([".*Unrouteable address$"]).unwrap().eval(&r));
    assert!(MESSAGE.matches([".*to foo$"]).unwrap().eval(&r));
  }

  #[test]
  fn matches_any_pattern() {
    let r = exim();
    let rule = MESSAGE.matches(["Power failure\\.", "Unrouteable"]).unwrap();
    assert!(rule.eval(&r));
  }

  #[test]
  fn bad_pattern_is_an_error() {
    let err = MESSAGE.matches(["ok", "broken("]).unwrap_err();
    match err {
      RuleError::Pattern { pattern, .. } => assert_eq!(pattern, "broken("),
      other => panic!("unexpected {:?}", other),
    }
  }

  #[test]
  fn contains_any_substring() {
    let r = exim();
    assert!(MESSAGE.contains(["nope", "address to"]).eval(&r));
    assert!(!MESSAGE.contains(["syntactically invalid argument"]).eval(&r));
  }

  #[test]
  fn absent_program_reads_as_empty() {
    let r = record("2013-05-01T10:22:01Z hc-router kern.info []: up");
    assert!(PROGRAM.eq("").eval(&r));
    assert!(!PROGRAM.contains(["x"]).eval(&r));
  }

  #[test]
  fn severity_ordering_is_by_urgency() {
    let r = exim();
    assert!(SEVERITY.ge(Severity::Info).eval(&r));
    assert!(SEVERITY.le(Severity::Warning).eval(&r));
    assert!(!SEVERITY.gt(Severity::Notice).eval(&r));
    assert!(SEVERITY.lt(Severity::Err).eval(&r));
  }

  #[test]
  fn pid_orders_numerically() {
    let r = exim();
    assert!(PID.gt("999").eval(&r));
    assert!(PID.lt("10000").eval(&r));
    assert!(PID.ge("1234").eval(&r));
  }

  #[test]
  fn time_ordering() {
    let r = exim();
    let cutoff = crate::parse::parse_timestamp("2013-05-01T00:00:00Z").unwrap();
    assert!(TIME.gt(cutoff).eval(&r));
    assert!(!TIME.le(cutoff).eval(&r));
  }

  #[test]
  fn composition_leaves_inputs_reusable() {
    let r = exim();
    let is_exim = PROGRAM.eq("exim");
    let is_notice = SEVERITY.eq(Severity::Notice);
    let both = is_exim.and(&is_notice);
    let either = is_exim.or(&SEVERITY.eq(Severity::Debug));
    let neither = both.negate();
    assert!(both.eval(&r));
    assert!(either.eval(&r));
    assert!(!neither.eval(&r));
    assert!(is_exim.eval(&r));
    assert!(not(&is_notice).negate().eval(&r));
  }

  #[test]
  fn empty_lists() {
    let r = exim();
    assert!(all_of(Vec::new()).eval(&r));
    assert!(!any_of(Vec::new()).eval(&r));
  }

  #[test]
  fn evaluation_short_circuits_left_to_right() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = {
      let calls = Arc::clone(&calls);
      Rule::new("counted", move |_| {
        calls.fetch_add(1, AtomicOrdering::SeqCst);
        true
      })
    };
    let r = exim();

    assert!(!all_of([PROGRAM.eq("sudo"), counted.clone()]).eval(&r));
    assert!(any_of([PROGRAM.eq("exim"), counted.clone()]).eval(&r));
    assert_eq!(calls.load(AtomicOrdering::SeqCst), 0);

    assert!(all_of([PROGRAM.eq("exim"), counted]).eval(&r));
    assert_eq!(calls.load(AtomicOrdering::SeqCst), 1);
  }

  #[test]
  fn labels_describe_the_rule() {
    let rule = PROGRAM.eq("exim").and(&SEVERITY.eq(Severity::Notice));
    assert_eq!(rule.to_string(), "(program == \"exim\") & (severity == notice)");
    assert_eq!(format!("{:?}", PROGRAM.eq("x")), "Rule(\"program == \\\"x\\\"\")");
  }
}
