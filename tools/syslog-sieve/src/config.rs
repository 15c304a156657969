//! Rule-set configuration: a JSON document describing the processors to run.
//!
//! Everything is validated and compiled up front, so a defective rule set
//! fails before the first input line is read.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::counter::{Counter, CounterOptions};
use crate::error::{ConfigError, RuleError, UnknownSeverity};
use crate::parse::parse_timestamp;
use crate::printer::{PrintFormat, Printer};
use crate::processor::Processor;
use crate::rule::{self, Rule, TextField, FACILITY, HOST, MESSAGE, PID, PROGRAM, SEVERITY, TIME};
use crate::types::Severity;

/// Top-level document.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
  pub processors: Vec<ProcessorConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProcessorConfig {
  Printer {
    #[serde(default = "default_printer_name")]
    name: String,
    #[serde(default)]
    discard: Vec<RuleSpec>,
    #[serde(default)]
    format: PrintFormat,
    #[serde(default)]
    report_parse_failures: bool,
  },
  Counter {
    title: String,
    #[serde(default)]
    require: Vec<RuleSpec>,
    #[serde(default)]
    buckets: Vec<BucketConfig>,
    #[serde(default = "yes")]
    report_other: bool,
    #[serde(default = "yes")]
    retain_other: bool,
    #[serde(default)]
    report_zero: bool,
    #[serde(default)]
    other_limit: Option<usize>,
  },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BucketConfig {
  pub name: String,
  pub rule: RuleSpec,
  #[serde(default)]
  pub threshold: Option<u64>,
}

fn default_printer_name() -> String {
  "printer".to_string()
}

fn yes() -> bool {
  true
}

/// Record attributes addressable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldName {
  Time,
  Host,
  Facility,
  Severity,
  Program,
  Pid,
  Message,
}

impl FieldName {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Time => "time",
      Self::Host => "host",
      Self::Facility => "facility",
      Self::Severity => "severity",
      Self::Program => "program",
      Self::Pid => "pid",
      Self::Message => "message",
    }
  }

  fn text(self) -> Option<TextField> {
    match self {
      Self::Host => Some(HOST),
      Self::Facility => Some(FACILITY),
      Self::Program => Some(PROGRAM),
      Self::Pid => Some(PID),
      Self::Message => Some(MESSAGE),
      Self::Time | Self::Severity => None,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Comparison {
  pub field: FieldName,
  pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Membership {
  pub field: FieldName,
  pub values: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatternMatch {
  pub field: FieldName,
  pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Substring {
  pub field: FieldName,
  pub needles: Vec<String>,
}

/// Serialized form of a [`Rule`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSpec {
  All(Vec<RuleSpec>),
  Any(Vec<RuleSpec>),
  Not(Box<RuleSpec>),
  Eq(Comparison),
  Ne(Comparison),
  Lt(Comparison),
  Le(Comparison),
  Gt(Comparison),
  Ge(Comparison),
  OneOf(Membership),
  Matches(PatternMatch),
  Contains(Substring),
}

#[derive(Clone, Copy)]
enum CmpOp {
  Eq,
  Ne,
  Lt,
  Le,
  Gt,
  Ge,
}

impl RuleSpec {
  pub fn compile(&self) -> Result<Rule, RuleError> {
    match self {
      Self::All(specs) => Ok(rule::all_of(compile_all(specs)?)),
      Self::Any(specs) => Ok(rule::any_of(compile_all(specs)?)),
      Self::Not(spec) => Ok(spec.compile()?.negate()),
      Self::Eq(c) => compile_cmp(c, CmpOp::Eq),
      Self::Ne(c) => compile_cmp(c, CmpOp::Ne),
      Self::Lt(c) => compile_cmp(c, CmpOp::Lt),
      Self::Le(c) => compile_cmp(c, CmpOp::Le),
      Self::Gt(c) => compile_cmp(c, CmpOp::Gt),
      Self::Ge(c) => compile_cmp(c, CmpOp::Ge),
      Self::OneOf(m) => compile_one_of(m),
      Self::Matches(m) => {
        let field = text_only(m.field, "matches")?;
        field.matches(&m.patterns)
      }
      Self::Contains(s) => {
        let field = text_only(s.field, "contains")?;
        Ok(field.contains(s.needles.iter().cloned()))
      }
    }
  }
}

fn compile_all(specs: &[RuleSpec]) -> Result<Vec<Rule>, RuleError> {
  specs.iter().map(RuleSpec::compile).collect()
}

fn text_only(field: FieldName, op: &str) -> Result<TextField, RuleError> {
  field
    .text()
    .ok_or_else(|| RuleError::type_misuse(field.as_str(), op))
}

fn severity_value(raw: &str) -> Result<Severity, RuleError> {
  raw
    .parse()
    .map_err(|e: UnknownSeverity| RuleError::value("severity", e.to_string()))
}

fn compile_cmp(c: &Comparison, op: CmpOp) -> Result<Rule, RuleError> {
  if let Some(field) = c.field.text() {
    let v = c.value.clone();
    return Ok(match op {
      CmpOp::Eq => field.eq(v),
      CmpOp::Ne => field.ne(v),
      CmpOp::Lt => field.lt(v),
      CmpOp::Le => field.le(v),
      CmpOp::Gt => field.gt(v),
      CmpOp::Ge => field.ge(v),
    });
  }

  match c.field {
    FieldName::Severity => {
      let v = severity_value(&c.value)?;
      Ok(match op {
        CmpOp::Eq => SEVERITY.eq(v),
        CmpOp::Ne => SEVERITY.ne(v),
        CmpOp::Lt => SEVERITY.lt(v),
        CmpOp::Le => SEVERITY.le(v),
        CmpOp::Gt => SEVERITY.gt(v),
        CmpOp::Ge => SEVERITY.ge(v),
      })
    }
    FieldName::Time => {
      let v = parse_timestamp(&c.value)
        .ok_or_else(|| RuleError::value("time", format!("invalid timestamp '{}'", c.value)))?;
      Ok(match op {
        CmpOp::Eq => TIME.eq(v),
        CmpOp::Ne => TIME.ne(v),
        CmpOp::Lt => TIME.lt(v),
        CmpOp::Le => TIME.le(v),
        CmpOp::Gt => TIME.gt(v),
        CmpOp::Ge => TIME.ge(v),
      })
    }
    other => Err(RuleError::type_misuse(other.as_str(), "compare")),
  }
}

fn compile_one_of(m: &Membership) -> Result<Rule, RuleError> {
  if let Some(field) = m.field.text() {
    return Ok(field.one_of(m.values.iter().cloned()));
  }
  match m.field {
    FieldName::Severity => {
      let values = m
        .values
        .iter()
        .map(|v| severity_value(v))
        .collect::<Result<Vec<_>, _>>()?;
      Ok(SEVERITY.one_of(values))
    }
    other => Err(RuleError::type_misuse(other.as_str(), "one_of")),
  }
}

impl Config {
  pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
    let config: Config = serde_json::from_str(s)?;
    if config.processors.is_empty() {
      return Err(ConfigError::Empty);
    }
    Ok(config)
  }

  pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.display().to_string(),
      source,
    })?;
    let config = Self::from_json_str(&text)?;
    info!(path = %path.display(), processors = config.processors.len(), "loaded rule set");
    Ok(config)
  }

  /// Force parse-failure reporting on every printer.
  pub fn report_parse_failures(&mut self) {
    for p in self.processors.iter_mut() {
      if let ProcessorConfig::Printer {
        report_parse_failures,
        ..
      } = p
      {
        *report_parse_failures = true;
      }
    }
  }

  /// Compile every processor, in document order.
  pub fn build(&self) -> Result<Vec<Box<dyn Processor>>, ConfigError> {
    self.processors.iter().map(ProcessorConfig::build).collect()
  }
}

impl ProcessorConfig {
  pub fn build(&self) -> Result<Box<dyn Processor>, ConfigError> {
    match self {
      Self::Printer {
        name,
        discard,
        format,
        report_parse_failures,
      } => {
        let mut printer = Printer::new(name.clone())
          .with_format(*format)
          .report_parse_failures(*report_parse_failures);
        printer.discard(compile_all(discard)?);
        Ok(Box::new(printer))
      }
      Self::Counter {
        title,
        require,
        buckets,
        report_other,
        retain_other,
        report_zero,
        other_limit,
      } => {
        let options = CounterOptions {
          report_other: *report_other,
          retain_other: *retain_other,
          report_zero: *report_zero,
          other_limit: *other_limit,
        };
        let mut counter = Counter::with_options(title.clone(), options);
        counter.require(compile_all(require)?);
        for b in buckets {
          counter.bucket(b.name.clone(), b.rule.compile()?, b.threshold);
        }
        Ok(Box::new(counter))
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::parse::parse_line;

  fn rule(json: &str) -> Result<Rule, RuleError> {
    let spec: RuleSpec = serde_json::from_str(json).unwrap();
    spec.compile()
  }

  fn line(s: &str) -> crate::types::Record {
    parse_line(s).unwrap()
  }

  const EXIM: &str = "2013-05-01T10:22:01Z mailhost mail.notice exim[1234]: Unrouteable address";

  #[test]
  fn compiles_nested_rules() {
    let r = rule(
      r#"{"all": [
        {"eq": {"field": "program", "value": "exim"}},
        {"any": [
          {"matches": {"field": "message", "patterns": [".*Unrouteable address$"]}},
          {"contains": {"field": "message", "needles": ["relay"]}}
        ]},
        {"not": {"eq": {"field": "severity", "value": "debug"}}}
      ]}"#,
    )
    .unwrap();
    assert!(r.eval(&line(EXIM)));
  }

  #[test]
  fn one_of_and_ordering() {
    let r = rule(r#"{"one_of": {"field": "severity", "values": ["info", "notice"]}}"#).unwrap();
    assert!(r.eval(&line(EXIM)));
    let r = rule(r#"{"ge": {"field": "severity", "value": "warning"}}"#).unwrap();
    assert!(!r.eval(&line(EXIM)));
    let r = rule(r#"{"gt": {"field": "time", "value": "2013-01-01"}}"#).unwrap();
    assert!(r.eval(&line(EXIM)));
  }

  #[test]
  fn unknown_field_is_rejected_at_load() {
    let err = serde_json::from_str::<RuleSpec>(r#"{"eq": {"field": "progam", "value": "x"}}"#);
    assert!(err.is_err());
  }

  #[test]
  fn pattern_on_severity_is_a_type_misuse() {
    let err = rule(r#"{"matches": {"field": "severity", "patterns": ["not"]}}"#).unwrap_err();
    assert!(matches!(err, RuleError::TypeMisuse { field: "severity", .. }));
    let err = rule(r#"{"one_of": {"field": "time", "values": ["2013-01-01"]}}"#).unwrap_err();
    assert!(matches!(err, RuleError::TypeMisuse { field: "time", .. }));
  }

  #[test]
  fn bad_values_are_errors() {
    let err = rule(r#"{"eq": {"field": "severity", "value": "loud"}}"#).unwrap_err();
    assert!(err.to_string().contains("loud"));
    assert!(rule(r#"{"lt": {"field": "time", "value": "yesterday"}}"#).is_err());
    assert!(rule(r#"{"matches": {"field": "message", "patterns": ["("]}}"#).is_err());
  }

  #[test]
  fn empty_document_is_rejected() {
    assert!(matches!(
      Config::from_json_str(r#"{"processors": []}"#),
      Err(ConfigError::Empty)
    ));
  }

  #[test]
  fn counter_defaults() {
    let config = Config::from_json_str(
      r#"{"processors": [{"type": "counter", "title": "t"}]}"#,
    )
    .unwrap();
    match &config.processors[0] {
      ProcessorConfig::Counter {
        report_other,
        retain_other,
        report_zero,
        other_limit,
        ..
      } => {
        assert!(*report_other);
        assert!(*retain_other);
        assert!(!*report_zero);
        assert_eq!(*other_limit, None);
      }
      other => panic!("expected counter, got {:?}", other),
    }
  }

  #[test]
  fn force_parse_failure_reporting() {
    let mut config = Config::from_json_str(
      r#"{"processors": [{"type": "printer"}, {"type": "counter", "title": "t"}]}"#,
    )
    .unwrap();
    config.report_parse_failures();
    assert!(matches!(
      config.processors[0],
      ProcessorConfig::Printer {
        report_parse_failures: true,
        ..
      }
    ));
  }

  #[test]
  fn build_keeps_document_order() {
    let config = Config::from_json_str(
      r#"{"processors": [
        {"type": "counter", "title": "first"},
        {"type": "printer", "name": "second"}
      ]}"#,
    )
    .unwrap();
    let built = config.build().unwrap();
    let names: Vec<&str> = built.iter().map(|p| p.name()).collect();
    assert_eq!(names, vec!["first", "second"]);
  }
}
