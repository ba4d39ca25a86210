//! Structured JSON logger for aeroquery
//!
//! - One log line = one event
//! - `event` first, `severity` second, remaining fields sorted by key
//! - Synchronous, no buffering, written to stderr
//! - Process-wide minimum severity; events below it are dropped

use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Per-node compilation detail
    Trace = 0,
    /// Routing and plan decisions
    Info = 1,
    Warn = 2,
    /// Rejected or failed queries
    Error = 3,
    /// Catalog/builder disagreement, startup failures
    Fatal = 4,
}

impl Severity {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Severity::Trace,
            1 => Severity::Info,
            2 => Severity::Warn,
            3 => Severity::Error,
            _ => Severity::Fatal,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

static MIN_SEVERITY: AtomicU8 = AtomicU8::new(Severity::Info as u8);

/// A structured logger that outputs JSON lines
pub struct Logger;

impl Logger {
    /// Sets the process-wide minimum severity
    pub fn set_min_severity(severity: Severity) {
        MIN_SEVERITY.store(severity as u8, Ordering::Relaxed);
    }

    /// Returns the process-wide minimum severity
    pub fn min_severity() -> Severity {
        Severity::from_u8(MIN_SEVERITY.load(Ordering::Relaxed))
    }

    /// Returns true if events at `severity` are written
    pub fn enabled(severity: Severity) -> bool {
        severity >= Self::min_severity()
    }

    /// Log an event with the given severity and fields
    pub fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        if !Self::enabled(severity) {
            return;
        }
        // stdout carries CLI responses only
        Self::log_to_writer(severity, event, fields, &mut io::stderr());
    }

    fn log_to_writer<W: Write>(
        severity: Severity,
        event: &str,
        fields: &[(&str, &str)],
        writer: &mut W,
    ) {
        let mut line = Map::with_capacity(fields.len() + 2);
        line.insert("event".to_string(), Value::from(event));
        line.insert("severity".to_string(), Value::from(severity.as_str()));

        let mut sorted: Vec<_> = fields.to_vec();
        sorted.sort_by_key(|(key, _)| *key);
        for (key, value) in sorted {
            line.insert(key.to_string(), Value::from(value));
        }

        // a failed log write never fails the query
        if serde_json::to_writer(&mut *writer, &line).is_ok() {
            let _ = writer.write_all(b"\n");
        }
        let _ = writer.flush();
    }

    pub fn trace(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Trace, event, fields);
    }

    pub fn info(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Info, event, fields);
    }

    pub fn warn(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Warn, event, fields);
    }

    pub fn error(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Error, event, fields);
    }

    pub fn fatal(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Fatal, event, fields);
    }
}

/// Capture a log line to a buffer for testing
#[cfg(test)]
pub fn capture_log(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
    let mut buffer = Vec::new();
    Logger::log_to_writer(severity, event, fields, &mut buffer);
    String::from_utf8(buffer).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Trace < Severity::Info);
        assert!(Severity::Info < Severity::Warn);
        assert!(Severity::Error < Severity::Fatal);
    }

    #[test]
    fn test_log_json_format() {
        let output = capture_log(Severity::Info, "QUERY_PLANNED", &[("route", "pipeline")]);

        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["event"], "QUERY_PLANNED");
        assert_eq!(parsed["severity"], "INFO");
        assert_eq!(parsed["route"], "pipeline");
    }

    #[test]
    fn test_fields_sorted_after_event() {
        let output = capture_log(
            Severity::Trace,
            "JOIN_STAGED",
            &[("relation", "author"), ("alias", "author"), ("collection", "Post")],
        );

        let event_pos = output.find("\"event\"").unwrap();
        let alias_pos = output.find("\"alias\"").unwrap();
        let collection_pos = output.find("\"collection\"").unwrap();
        let relation_pos = output.find("\"relation\"").unwrap();

        assert!(event_pos < alias_pos);
        assert!(alias_pos < collection_pos);
        assert!(collection_pos < relation_pos);
    }

    #[test]
    fn test_escapes_filter_text() {
        let output = capture_log(
            Severity::Error,
            "QUERY_REJECTED",
            &[("reason", "bad key \"age_\"\n")],
        );
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["reason"], "bad key \"age_\"\n");
        assert_eq!(output.matches('\n').count(), 1);
    }

    #[test]
    fn test_severity_serde() {
        let parsed: Severity = serde_json::from_str("\"TRACE\"").unwrap();
        assert_eq!(parsed, Severity::Trace);
    }

    #[test]
    fn test_min_severity_roundtrip() {
        assert_eq!(Severity::from_u8(Severity::Warn as u8), Severity::Warn);
        assert!(Logger::enabled(Severity::Fatal));
    }
}
