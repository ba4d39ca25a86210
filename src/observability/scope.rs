//! ObservationScope for per-read begin/complete logging
//!
//! - Logs `{name}_BEGIN` on creation
//! - Logs `{name}_COMPLETE` with `elapsed_ms` on `complete()`
//! - Logs `{name}_FAILED` with the error code on `fail()`
//! - Logs `{name}_INCOMPLETE` if dropped without either

use std::cell::Cell;
use std::time::Instant;

use crate::errors::QueryError;

use super::logger::Logger;

/// A scope that logs the lifecycle of one read operation
///
/// ```ignore
/// let scope = ObservationScope::with_fields("FIND_MANY", &[("collection", "Post")]);
/// // ... plan and execute ...
/// scope.complete_with_fields(&[("route", "pipeline")]);
/// ```
pub struct ObservationScope<'a> {
    name: &'a str,
    completed: Cell<bool>,
    fields: Vec<(&'a str, String)>,
    started: Instant,
}

impl<'a> ObservationScope<'a> {
    /// Create a new observation scope
    pub fn new(name: &'a str) -> Self {
        Self::with_fields(name, &[])
    }

    /// Create a new observation scope with fields repeated on every line
    pub fn with_fields(name: &'a str, fields: &[(&'a str, &str)]) -> Self {
        Logger::info(&format!("{}_BEGIN", name), fields);

        Self {
            name,
            completed: Cell::new(false),
            fields: fields.iter().map(|(k, v)| (*k, v.to_string())).collect(),
            started: Instant::now(),
        }
    }

    /// Mark the scope as successfully completed
    pub fn complete(self) {
        self.complete_with_fields(&[]);
    }

    /// Mark the scope as completed with additional fields
    pub fn complete_with_fields(self, extra_fields: &[(&str, &str)]) {
        self.completed.set(true);
        let elapsed = self.elapsed_ms();

        let mut all_fields: Vec<(&str, &str)> =
            self.fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
        all_fields.extend(extra_fields.iter().copied());
        all_fields.push(("elapsed_ms", elapsed.as_str()));

        Logger::info(&format!("{}_COMPLETE", self.name), &all_fields);
    }

    /// Mark the scope as failed
    ///
    /// FATAL errors are logged at FATAL, everything else at ERROR.
    pub fn fail(self, error: &QueryError) {
        self.completed.set(true);
        let reason = error.to_string();

        let mut all_fields: Vec<(&str, &str)> =
            self.fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
        all_fields.push(("code", error.code().code()));
        all_fields.push(("reason", reason.as_str()));

        let event = format!("{}_FAILED", self.name);
        if error.severity() == crate::errors::Severity::Fatal {
            Logger::fatal(&event, &all_fields);
        } else {
            Logger::error(&event, &all_fields);
        }
    }

    /// Check if the scope has been completed
    pub fn is_completed(&self) -> bool {
        self.completed.get()
    }

    /// Elapsed milliseconds since the scope opened
    pub fn elapsed_ms(&self) -> String {
        self.started.elapsed().as_millis().to_string()
    }
}

impl Drop for ObservationScope<'_> {
    fn drop(&mut self) {
        if !self.completed.get() {
            let event = format!("{}_INCOMPLETE", self.name);
            Logger::warn(&event, &[("reason", "scope dropped without completion")]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_starts_incomplete() {
        let scope = ObservationScope::new("FIND_MANY");
        assert!(!scope.is_completed());
        scope.complete();
    }

    #[test]
    fn test_scope_with_fields() {
        let scope = ObservationScope::with_fields("COUNT", &[("collection", "Post")]);
        scope.complete_with_fields(&[("route", "simple")]);
    }

    #[test]
    fn test_scope_fail() {
        let scope = ObservationScope::new("FIND_ONE");
        scope.fail(&QueryError::Unsupported("last".into()));
    }

    #[test]
    fn test_scope_drop_without_complete() {
        let scope = ObservationScope::new("FIND_ONE");
        drop(scope);
    }

    #[test]
    fn test_elapsed_is_numeric() {
        let scope = ObservationScope::new("FIND_MANY");
        let ms: u128 = scope.elapsed_ms().parse().unwrap();
        assert!(ms < 60_000);
        scope.complete();
    }
}
