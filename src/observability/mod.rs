//! Observability subsystem for aeroquery
//!
//! - Structured logging (JSON lines)
//! - Deterministic counters
//! - Per-read lifecycle scopes
//!
//! Observability is read-only: it never changes what a query compiles to,
//! and a failed log write never fails a query.
//!
//! ```ignore
//! use aeroquery::observability::{Logger, Event, MetricsRegistry, ObservationScope};
//!
//! Logger::info("QUERY_PLANNED", &[("route", "pipeline")]);
//!
//! let metrics = MetricsRegistry::new();
//! metrics.increment_pipeline_reads();
//!
//! let scope = ObservationScope::new("FIND_MANY");
//! scope.complete();
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use scope::ObservationScope;

/// Log an event at its own severity
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

/// Log an event with fields at its own severity
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event() {
        log_event(Event::ConfigLoaded);
        log_event(Event::JoinStaged);
    }

    #[test]
    fn test_log_event_with_fields() {
        log_event_with_fields(Event::CatalogLoaded, &[("relations", "3")]);
    }
}
