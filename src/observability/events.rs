//! Observable query events
//!
//! Events are explicit and typed; `as_str` is the `event` field of the log line.

use std::fmt;

use super::logger::Severity;

/// Observable events in aeroquery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Startup
    /// Configuration loaded
    ConfigLoaded,
    /// Relation catalog loaded
    CatalogLoaded,

    // Planning
    /// Plan chosen for a read
    QueryPlanned,
    /// Read routed to a direct filtered read
    SimpleReadRouted,
    /// Read routed through the aggregation pipeline
    PipelineReadRouted,
    /// Query rejected during build, rewrite or compile
    QueryRejected,

    // Compilation detail
    /// Lookup stage appended
    JoinStaged,
    /// Lookup request collapsed onto an existing stage
    JoinDeduplicated,
    /// Rewrite visitor suppressed a node
    NodeSuppressed,
    /// Relation descent re-entered a collection already on the path
    RelationCycle,

    /// Catalog and builder disagree (FATAL)
    CatalogInconsistent,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::CatalogLoaded => "CATALOG_LOADED",
            Event::QueryPlanned => "QUERY_PLANNED",
            Event::SimpleReadRouted => "SIMPLE_READ_ROUTED",
            Event::PipelineReadRouted => "PIPELINE_READ_ROUTED",
            Event::QueryRejected => "QUERY_REJECTED",
            Event::JoinStaged => "JOIN_STAGED",
            Event::JoinDeduplicated => "JOIN_DEDUPLICATED",
            Event::NodeSuppressed => "NODE_SUPPRESSED",
            Event::RelationCycle => "RELATION_CYCLE",
            Event::CatalogInconsistent => "CATALOG_INCONSISTENT",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::JoinStaged
            | Event::JoinDeduplicated
            | Event::NodeSuppressed
            | Event::RelationCycle => Severity::Trace,
            Event::QueryRejected => Severity::Warn,
            Event::CatalogInconsistent => Severity::Fatal,
            _ => Severity::Info,
        }
    }

    /// Returns true if this event indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::CatalogInconsistent)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
