//! Query plans: the routing decision made before any I/O

use serde_json::{json, Value};

use crate::pipeline::Pipeline;

use super::executor::FindRequest;

/// Read operations supported by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadKind {
    FindOne,
    FindMany,
    Count,
}

impl ReadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadKind::FindOne => "FIND_ONE",
            ReadKind::FindMany => "FIND_MANY",
            ReadKind::Count => "COUNT",
        }
    }
}

/// How a read will execute
#[derive(Debug, Clone, PartialEq)]
pub enum QueryPlan {
    /// No join required: direct filtered read
    Simple(FindRequest),
    /// Joins (or injected stages) required
    Pipeline(Pipeline),
}

impl QueryPlan {
    pub fn route(&self) -> &'static str {
        match self {
            QueryPlan::Simple(_) => "simple",
            QueryPlan::Pipeline(_) => "pipeline",
        }
    }

    pub fn is_simple(&self) -> bool {
        matches!(self, QueryPlan::Simple(_))
    }

    /// Explain form
    pub fn to_json(&self) -> Value {
        match self {
            QueryPlan::Simple(request) => json!({
                "route": self.route(),
                "find": request.to_json(),
            }),
            QueryPlan::Pipeline(pipeline) => json!({
                "route": self.route(),
                "aggregate": pipeline.to_json(),
            }),
        }
    }
}
