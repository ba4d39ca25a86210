//! Repository-level query execution
//!
//! The orchestrator owns the routing decision: a filter with no relation
//! reference runs as a direct filtered read, anything else goes through the
//! aggregation pipeline.

mod executor;
mod orchestrator;
mod plan;

pub use executor::{Cursor, FindRequest, StoreExecutor, StoreFuture};
pub use orchestrator::{QueryOrchestrator, COUNT_FIELD};
pub use plan::{QueryPlan, ReadKind};
