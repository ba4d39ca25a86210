//! Aggregation pipeline model for aeroquery
//!
//! `PipelineBuilder` accumulates stages for one query; `build()` hands off an
//! immutable `Pipeline` by value.

mod builder;
mod stage;

pub use builder::{namespace_predicate, JoinParent, LookupOptions, PipelineBuilder};
pub use stage::{LookupStage, Pipeline, PipelineStage, SortDirection, SortSpec};
