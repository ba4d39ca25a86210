//! aeroquery - relation-aware query compiler
//!
//! Turns nested, relation-aware filter documents into either a plain
//! predicate or an aggregation pipeline with deduplicated joins, then
//! applies cursor pagination. Compilation is synchronous and never touches
//! a store; execution is delegated to a `StoreExecutor`.
//!
//! Flow: `AstBuilder` -> `RewritePipeline` -> `QueryCompiler` ->
//! `PaginationCompiler` -> `QueryOrchestrator`.

pub mod ast;
pub mod catalog;
pub mod cli;
pub mod compiler;
pub mod config;
pub mod errors;
pub mod observability;
pub mod operators;
pub mod pagination;
pub mod pipeline;
pub mod repository;
pub mod rewrite;

pub use ast::{AstBuilder, FilterNode, NodeKind};
pub use catalog::{Cardinality, CatalogLoader, InMemoryCatalog, RelationCatalog, RelationDescriptor};
pub use compiler::{CompiledFilter, QueryCompiler};
pub use config::{KeyType, QueryConfig};
pub use errors::{QueryError, QueryErrorCode, QueryResult};
pub use operators::{Operator, OperatorRegistry};
pub use pagination::{OrderBy, PaginationArgs, PaginationCompiler};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineStage};
pub use repository::{QueryOrchestrator, QueryPlan, ReadKind, StoreExecutor};
pub use rewrite::{NodeVisitor, RewritePipeline, VisitAction};
