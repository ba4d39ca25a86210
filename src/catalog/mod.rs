//! Relation catalog for aeroquery
//!
//! A relation is a declared join between two collections:
//! `{ name, targetCollection, localField, foreignField, cardinality }`.
//!
//! The catalog is an explicit read-only dependency handed to the AST builder
//! and the pipeline builder. It is never reached through global state.

mod loader;
mod relation;

pub use loader::CatalogLoader;
pub use relation::{Cardinality, InMemoryCatalog, RelationCatalog, RelationDescriptor};
