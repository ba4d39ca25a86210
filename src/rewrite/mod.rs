//! Node rewrite pipeline
//!
//! Visitors run over the AST between parsing and compilation. They return a
//! `VisitAction` instead of mutating shared state, so every effect is
//! explicit and testable in isolation.

mod builtin;
mod visitor;

pub use builtin::{
    AliasVisitor, CoerceFn, CoerceVisitor, CustomPredicateVisitor, NegateVisitor, PrimaryKeyVisitor,
    SuppressVisitor,
};
pub use visitor::{NodeVisitor, RewritePipeline, VisitAction, VisitContext};
