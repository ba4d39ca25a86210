//! Filter AST for aeroquery
//!
//! A nested filter object becomes a tree of `FilterNode`s. Trees are built
//! fresh per query and discarded after compilation.

mod builder;
mod node;

pub use builder::AstBuilder;
pub use node::{tree_embeds_relation, CustomCompileFn, CustomCompiler, FilterNode, LogicalOp, NodeKind};
