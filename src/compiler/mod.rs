//! Filter compilation
//!
//! - `AstCompiler` folds a node tree into one native predicate
//! - `QueryCompiler` interleaves those predicates with the joins they need

mod ast_compiler;
mod query_compiler;

pub use ast_compiler::{merge_predicate, AstCompiler};
pub use query_compiler::{CompiledFilter, QueryCompiler};
