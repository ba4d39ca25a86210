//! Cursor-based pagination
//!
//! `last` is a documented limitation: it fails with "not supported" instead
//! of being approximated with a reversed sort.

mod args;
mod compiler;

pub use args::{OrderBy, PageSide, PaginationArgs};
pub use compiler::{PageWindow, PaginationCompiler};
