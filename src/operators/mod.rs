//! Operator registry for aeroquery
//!
//! Comparison suffixes (`age_gt`, `title_contains`) resolve to a closed
//! `Operator` enum at parse time. Execution dispatch is a plain `match` on
//! the enum, so adding an operator means one new variant plus one suffix entry.
//!
//! Suffix vocabulary (case-sensitive):
//! `not, in, nin|notIn, lt|lowerThan, lte|lowerThanOrEqual, gt|greaterThan,
//! gte|greaterThanOrEqual, between, betweene|betweenOrEqual, contains,
//! notContains, regex, startsWith, endsWith, all|every, any|some`

mod operator;
mod registry;

pub use operator::Operator;
pub use registry::{OperatorRegistry, SplitKey};
