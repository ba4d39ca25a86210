//! Pagination compiler
//!
//! Emitted stage order: pivot match, sort, skip, limit. The sort follows
//! the pivot match so the match stays selective.

use serde_json::{Map, Value};

use crate::compiler::merge_predicate;
use crate::errors::{QueryError, QueryResult};
use crate::pipeline::{PipelineBuilder, SortDirection, SortSpec};

use super::args::{PageSide, PaginationArgs};

/// Windowing derived from pagination arguments.
///
/// Shared by the pipeline path and the simple read path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageWindow {
    /// Pivot-narrowing predicate (empty without a pivot)
    pub pivot_match: Map<String, Value>,
    pub sort: Vec<SortSpec>,
    /// Omitted when zero
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

/// Translates cursor arguments into windowing stages
#[derive(Debug, Clone)]
pub struct PaginationCompiler {
    primary_key: String,
}

impl PaginationCompiler {
    pub fn new(primary_key: impl Into<String>) -> Self {
        Self {
            primary_key: primary_key.into(),
        }
    }

    /// Checks arguments that fail regardless of the pivot
    pub fn validate(args: &PaginationArgs) -> QueryResult<()> {
        if args.last.is_some() {
            return Err(QueryError::Unsupported(
                "'last' pagination; use 'first' with a reversed orderBy".to_string(),
            ));
        }
        if args.after.is_some() && args.before.is_some() {
            return Err(QueryError::InvalidPagination(
                "'after' and 'before' cannot be combined".to_string(),
            ));
        }
        Ok(())
    }

    /// Computes the window; `pivot` is the document resolved from
    /// `after`/`before`.
    pub fn window(&self, args: &PaginationArgs, pivot: Option<&Value>) -> QueryResult<PageWindow> {
        Self::validate(args)?;

        let pivot_match = match (args.pivot_token(), pivot) {
            (Some((side, _)), Some(pivot)) => self.pivot_match(side, args, pivot)?,
            (Some(_), None) => {
                return Err(QueryError::InvalidPagination(
                    "'after'/'before' given but the pivot was not resolved".to_string(),
                ))
            }
            (None, Some(_)) => {
                return Err(QueryError::InvalidPagination(
                    "pivot supplied without 'after' or 'before'".to_string(),
                ))
            }
            (None, None) => Map::new(),
        };

        Ok(PageWindow {
            pivot_match,
            sort: args.order_by.iter().map(|o| o.to_sort_spec()).collect(),
            skip: args.skip.filter(|n| *n > 0),
            limit: args.first,
        })
    }

    /// Appends the window to `builder`.
    ///
    /// Unsupported arguments fail before any stage is appended.
    pub fn apply(
        &self,
        builder: &mut PipelineBuilder<'_>,
        args: &PaginationArgs,
        pivot: Option<&Value>,
    ) -> QueryResult<()> {
        let window = self.window(args, pivot)?;
        Self::append(builder, window);
        Ok(())
    }

    /// Appends an already computed window
    pub fn append(builder: &mut PipelineBuilder<'_>, window: PageWindow) {
        builder.match_(window.pivot_match);
        builder.sort_by(window.sort);
        if let Some(n) = window.skip {
            builder.skip(n);
        }
        if let Some(n) = window.limit {
            builder.limit(n);
        }
    }

    fn pivot_match(
        &self,
        side: PageSide,
        args: &PaginationArgs,
        pivot: &Value,
    ) -> QueryResult<Map<String, Value>> {
        if !pivot.is_object() {
            return Err(QueryError::InvalidPagination(
                "pivot must be a document".to_string(),
            ));
        }

        let mut predicate = Map::new();

        if args.order_by.is_empty() {
            let key = value_at(pivot, &self.primary_key).ok_or_else(|| {
                QueryError::InvalidPagination(format!(
                    "pivot has no '{}' to page from",
                    self.primary_key
                ))
            })?;
            predicate.insert(
                self.primary_key.clone(),
                comparison(SortDirection::Asc, side, key),
            );
            return Ok(predicate);
        }

        for order in &args.order_by {
            // partial sort specs are tolerated
            if let Some(value) = value_at(pivot, &order.field) {
                merge_predicate(
                    &mut predicate,
                    order.field.clone(),
                    comparison(order.direction, side, value),
                );
            }
        }
        Ok(predicate)
    }
}

/// Comparator for one sort key: ascending after / descending before look
/// forward (`$gt`), the other two look back (`$lt`).
fn comparison(direction: SortDirection, side: PageSide, value: &Value) -> Value {
    let operator = match (direction, side) {
        (SortDirection::Asc, PageSide::After) | (SortDirection::Desc, PageSide::Before) => "$gt",
        (SortDirection::Asc, PageSide::Before) | (SortDirection::Desc, PageSide::After) => "$lt",
    };
    let mut clause = Map::new();
    clause.insert(operator.to_string(), value.clone());
    Value::Object(clause)
}

/// Value at a dotted path; null counts as absent
fn value_at<'v>(document: &'v Value, path: &str) -> Option<&'v Value> {
    let mut current = document;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}
