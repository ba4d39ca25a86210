//! Cursor pagination arguments as accepted from callers

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::pipeline::{SortDirection, SortSpec};

/// One `orderBy` entry: `{"field": "createdAt", "order": "desc"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    #[serde(rename = "order", alias = "direction", default = "default_direction")]
    pub direction: SortDirection,
}

fn default_direction() -> SortDirection {
    SortDirection::Asc
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }

    pub fn to_sort_spec(&self) -> SortSpec {
        SortSpec {
            field: self.field.clone(),
            direction: self.direction,
        }
    }
}

/// Which side of the pivot a page lies on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSide {
    After,
    Before,
}

/// Pagination window requested by a caller.
///
/// `after`/`before` are opaque primary-key tokens; they are resolved to full
/// pivot documents before reaching the pagination compiler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationArgs {
    pub skip: Option<u64>,
    pub first: Option<u64>,
    /// Never supported; rejected rather than approximated
    pub last: Option<u64>,
    pub after: Option<Value>,
    pub before: Option<Value>,
    #[serde(default)]
    pub order_by: Vec<OrderBy>,
}

impl PaginationArgs {
    /// First `n` documents
    pub fn first(n: u64) -> Self {
        Self {
            first: Some(n),
            ..Default::default()
        }
    }

    pub fn with_skip(mut self, n: u64) -> Self {
        self.skip = Some(n);
        self
    }

    pub fn after(mut self, token: Value) -> Self {
        self.after = Some(token);
        self
    }

    pub fn before(mut self, token: Value) -> Self {
        self.before = Some(token);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    /// Side and token of the requested pivot, if any
    pub fn pivot_token(&self) -> Option<(PageSide, &Value)> {
        match (&self.after, &self.before) {
            (Some(token), _) => Some((PageSide::After, token)),
            (None, Some(token)) => Some((PageSide::Before, token)),
            (None, None) => None,
        }
    }

    /// Returns true if no windowing was requested
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
