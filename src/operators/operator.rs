//! Comparison operators and their native predicate builders
//!
//! Names are a parse-time concern (see registry); this file only knows how
//! each operator kind turns an operand into a native predicate document.

use serde_json::{json, Value};

use crate::errors::{QueryError, QueryResult};

/// Closed set of comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// field != value
    Not,
    /// field in list
    In,
    /// field not in list
    NotIn,
    /// field < value
    Lt,
    /// field <= value
    Lte,
    /// field > value
    Gt,
    /// field >= value
    Gte,
    /// min < field < max
    Between,
    /// min <= field <= max
    BetweenOrEqual,
    /// substring (strings) or element (arrays)
    Contains,
    NotContains,
    Regex,
    StartsWith,
    EndsWith,
    /// array holds every listed value
    All,
    /// array holds at least one listed value
    Any,
}

impl Operator {
    /// Every operator kind
    pub const ALL: [Operator; 16] = [
        Operator::Not,
        Operator::In,
        Operator::NotIn,
        Operator::Lt,
        Operator::Lte,
        Operator::Gt,
        Operator::Gte,
        Operator::Between,
        Operator::BetweenOrEqual,
        Operator::Contains,
        Operator::NotContains,
        Operator::Regex,
        Operator::StartsWith,
        Operator::EndsWith,
        Operator::All,
        Operator::Any,
    ];

    /// Canonical suffix used in error messages
    pub fn op_name(&self) -> &'static str {
        match self {
            Operator::Not => "not",
            Operator::In => "in",
            Operator::NotIn => "nin",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Between => "between",
            Operator::BetweenOrEqual => "betweene",
            Operator::Contains => "contains",
            Operator::NotContains => "notContains",
            Operator::Regex => "regex",
            Operator::StartsWith => "startsWith",
            Operator::EndsWith => "endsWith",
            Operator::All => "all",
            Operator::Any => "any",
        }
    }

    /// Returns true if the operand is a list of values
    pub fn takes_list(&self) -> bool {
        matches!(
            self,
            Operator::In
                | Operator::NotIn
                | Operator::Between
                | Operator::BetweenOrEqual
                | Operator::All
                | Operator::Any
        )
    }

    /// Builds the native predicate. `field` only labels errors.
    pub fn build(&self, field: &str, value: &Value) -> QueryResult<Value> {
        let predicate = match self {
            Operator::Not => json!({ "$ne": value }),
            Operator::In => json!({ "$in": as_list(value) }),
            Operator::NotIn => json!({ "$nin": as_list(value) }),
            Operator::Lt => json!({ "$lt": value }),
            Operator::Lte => json!({ "$lte": value }),
            Operator::Gt => json!({ "$gt": value }),
            Operator::Gte => json!({ "$gte": value }),
            Operator::Between => {
                let (min, max) = self.range(field, value)?;
                json!({ "$gt": min, "$lt": max })
            }
            Operator::BetweenOrEqual => {
                let (min, max) = self.range(field, value)?;
                json!({ "$gte": min, "$lte": max })
            }
            Operator::Contains => contains_predicate(value),
            Operator::NotContains => json!({ "$not": contains_predicate(value) }),
            Operator::Regex => {
                let pattern = self.string_operand(field, value)?;
                json!({ "$regex": pattern })
            }
            Operator::StartsWith => {
                let prefix = self.string_operand(field, value)?;
                json!({ "$regex": format!("^{}", regex::escape(prefix)), "$options": "i" })
            }
            Operator::EndsWith => {
                let suffix = self.string_operand(field, value)?;
                json!({ "$regex": format!("{}$", regex::escape(suffix)), "$options": "i" })
            }
            Operator::All => json!({ "$all": as_list(value) }),
            Operator::Any => json!({ "$in": as_list(value) }),
        };
        Ok(predicate)
    }

    fn range<'v>(&self, field: &str, value: &'v Value) -> QueryResult<(&'v Value, &'v Value)> {
        match value.as_array().map(Vec::as_slice) {
            Some([min, max]) => Ok((min, max)),
            _ => Err(QueryError::invalid_operand(
                field,
                self.op_name(),
                "expected a two-element [min, max] list",
            )),
        }
    }

    fn string_operand<'v>(&self, field: &str, value: &'v Value) -> QueryResult<&'v str> {
        value.as_str().ok_or_else(|| {
            QueryError::invalid_operand(field, self.op_name(), "expected a string")
        })
    }
}

/// Wraps a scalar operand into a one-element list
fn as_list(value: &Value) -> Value {
    match value {
        Value::Array(_) => value.clone(),
        other => Value::Array(vec![other.clone()]),
    }
}

fn contains_predicate(value: &Value) -> Value {
    match value {
        Value::String(s) => json!({ "$regex": regex::escape(s), "$options": "i" }),
        other => json!({ "$elemMatch": { "$eq": other } }),
    }
}
