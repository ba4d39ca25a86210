//! Operator suffix registry
//!
//! Maps the case-sensitive suffix vocabulary onto `Operator` kinds and splits
//! `<field>_<suffix>` filter keys.

use std::collections::HashMap;

use super::operator::Operator;

/// Suffix vocabulary, aliases included
const SUFFIXES: &[(&str, Operator)] = &[
    ("not", Operator::Not),
    ("in", Operator::In),
    ("nin", Operator::NotIn),
    ("notIn", Operator::NotIn),
    ("lt", Operator::Lt),
    ("lowerThan", Operator::Lt),
    ("lte", Operator::Lte),
    ("lowerThanOrEqual", Operator::Lte),
    ("gt", Operator::Gt),
    ("greaterThan", Operator::Gt),
    ("gte", Operator::Gte),
    ("greaterThanOrEqual", Operator::Gte),
    ("between", Operator::Between),
    ("betweene", Operator::BetweenOrEqual),
    ("betweenOrEqual", Operator::BetweenOrEqual),
    ("contains", Operator::Contains),
    ("notContains", Operator::NotContains),
    ("regex", Operator::Regex),
    ("startsWith", Operator::StartsWith),
    ("endsWith", Operator::EndsWith),
    ("all", Operator::All),
    ("every", Operator::All),
    ("any", Operator::Any),
    ("some", Operator::Any),
];

/// A filter key split into field and operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitKey {
    pub field: String,
    pub operator: Option<Operator>,
}

/// Read-only registry of operator suffixes
#[derive(Debug, Clone)]
pub struct OperatorRegistry {
    by_suffix: HashMap<&'static str, Operator>,
}

impl OperatorRegistry {
    /// Creates the registry with the full suffix vocabulary
    pub fn new() -> Self {
        Self {
            by_suffix: SUFFIXES.iter().copied().collect(),
        }
    }

    /// Looks up an operator by suffix (case-sensitive)
    pub fn lookup(&self, suffix: &str) -> Option<Operator> {
        self.by_suffix.get(suffix).copied()
    }

    /// Returns true if the suffix is registered
    pub fn is_registered(&self, suffix: &str) -> bool {
        self.by_suffix.contains_key(suffix)
    }

    /// Registered suffixes, in declaration order
    pub fn suffixes(&self) -> impl Iterator<Item = &'static str> {
        SUFFIXES.iter().map(|(suffix, _)| *suffix)
    }

    /// Splits `age_greaterThan` into (`age`, Gt). Keys without a registered
    /// suffix come back whole with no operator (equality).
    pub fn split_key(&self, key: &str) -> SplitKey {
        // no suffix contains '_', so only the last one can start a suffix
        if let Some((field, suffix)) = key.rsplit_once('_') {
            if !field.is_empty() {
                if let Some(operator) = self.lookup(suffix) {
                    return SplitKey {
                        field: field.to_string(),
                        operator: Some(operator),
                    };
                }
            }
        }

        SplitKey {
            field: key.to_string(),
            operator: None,
        }
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
