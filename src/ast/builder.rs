//! AST builder: filter object → typed node tree
//!
//! Key classification, in order:
//! 1. `and` / `or` / `nor` (case-insensitive) → logical group
//! 2. declared relation of the current collection → relation node
//! 3. anything else → field node, split on the registered operator suffixes;
//!    a split that leaves a logical or relation keyword as the field is rejected
//!
//! The builder is backend-agnostic. Primary-key canonicalization lives in
//! the rewrite pipeline, not here.

use serde_json::{Map, Value};

use crate::catalog::RelationCatalog;
use crate::errors::{QueryError, QueryResult};
use crate::observability::{log_event_with_fields, Event};
use crate::operators::OperatorRegistry;

use super::node::{FilterNode, LogicalOp, NodeKind};

/// Recursive filter parser
pub struct AstBuilder<'a> {
    catalog: &'a dyn RelationCatalog,
    registry: &'a OperatorRegistry,
    max_depth: usize,
}

/// Per-descent bookkeeping
struct Descent {
    depth: usize,
    keys: Vec<String>,
    collections: Vec<String>,
}

impl Descent {
    fn root(collection: &str) -> Self {
        Self::at(collection, &[])
    }

    /// Resumes below `path`, the keys of the enclosing groups and relations
    fn at(collection: &str, path: &[String]) -> Self {
        Self {
            depth: path.len(),
            keys: path.to_vec(),
            collections: vec![collection.to_string()],
        }
    }
}

impl<'a> AstBuilder<'a> {
    pub fn new(
        catalog: &'a dyn RelationCatalog,
        registry: &'a OperatorRegistry,
        max_depth: usize,
    ) -> Self {
        Self {
            catalog,
            registry,
            max_depth,
        }
    }

    pub fn catalog(&self) -> &'a dyn RelationCatalog {
        self.catalog
    }

    /// Parses a filter object against `collection`.
    ///
    /// `null` is an empty filter. Anything else that is not an object is
    /// rejected.
    pub fn parse_query(&self, filter: &Value, collection: &str) -> QueryResult<Vec<FilterNode>> {
        match filter {
            Value::Null => Ok(Vec::new()),
            Value::Object(map) => self.parse_object(map, collection, &mut Descent::root(collection)),
            other => Err(QueryError::MalformedFilter(format!(
                "filter for '{}' must be an object, got {}",
                collection,
                describe(other)
            ))),
        }
    }

    /// Builds the node for one top-level key/value pair.
    pub fn build_node(&self, key: &str, value: &Value, collection: &str) -> QueryResult<FilterNode> {
        self.build_node_at(key, value, collection, &[])
    }

    /// Builds the node for one key/value pair nested under `path`.
    ///
    /// Used by the rewrite pipeline to re-run construction for replaced or
    /// added keys. The depth budget already spent by `path` still counts.
    pub fn build_node_at(
        &self,
        key: &str,
        value: &Value,
        collection: &str,
        path: &[String],
    ) -> QueryResult<FilterNode> {
        self.parse_entry(key, value, collection, &mut Descent::at(collection, path))
    }

    fn parse_object(
        &self,
        map: &Map<String, Value>,
        collection: &str,
        descent: &mut Descent,
    ) -> QueryResult<Vec<FilterNode>> {
        map.iter()
            .map(|(key, value)| self.parse_entry(key, value, collection, descent))
            .collect()
    }

    fn parse_entry(
        &self,
        key: &str,
        value: &Value,
        collection: &str,
        descent: &mut Descent,
    ) -> QueryResult<FilterNode> {
        if key.is_empty() {
            return Err(QueryError::MalformedFilter(format!(
                "empty key in filter for '{}'",
                collection
            )));
        }

        if let Some(op) = LogicalOp::from_key(key) {
            return self.parse_logical(op, key, value, collection, descent);
        }

        if let Some(relation) = self.catalog.relation(collection, key) {
            let relation = relation.clone();
            return self.parse_relation(relation, key, value, collection, descent);
        }

        let split = self.registry.split_key(key);
        if LogicalOp::from_key(&split.field).is_some()
            || self.catalog.is_relation(collection, &split.field)
        {
            return Err(QueryError::MalformedFilter(format!(
                "'{}' on '{}' applies an operator to '{}', which is a logical or relation keyword",
                key, collection, split.field
            )));
        }

        Ok(FilterNode::field(
            collection,
            key,
            split.field,
            split.operator,
            value.clone(),
        ))
    }

    fn parse_logical(
        &self,
        op: LogicalOp,
        key: &str,
        value: &Value,
        collection: &str,
        descent: &mut Descent,
    ) -> QueryResult<FilterNode> {
        let items = value.as_array().ok_or_else(|| QueryError::MalformedLogicalGroup {
            key: key.to_string(),
        })?;

        self.enter(key, descent)?;
        let mut branches = Vec::with_capacity(items.len());
        for item in items {
            let map = item.as_object().ok_or_else(|| QueryError::MalformedLogicalGroup {
                key: key.to_string(),
            })?;
            branches.push(self.parse_object(map, collection, descent)?);
        }
        Self::leave(descent);

        Ok(FilterNode::with_kind(
            NodeKind::Logical { op, branches },
            key,
            value.clone(),
            collection,
        ))
    }

    fn parse_relation(
        &self,
        relation: crate::catalog::RelationDescriptor,
        key: &str,
        value: &Value,
        collection: &str,
        descent: &mut Descent,
    ) -> QueryResult<FilterNode> {
        let map = value.as_object().ok_or_else(|| {
            QueryError::MalformedFilter(format!(
                "relation '{}' on '{}' expects a nested filter object, got {}",
                key,
                collection,
                describe(value)
            ))
        })?;

        self.enter(key, descent)?;
        let target = relation.target_collection.clone();
        if descent.collections.contains(&target) {
            let path = descent.keys.join(".");
            log_event_with_fields(
                Event::RelationCycle,
                &[("collection", target.as_str()), ("path", path.as_str())],
            );
        }

        descent.collections.push(target.clone());
        let children = self.parse_object(map, &target, descent)?;
        descent.collections.pop();
        Self::leave(descent);

        Ok(FilterNode::with_kind(
            NodeKind::Relation { relation, children },
            key,
            value.clone(),
            collection,
        ))
    }

    fn enter(&self, key: &str, descent: &mut Descent) -> QueryResult<()> {
        descent.keys.push(key.to_string());
        descent.depth += 1;
        if descent.depth > self.max_depth {
            return Err(QueryError::DepthExceeded {
                max_depth: self.max_depth,
                path: descent.keys.join("."),
            });
        }
        Ok(())
    }

    fn leave(descent: &mut Descent) {
        descent.keys.pop();
        descent.depth -= 1;
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
