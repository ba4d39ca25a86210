//! Filter AST node model
//!
//! A closed tagged union: every node is a field comparison, a relation
//! (scoped sub-filter against the related collection) or a logical group.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::catalog::RelationDescriptor;
use crate::errors::QueryResult;
use crate::operators::Operator;
use crate::pipeline::PipelineBuilder;

/// Logical combinators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Nor,
}

impl LogicalOp {
    /// Matches `and`/`or`/`nor`, case-insensitive
    pub fn from_key(key: &str) -> Option<Self> {
        match key.to_ascii_lowercase().as_str() {
            "and" => Some(LogicalOp::And),
            "or" => Some(LogicalOp::Or),
            "nor" => Some(LogicalOp::Nor),
            _ => None,
        }
    }

    /// Native operator key
    pub fn native(&self) -> &'static str {
        match self {
            LogicalOp::And => "$and",
            LogicalOp::Or => "$or",
            LogicalOp::Nor => "$nor",
        }
    }
}

/// Signature of a custom node compiler.
///
/// Receives the node, the predicate accumulator, the current namespace
/// (`""` or `"author."`) and the in-progress pipeline for stage injection.
pub type CustomCompileFn = dyn Fn(&FilterNode, &mut Map<String, Value>, &str, &mut PipelineBuilder<'_>) -> QueryResult<()>
    + Send
    + Sync;

/// Compilation override attached by a rewrite visitor
#[derive(Clone)]
pub struct CustomCompiler {
    name: String,
    compile: Arc<CustomCompileFn>,
}

impl CustomCompiler {
    /// Wraps a compile function; `name` shows up in debug output
    pub fn new<F>(name: impl Into<String>, compile: F) -> Self
    where
        F: Fn(&FilterNode, &mut Map<String, Value>, &str, &mut PipelineBuilder<'_>) -> QueryResult<()>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            compile: Arc::new(compile),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs the override
    pub fn invoke(
        &self,
        node: &FilterNode,
        acc: &mut Map<String, Value>,
        namespace: &str,
        pipeline: &mut PipelineBuilder<'_>,
    ) -> QueryResult<()> {
        (self.compile)(node, acc, namespace, pipeline)
    }
}

impl fmt::Debug for CustomCompiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomCompiler").field("name", &self.name).finish()
    }
}

/// Node variants
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// `field` or `field_<operator>`
    Field {
        field_name: String,
        operator: Option<Operator>,
    },
    /// Nested filter against `relation.target_collection`
    Relation {
        relation: RelationDescriptor,
        children: Vec<FilterNode>,
    },
    /// One sub-tree per element of the and/or/nor list
    Logical {
        op: LogicalOp,
        branches: Vec<Vec<FilterNode>>,
    },
}

/// One node of the filter AST
#[derive(Debug, Clone)]
pub struct FilterNode {
    pub kind: NodeKind,
    /// Key exactly as written in the filter object
    pub raw_key: String,
    /// Right-hand side as written
    pub value: Value,
    /// Collection the node is evaluated against
    pub collection: String,
    /// Suppressed nodes compile to nothing
    pub suppressed: bool,
    pub custom_compiler: Option<CustomCompiler>,
}

impl FilterNode {
    /// Creates a field node
    pub fn field(
        collection: impl Into<String>,
        raw_key: impl Into<String>,
        field_name: impl Into<String>,
        operator: Option<Operator>,
        value: Value,
    ) -> Self {
        Self::with_kind(
            NodeKind::Field {
                field_name: field_name.into(),
                operator,
            },
            raw_key,
            value,
            collection,
        )
    }

    pub(crate) fn with_kind(
        kind: NodeKind,
        raw_key: impl Into<String>,
        value: Value,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            raw_key: raw_key.into(),
            value,
            collection: collection.into(),
            suppressed: false,
            custom_compiler: None,
        }
    }

    /// Field name for field nodes
    pub fn field_name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Field { field_name, .. } => Some(field_name),
            _ => None,
        }
    }

    /// Operator for field nodes (None = equality)
    pub fn operator(&self) -> Option<Operator> {
        match &self.kind {
            NodeKind::Field { operator, .. } => *operator,
            _ => None,
        }
    }

    /// Relation descriptor for relation nodes
    pub fn relation(&self) -> Option<&RelationDescriptor> {
        match &self.kind {
            NodeKind::Relation { relation, .. } => Some(relation),
            _ => None,
        }
    }

    pub fn is_field(&self) -> bool {
        matches!(self.kind, NodeKind::Field { .. })
    }

    pub fn is_relation(&self) -> bool {
        matches!(self.kind, NodeKind::Relation { .. })
    }

    pub fn is_logical(&self) -> bool {
        matches!(self.kind, NodeKind::Logical { .. })
    }

    /// Returns true if the node can contribute to compiled output
    pub fn has_effect(&self) -> bool {
        if self.suppressed {
            return false;
        }
        if self.custom_compiler.is_some() {
            return true;
        }
        match &self.kind {
            NodeKind::Field { .. } => true,
            NodeKind::Relation { children, .. } => children.iter().any(FilterNode::has_effect),
            NodeKind::Logical { branches, .. } => branches
                .iter()
                .any(|branch| branch.iter().any(FilterNode::has_effect)),
        }
    }

    /// Returns true if the node is, or contains, an effective relation
    pub fn embeds_relation(&self) -> bool {
        if !self.has_effect() {
            return false;
        }
        match &self.kind {
            NodeKind::Field { .. } => false,
            NodeKind::Relation { .. } => true,
            NodeKind::Logical { branches, .. } => branches
                .iter()
                .any(|branch| branch.iter().any(FilterNode::embeds_relation)),
        }
    }
}

/// Returns true if any node in the tree needs a join
pub fn tree_embeds_relation(nodes: &[FilterNode]) -> bool {
    nodes.iter().any(FilterNode::embeds_relation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn status(value: &str) -> FilterNode {
        FilterNode::field("Post", "status", "status", None, json!(value))
    }

    fn author(children: Vec<FilterNode>) -> FilterNode {
        FilterNode::with_kind(
            NodeKind::Relation {
                relation: RelationDescriptor::one("author", "User", "authorId", "_id"),
                children,
            },
            "author",
            json!({}),
            "Post",
        )
    }

    #[test]
    fn test_logical_keys_case_insensitive() {
        assert_eq!(LogicalOp::from_key("AND"), Some(LogicalOp::And));
        assert_eq!(LogicalOp::from_key("Or"), Some(LogicalOp::Or));
        assert_eq!(LogicalOp::from_key("nor"), Some(LogicalOp::Nor));
        assert_eq!(LogicalOp::from_key("not"), None);
        assert_eq!(LogicalOp::Nor.native(), "$nor");
    }

    #[test]
    fn test_embeds_relation_through_groups() {
        let name = FilterNode::field("User", "name", "name", None, json!("Ann"));
        let group = FilterNode::with_kind(
            NodeKind::Logical {
                op: LogicalOp::Or,
                branches: vec![vec![status("DRAFT")], vec![author(vec![name])]],
            },
            "or",
            json!([]),
            "Post",
        );

        assert!(group.embeds_relation());
        assert!(!status("DRAFT").embeds_relation());
    }

    #[test]
    fn test_suppressed_children_remove_effect() {
        let mut name = FilterNode::field("User", "name", "name", None, json!("Ann"));
        name.suppressed = true;
        let relation = author(vec![name]);

        assert!(!relation.has_effect());
        assert!(!relation.embeds_relation());
        assert!(!tree_embeds_relation(&[relation, status("DRAFT")]));
    }

    #[test]
    fn test_custom_compiler_debug() {
        let compiler = CustomCompiler::new("noop", |_, _, _, _| Ok(()));
        assert!(format!("{:?}", compiler).contains("noop"));
    }
}
