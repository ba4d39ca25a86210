//! Visitor contract and depth-first traversal
//!
//! Traversal rules:
//! - pre-order: a node is visited before its relation children and group branches
//! - visitors run in registration order and see the effect of earlier ones
//! - a suppressed node is not shown to later visitors and not descended into
//! - an added sibling is appended to the current branch and visited by the
//!   visitors registered after the one that added it

use std::collections::VecDeque;
use std::sync::Arc;

use serde_json::Value;

use crate::ast::{AstBuilder, FilterNode, NodeKind};
use crate::errors::QueryResult;
use crate::observability::{log_event_with_fields, Event};

/// What a visitor wants done with the current node
#[derive(Debug, Clone)]
pub enum VisitAction {
    /// Leave the node as it is
    Continue,
    /// Node contributes nothing to the compiled output
    Suppress,
    /// Swap the node for another
    Replace(FilterNode),
    /// Append a node to the current branch
    AddSibling(FilterNode),
}

/// Control surface handed to each visitor
pub struct VisitContext<'c> {
    builder: &'c AstBuilder<'c>,
    collection: &'c str,
    path: &'c [String],
}

impl<'c> VisitContext<'c> {
    /// Collection of the node under visit
    pub fn collection(&self) -> &str {
        self.collection
    }

    /// Nesting depth (0 = top level)
    pub fn depth(&self) -> usize {
        self.path.len()
    }

    /// Keys of the enclosing groups and relations
    pub fn path(&self) -> &[String] {
        self.path
    }

    /// Re-runs node construction for `key` at the current position
    pub fn build(&self, key: &str, value: &Value) -> QueryResult<FilterNode> {
        self.builder.build_node_at(key, value, self.collection, self.path)
    }

    /// Replaces the current node with the node built from `key`/`value`
    pub fn replace(&self, key: &str, value: Value) -> QueryResult<VisitAction> {
        Ok(VisitAction::Replace(self.build(key, &value)?))
    }

    /// Appends the node built from `key`/`value` to the current branch
    pub fn add_sibling(&self, key: &str, value: Value) -> QueryResult<VisitAction> {
        Ok(VisitAction::AddSibling(self.build(key, &value)?))
    }
}

/// A rewrite hook run over every node before compilation
pub trait NodeVisitor: Send + Sync {
    /// Name used in log output
    fn name(&self) -> &str {
        "visitor"
    }

    fn visit(&self, node: &FilterNode, ctx: &VisitContext<'_>) -> QueryResult<VisitAction>;
}

impl<F> NodeVisitor for F
where
    F: Fn(&FilterNode, &VisitContext<'_>) -> QueryResult<VisitAction> + Send + Sync,
{
    fn visit(&self, node: &FilterNode, ctx: &VisitContext<'_>) -> QueryResult<VisitAction> {
        self(node, ctx)
    }
}

/// Ordered list of visitors
#[derive(Clone, Default)]
pub struct RewritePipeline {
    visitors: Vec<Arc<dyn NodeVisitor>>,
}

impl RewritePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a visitor
    pub fn with_visitor(mut self, visitor: impl NodeVisitor + 'static) -> Self {
        self.visitors.push(Arc::new(visitor));
        self
    }

    /// Appends a closure visitor
    pub fn with_fn<F>(self, visit: F) -> Self
    where
        F: Fn(&FilterNode, &VisitContext<'_>) -> QueryResult<VisitAction> + Send + Sync + 'static,
    {
        self.with_visitor(visit)
    }

    /// Appends an already shared visitor
    pub fn push(&mut self, visitor: Arc<dyn NodeVisitor>) {
        self.visitors.push(visitor);
    }

    pub fn len(&self) -> usize {
        self.visitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visitors.is_empty()
    }

    /// Runs every visitor over the tree.
    ///
    /// The first visitor error aborts the rewrite.
    pub fn apply(&self, nodes: Vec<FilterNode>, builder: &AstBuilder<'_>) -> QueryResult<Vec<FilterNode>> {
        if self.visitors.is_empty() {
            return Ok(nodes);
        }
        self.visit_branch(nodes, builder, &[])
    }

    fn visit_branch(
        &self,
        nodes: Vec<FilterNode>,
        builder: &AstBuilder<'_>,
        path: &[String],
    ) -> QueryResult<Vec<FilterNode>> {
        let mut pending: VecDeque<(FilterNode, usize)> = nodes.into_iter().map(|n| (n, 0)).collect();
        let mut visited = Vec::with_capacity(pending.len());

        while let Some((node, first_visitor)) = pending.pop_front() {
            let (node, siblings) = self.visit_node(node, first_visitor, builder, path)?;
            visited.push(node);
            pending.extend(siblings);
        }

        Ok(visited)
    }

    fn visit_node(
        &self,
        mut node: FilterNode,
        first_visitor: usize,
        builder: &AstBuilder<'_>,
        path: &[String],
    ) -> QueryResult<(FilterNode, Vec<(FilterNode, usize)>)> {
        let mut siblings = Vec::new();

        for (index, visitor) in self.visitors.iter().enumerate().skip(first_visitor) {
            if node.suppressed {
                break;
            }

            let action = {
                let ctx = VisitContext {
                    builder,
                    collection: &node.collection,
                    path,
                };
                visitor.visit(&node, &ctx)?
            };

            match action {
                VisitAction::Continue => {}
                VisitAction::Suppress => {
                    node.suppressed = true;
                    log_event_with_fields(
                        Event::NodeSuppressed,
                        &[
                            ("key", node.raw_key.as_str()),
                            ("collection", node.collection.as_str()),
                            ("visitor", visitor.name()),
                        ],
                    );
                }
                VisitAction::Replace(replacement) => node = replacement,
                VisitAction::AddSibling(sibling) => siblings.push((sibling, index + 1)),
            }
        }

        if !node.suppressed {
            let mut inner = path.to_vec();
            inner.push(node.raw_key.clone());
            match &mut node.kind {
                NodeKind::Relation { children, .. } => {
                    let taken = std::mem::take(children);
                    *children = self.visit_branch(taken, builder, &inner)?;
                }
                NodeKind::Logical { branches, .. } => {
                    for branch in branches.iter_mut() {
                        let taken = std::mem::take(branch);
                        *branch = self.visit_branch(taken, builder, &inner)?;
                    }
                }
                NodeKind::Field { .. } => {}
            }
        }

        Ok((node, siblings))
    }
}
