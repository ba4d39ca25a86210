//! Built-in rewrite visitors
//!
//! All of them act on field nodes only and can be restricted to one
//! collection with `on_collection`.

use std::sync::Arc;

use serde_json::Value;

use crate::ast::{CustomCompiler, FilterNode, NodeKind};
use crate::config::{KeyType, QueryConfig};
use crate::errors::{QueryError, QueryResult};
use crate::operators::Operator;

use super::visitor::{NodeVisitor, VisitAction, VisitContext};

/// Field-name target shared by the built-ins
#[derive(Debug, Clone)]
struct FieldTarget {
    field: String,
    collection: Option<String>,
}

impl FieldTarget {
    fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            collection: None,
        }
    }

    fn matches(&self, node: &FilterNode) -> bool {
        if let Some(collection) = &self.collection {
            if collection != &node.collection {
                return false;
            }
        }
        node.field_name() == Some(self.field.as_str())
    }
}

/// Copy of a field node with a new name, value or both
fn rewrite_field(node: &FilterNode, field_name: &str, value: Value) -> FilterNode {
    let mut rewritten = node.clone();
    rewritten.kind = NodeKind::Field {
        field_name: field_name.to_string(),
        operator: node.operator(),
    };
    rewritten.value = value;
    rewritten
}

/// Canonicalizes the id alias to the store primary key and coerces its value.
///
/// `id` and `id_in` become `_id` and `_id_in` with every key parsed to the
/// configured key type. Pattern operators (`contains`, `regex`, ...) keep
/// their raw operand.
#[derive(Debug, Clone)]
pub struct PrimaryKeyVisitor {
    id_alias: String,
    primary_key: String,
    key_type: KeyType,
}

impl PrimaryKeyVisitor {
    pub fn new(id_alias: impl Into<String>, primary_key: impl Into<String>, key_type: KeyType) -> Self {
        Self {
            id_alias: id_alias.into(),
            primary_key: primary_key.into(),
            key_type,
        }
    }

    pub fn from_config(config: &QueryConfig) -> Self {
        Self::new(&config.id_alias, &config.primary_key, config.key_type)
    }

    fn coerces(operator: Option<Operator>) -> bool {
        !matches!(
            operator,
            Some(
                Operator::Contains
                    | Operator::NotContains
                    | Operator::Regex
                    | Operator::StartsWith
                    | Operator::EndsWith
            )
        )
    }
}

impl NodeVisitor for PrimaryKeyVisitor {
    fn name(&self) -> &str {
        "primary_key"
    }

    fn visit(&self, node: &FilterNode, _ctx: &VisitContext<'_>) -> QueryResult<VisitAction> {
        let field = match node.field_name() {
            Some(field) if field == self.id_alias || field == self.primary_key => field,
            _ => return Ok(VisitAction::Continue),
        };

        let value = if Self::coerces(node.operator()) && !node.value.is_null() {
            self.key_type.coerce(field, &node.value)?
        } else {
            node.value.clone()
        };

        Ok(VisitAction::Replace(rewrite_field(node, &self.primary_key, value)))
    }
}

/// Renames a field
#[derive(Debug, Clone)]
pub struct AliasVisitor {
    target: FieldTarget,
    to: String,
}

impl AliasVisitor {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            target: FieldTarget::new(from),
            to: to.into(),
        }
    }

    pub fn on_collection(mut self, collection: impl Into<String>) -> Self {
        self.target.collection = Some(collection.into());
        self
    }
}

impl NodeVisitor for AliasVisitor {
    fn name(&self) -> &str {
        "alias"
    }

    fn visit(&self, node: &FilterNode, _ctx: &VisitContext<'_>) -> QueryResult<VisitAction> {
        if !self.target.matches(node) {
            return Ok(VisitAction::Continue);
        }
        Ok(VisitAction::Replace(rewrite_field(node, &self.to, node.value.clone())))
    }
}

/// Flips a boolean field and renames it (`isPublic: true` → `isPrivate: false`)
#[derive(Debug, Clone)]
pub struct NegateVisitor {
    target: FieldTarget,
    to: String,
}

impl NegateVisitor {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            target: FieldTarget::new(from),
            to: to.into(),
        }
    }

    pub fn on_collection(mut self, collection: impl Into<String>) -> Self {
        self.target.collection = Some(collection.into());
        self
    }
}

impl NodeVisitor for NegateVisitor {
    fn name(&self) -> &str {
        "negate"
    }

    fn visit(&self, node: &FilterNode, _ctx: &VisitContext<'_>) -> QueryResult<VisitAction> {
        if !self.target.matches(node) {
            return Ok(VisitAction::Continue);
        }
        let flipped = node.value.as_bool().map(|b| !b).ok_or_else(|| {
            QueryError::coercion(&self.target.field, format!("expected a boolean, got {}", node.value))
        })?;
        Ok(VisitAction::Replace(rewrite_field(node, &self.to, Value::Bool(flipped))))
    }
}

/// Value parser used by `CoerceVisitor`
pub type CoerceFn = dyn Fn(&Value) -> QueryResult<Value> + Send + Sync;

/// Parses a field's raw value through a supplied function.
///
/// List operators (`in`, `between`, ...) have each element parsed.
#[derive(Clone)]
pub struct CoerceVisitor {
    target: FieldTarget,
    coerce: Arc<CoerceFn>,
}

impl CoerceVisitor {
    pub fn new<F>(field: impl Into<String>, coerce: F) -> Self
    where
        F: Fn(&Value) -> QueryResult<Value> + Send + Sync + 'static,
    {
        Self {
            target: FieldTarget::new(field),
            coerce: Arc::new(coerce),
        }
    }

    pub fn on_collection(mut self, collection: impl Into<String>) -> Self {
        self.target.collection = Some(collection.into());
        self
    }
}

impl NodeVisitor for CoerceVisitor {
    fn name(&self) -> &str {
        "coerce"
    }

    fn visit(&self, node: &FilterNode, _ctx: &VisitContext<'_>) -> QueryResult<VisitAction> {
        if !self.target.matches(node) {
            return Ok(VisitAction::Continue);
        }

        let value = match (&node.value, node.operator()) {
            (Value::Array(items), Some(op)) if op.takes_list() => Value::Array(
                items
                    .iter()
                    .map(|item| (self.coerce)(item))
                    .collect::<QueryResult<Vec<_>>>()?,
            ),
            (value, _) => (self.coerce)(value)?,
        };

        let mut coerced = node.clone();
        coerced.value = value;
        Ok(VisitAction::Replace(coerced))
    }
}

/// Attaches a custom compiler to a field
#[derive(Debug, Clone)]
pub struct CustomPredicateVisitor {
    target: FieldTarget,
    compiler: CustomCompiler,
}

impl CustomPredicateVisitor {
    pub fn new(field: impl Into<String>, compiler: CustomCompiler) -> Self {
        Self {
            target: FieldTarget::new(field),
            compiler,
        }
    }

    pub fn on_collection(mut self, collection: impl Into<String>) -> Self {
        self.target.collection = Some(collection.into());
        self
    }
}

impl NodeVisitor for CustomPredicateVisitor {
    fn name(&self) -> &str {
        "custom_predicate"
    }

    fn visit(&self, node: &FilterNode, _ctx: &VisitContext<'_>) -> QueryResult<VisitAction> {
        if !self.target.matches(node) {
            return Ok(VisitAction::Continue);
        }
        let mut annotated = node.clone();
        annotated.custom_compiler = Some(self.compiler.clone());
        Ok(VisitAction::Replace(annotated))
    }
}

/// Suppresses nodes by raw key (`isDeleted_not`) or by field name
#[derive(Debug, Clone)]
pub struct SuppressVisitor {
    key: Option<String>,
    target: Option<FieldTarget>,
}

impl SuppressVisitor {
    /// Matches the key exactly as written in the filter
    pub fn key(raw_key: impl Into<String>) -> Self {
        Self {
            key: Some(raw_key.into()),
            target: None,
        }
    }

    /// Matches any operator on a field
    pub fn field(field: impl Into<String>) -> Self {
        Self {
            key: None,
            target: Some(FieldTarget::new(field)),
        }
    }
}

impl NodeVisitor for SuppressVisitor {
    fn name(&self) -> &str {
        "suppress"
    }

    fn visit(&self, node: &FilterNode, _ctx: &VisitContext<'_>) -> QueryResult<VisitAction> {
        let hit = match (&self.key, &self.target) {
            (Some(key), _) => node.is_field() && &node.raw_key == key,
            (None, Some(target)) => target.matches(node),
            (None, None) => false,
        };
        Ok(if hit {
            VisitAction::Suppress
        } else {
            VisitAction::Continue
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AstBuilder;
    use crate::catalog::{InMemoryCatalog, RelationDescriptor};
    use crate::operators::OperatorRegistry;
    use crate::rewrite::RewritePipeline;
    use serde_json::json;

    fn rewrite(filter: Value, pipeline: RewritePipeline) -> QueryResult<Vec<FilterNode>> {
        let catalog = InMemoryCatalog::new()
            .with_relation("Post", RelationDescriptor::one("author", "User", "authorId", "_id"))
            .unwrap();
        let registry = OperatorRegistry::new();
        let builder = AstBuilder::new(&catalog, &registry, 8);
        let nodes = builder.parse_query(&filter, "Post")?;
        pipeline.apply(nodes, &builder)
    }

    #[test]
    fn test_primary_key_canonicalized() {
        let pipeline = RewritePipeline::new().with_visitor(PrimaryKeyVisitor::from_config(
            &QueryConfig::default(),
        ));

        let nodes = rewrite(
            json!({"id": "507f1f77bcf86cd799439011", "id_in": ["507f1f77bcf86cd799439012"]}),
            pipeline,
        )
        .unwrap();

        assert_eq!(nodes[0].field_name(), Some("_id"));
        assert_eq!(nodes[0].value, json!({"$oid": "507f1f77bcf86cd799439011"}));
        assert_eq!(nodes[1].operator(), Some(Operator::In));
        assert_eq!(nodes[1].value, json!([{"$oid": "507f1f77bcf86cd799439012"}]));
        assert_eq!(nodes[0].raw_key, "id");
    }

    #[test]
    fn test_primary_key_coercion_error() {
        let pipeline = RewritePipeline::new()
            .with_visitor(PrimaryKeyVisitor::new("id", "_id", KeyType::Int));
        let err = rewrite(json!({"id": "abc"}), pipeline).unwrap_err();

        assert!(err.is_coercion_error());
        assert!(!err.is_schema_error());
    }

    #[test]
    fn test_primary_key_inside_relation() {
        let pipeline = RewritePipeline::new()
            .with_visitor(PrimaryKeyVisitor::new("id", "_id", KeyType::Int));
        let nodes = rewrite(json!({"author": {"id": "7"}}), pipeline).unwrap();

        match &nodes[0].kind {
            NodeKind::Relation { children, .. } => {
                assert_eq!(children[0].field_name(), Some("_id"));
                assert_eq!(children[0].value, json!(7));
            }
            other => panic!("expected relation, got {:?}", other),
        }
    }

    #[test]
    fn test_alias_keeps_operator() {
        let pipeline = RewritePipeline::new().with_visitor(AliasVisitor::new("created", "createdAt"));
        let nodes = rewrite(json!({"created_gte": 5}), pipeline).unwrap();

        assert_eq!(nodes[0].field_name(), Some("createdAt"));
        assert_eq!(nodes[0].operator(), Some(Operator::Gte));
    }

    #[test]
    fn test_alias_scoped_to_collection() {
        let pipeline = RewritePipeline::new()
            .with_visitor(AliasVisitor::new("name", "fullName").on_collection("User"));
        let nodes = rewrite(json!({"name": "post", "author": {"name": "Ann"}}), pipeline).unwrap();

        assert_eq!(nodes[0].field_name(), Some("name"));
        match &nodes[1].kind {
            NodeKind::Relation { children, .. } => {
                assert_eq!(children[0].field_name(), Some("fullName"))
            }
            other => panic!("expected relation, got {:?}", other),
        }
    }

    #[test]
    fn test_negate() {
        let pipeline = RewritePipeline::new().with_visitor(NegateVisitor::new("isPublic", "isPrivate"));
        let nodes = rewrite(json!({"isPublic": true}), pipeline.clone()).unwrap();

        assert_eq!(nodes[0].field_name(), Some("isPrivate"));
        assert_eq!(nodes[0].value, json!(false));

        let err = rewrite(json!({"isPublic": "yes"}), pipeline).unwrap_err();
        assert!(err.is_coercion_error());
    }

    #[test]
    fn test_coerce_maps_list_operands() {
        let pipeline = RewritePipeline::new().with_visitor(CoerceVisitor::new("views", |v: &Value| {
            v.as_str()
                .and_then(|s| s.parse::<i64>().ok())
                .map(|n| json!(n))
                .ok_or_else(|| QueryError::coercion("views", "not a number"))
        }));

        let nodes = rewrite(json!({"views_between": ["1", "9"], "views": "3"}), pipeline).unwrap();
        assert_eq!(nodes[0].value, json!([1, 9]));
        assert_eq!(nodes[1].value, json!(3));
    }

    #[test]
    fn test_custom_predicate_attached() {
        let compiler = CustomCompiler::new("text_search", |node, acc, _, _| {
            acc.insert("$text".into(), json!({"$search": node.value}));
            Ok(())
        });
        let pipeline = RewritePipeline::new().with_visitor(CustomPredicateVisitor::new("q", compiler));
        let nodes = rewrite(json!({"q": "rust"}), pipeline).unwrap();

        assert_eq!(nodes[0].custom_compiler.as_ref().map(|c| c.name()), Some("text_search"));
    }

    #[test]
    fn test_suppress_by_key_and_field() {
        let pipeline = RewritePipeline::new()
            .with_visitor(SuppressVisitor::key("isDeleted_not"))
            .with_visitor(SuppressVisitor::field("draft"));
        let nodes = rewrite(
            json!({"isDeleted_not": true, "isDeleted": false, "draft_in": [true]}),
            pipeline,
        )
        .unwrap();

        assert!(nodes[0].suppressed);
        assert!(!nodes[1].suppressed);
        assert!(nodes[2].suppressed);
    }
}
