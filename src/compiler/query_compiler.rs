//! Filter → staged pipeline
//!
//! Stage order for a filter:
//! 1. one match for every node that needs no join
//! 2. the joins required by relation-bearing nodes (relations, and groups
//!    that embed a relation), parents before children
//! 3. one match for the relation-bearing nodes, over the join aliases
//!
//! Plain predicates run first so the store narrows the input before joining.

use serde_json::{Map, Value};

use crate::ast::{tree_embeds_relation, AstBuilder, FilterNode, NodeKind};
use crate::catalog::RelationCatalog;
use crate::config::QueryConfig;
use crate::errors::{QueryError, QueryResult};
use crate::observability::{log_event_with_fields, Event};
use crate::operators::OperatorRegistry;
use crate::pipeline::{JoinParent, LookupOptions, PipelineBuilder};
use crate::rewrite::RewritePipeline;

use super::ast_compiler::AstCompiler;

/// Outcome of compiling a filter
#[derive(Debug)]
pub enum CompiledFilter<'a> {
    /// No join and no injected stage: a plain predicate
    Predicate(Map<String, Value>),
    /// Stages ready for pagination
    Staged(PipelineBuilder<'a>),
}

/// Parses, rewrites and compiles filters for one configuration
pub struct QueryCompiler<'a> {
    catalog: &'a dyn RelationCatalog,
    registry: &'a OperatorRegistry,
    rewrite: &'a RewritePipeline,
    config: &'a QueryConfig,
}

impl<'a> QueryCompiler<'a> {
    pub fn new(
        catalog: &'a dyn RelationCatalog,
        registry: &'a OperatorRegistry,
        rewrite: &'a RewritePipeline,
        config: &'a QueryConfig,
    ) -> Self {
        Self {
            catalog,
            registry,
            rewrite,
            config,
        }
    }

    pub fn config(&self) -> &'a QueryConfig {
        self.config
    }

    /// Empty pipeline carrying the configured options
    pub fn new_pipeline(&self, collection: &str) -> PipelineBuilder<'a> {
        PipelineBuilder::new(collection, self.catalog)
            .with_deduplication(self.config.deduplicate_joins)
            .with_options(self.config.pipeline_options.clone())
    }

    /// Builds the AST and runs the rewrite visitors over it
    pub fn parse(&self, filter: &Value, collection: &str) -> QueryResult<Vec<FilterNode>> {
        let builder = AstBuilder::new(self.catalog, self.registry, self.config.max_depth);
        let nodes = builder.parse_query(filter, collection)?;
        self.rewrite.apply(nodes, &builder)
    }

    /// Compiles a filter, keeping the join-free case out of the pipeline
    pub fn compile(&self, filter: &Value, collection: &str) -> QueryResult<CompiledFilter<'a>> {
        let nodes = self.parse(filter, collection)?;
        let mut pipeline = self.new_pipeline(collection);

        if tree_embeds_relation(&nodes) {
            self.compile_into(&nodes, &mut pipeline)?;
            return Ok(CompiledFilter::Staged(pipeline));
        }

        let predicate = AstCompiler::compile(&nodes, "", &mut pipeline)?;
        if pipeline.is_empty() {
            return Ok(CompiledFilter::Predicate(predicate));
        }

        // a custom compiler injected stages
        pipeline.match_(predicate);
        Ok(CompiledFilter::Staged(pipeline))
    }

    /// Compiles a filter into pipeline stages unconditionally
    pub fn compile_pipeline(&self, filter: &Value, collection: &str) -> QueryResult<PipelineBuilder<'a>> {
        match self.compile(filter, collection)? {
            CompiledFilter::Staged(pipeline) => Ok(pipeline),
            CompiledFilter::Predicate(predicate) => {
                let mut pipeline = self.new_pipeline(collection);
                pipeline.match_(predicate);
                Ok(pipeline)
            }
        }
    }

    /// Appends the stages for an already rewritten tree
    pub fn compile_into(&self, nodes: &[FilterNode], pipeline: &mut PipelineBuilder<'a>) -> QueryResult<()> {
        let (relational, plain): (Vec<FilterNode>, Vec<FilterNode>) =
            nodes.iter().cloned().partition(FilterNode::embeds_relation);

        let predicate = AstCompiler::compile(&plain, "", pipeline)?;
        pipeline.match_(predicate);

        stage_joins(&relational, "", pipeline)?;

        let predicate = AstCompiler::compile(&relational, "", pipeline)?;
        pipeline.match_(predicate);
        Ok(())
    }
}

/// Stages every join the nodes reach, parents first
fn stage_joins(nodes: &[FilterNode], path: &str, pipeline: &mut PipelineBuilder<'_>) -> QueryResult<()> {
    for node in nodes {
        if !node.has_effect() || node.custom_compiler.is_some() {
            continue;
        }

        match &node.kind {
            NodeKind::Relation { relation, children } => {
                let options = if path.is_empty() {
                    LookupOptions::default()
                } else {
                    LookupOptions {
                        parent: Some(JoinParent {
                            collection: node.collection.clone(),
                            path: path.to_string(),
                        }),
                        ..Default::default()
                    }
                };

                pipeline
                    .lookup(&relation.name, options)
                    .map_err(catalog_disagreement)?;

                let alias = if path.is_empty() {
                    relation.name.clone()
                } else {
                    format!("{}.{}", path, relation.name)
                };
                stage_joins(children, &alias, pipeline)?;
            }
            NodeKind::Logical { branches, .. } => {
                for branch in branches {
                    stage_joins(branch, path, pipeline)?;
                }
            }
            NodeKind::Field { .. } => {}
        }
    }
    Ok(())
}

/// The builder validated this relation during parse; a lookup miss now means
/// the catalog changed underneath the query.
fn catalog_disagreement(error: QueryError) -> QueryError {
    match error {
        QueryError::UnknownRelation { collection, relation } => {
            log_event_with_fields(
                Event::CatalogInconsistent,
                &[("collection", collection.as_str()), ("relation", relation.as_str())],
            );
            QueryError::CatalogInconsistent {
                collection,
                relation,
            }
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{InMemoryCatalog, RelationDescriptor};
    use crate::pipeline::{LookupStage, PipelineStage};
    use crate::rewrite::SuppressVisitor;
    use serde_json::json;

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::new()
            .with_relation("Post", RelationDescriptor::one("author", "User", "authorId", "_id"))
            .unwrap()
            .with_relation("Post", RelationDescriptor::many("comments", "Comment", "_id", "postId"))
            .unwrap()
            .with_relation("User", RelationDescriptor::one("company", "Company", "companyId", "_id"))
            .unwrap()
    }

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn stages(filter: Value, rewrite: &RewritePipeline) -> Vec<PipelineStage> {
        let catalog = catalog();
        let registry = OperatorRegistry::new();
        let config = QueryConfig::default();
        let compiler = QueryCompiler::new(&catalog, &registry, rewrite, &config);
        compiler.compile_pipeline(&filter, "Post").unwrap().build().stages
    }

    #[test]
    fn test_one_to_one_relation_scenario() {
        let stages = stages(json!({"author": {"name": "Ann"}}), &RewritePipeline::new());

        assert_eq!(
            stages,
            vec![
                PipelineStage::Lookup(LookupStage {
                    relation: RelationDescriptor::one("author", "User", "authorId", "_id"),
                    alias: "author".into(),
                    local_field: "authorId".into(),
                }),
                PipelineStage::FoldOne("author".into()),
                PipelineStage::Match(object(json!({"author.name": "Ann"}))),
            ]
        );
    }

    #[test]
    fn test_plain_match_precedes_joins() {
        let stages = stages(
            json!({"author": {"name": "Ann"}, "status": "DRAFT"}),
            &RewritePipeline::new(),
        );

        assert_eq!(stages[0], PipelineStage::Match(object(json!({"status": "DRAFT"}))));
        assert!(matches!(stages[1], PipelineStage::Lookup(_)));
        assert_eq!(stages[3], PipelineStage::Match(object(json!({"author.name": "Ann"}))));
    }

    #[test]
    fn test_group_embedding_relation_deferred() {
        let stages = stages(
            json!({"or": [{"status": "DRAFT"}, {"author": {"name": "Ann"}}]}),
            &RewritePipeline::new(),
        );

        assert_eq!(stages.len(), 3);
        assert!(matches!(stages[0], PipelineStage::Lookup(_)));
        assert_eq!(
            stages[2],
            PipelineStage::Match(object(json!({"$or": [{"status": "DRAFT"}, {"author.name": "Ann"}]})))
        );
    }

    #[test]
    fn test_repeated_relation_single_join() {
        let stages = stages(
            json!({
                "author": {"name": "Ann"},
                "or": [{"author": {"age_gt": 30}}, {"and": [{"author": {"age_lt": 20}}]}]
            }),
            &RewritePipeline::new(),
        );

        let lookups = stages
            .iter()
            .filter(|s| matches!(s, PipelineStage::Lookup(_)))
            .count();
        assert_eq!(lookups, 1);
    }

    #[test]
    fn test_nested_relation_joins_parent_first() {
        let stages = stages(
            json!({"author": {"company": {"name": "Acme"}}}),
            &RewritePipeline::new(),
        );

        let aliases: Vec<&str> = stages
            .iter()
            .filter_map(|s| match s {
                PipelineStage::Lookup(l) => Some(l.alias.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(aliases, vec!["author", "author.company"]);
        assert_eq!(
            stages.last(),
            Some(&PipelineStage::Match(object(json!({"author.company.name": "Acme"}))))
        );
    }

    #[test]
    fn test_suppressed_relation_stages_nothing() {
        let rewrite = RewritePipeline::new().with_visitor(SuppressVisitor::field("name"));
        let stages = stages(json!({"author": {"name": "Ann"}}), &rewrite);
        assert!(stages.is_empty());
    }

    #[test]
    fn test_object_id_equality_and_negation_kept_apart() {
        use crate::rewrite::PrimaryKeyVisitor;

        let catalog = catalog();
        let registry = OperatorRegistry::new();
        let config = QueryConfig::default();
        let rewrite = RewritePipeline::new().with_visitor(PrimaryKeyVisitor::from_config(&config));
        let compiler = QueryCompiler::new(&catalog, &registry, &rewrite, &config);

        let compiled = compiler
            .compile(
                &json!({"id": "507f1f77bcf86cd799439011", "id_not": "507f1f77bcf86cd799439012"}),
                "Post",
            )
            .unwrap();
        match compiled {
            CompiledFilter::Predicate(predicate) => assert_eq!(
                Value::Object(predicate),
                json!({
                    "_id": {"$oid": "507f1f77bcf86cd799439011"},
                    "$and": [{"_id": {"$ne": {"$oid": "507f1f77bcf86cd799439012"}}}]
                })
            ),
            other => panic!("expected predicate, got {:?}", other),
        }
    }

    #[test]
    fn test_join_free_filter_stays_predicate() {
        let catalog = catalog();
        let registry = OperatorRegistry::new();
        let config = QueryConfig::default();
        let rewrite = RewritePipeline::new();
        let compiler = QueryCompiler::new(&catalog, &registry, &rewrite, &config);

        let compiled = compiler
            .compile(&json!({"or": [{"status": "DRAFT"}, {"status": "PUBLISHED"}]}), "Post")
            .unwrap();
        match compiled {
            CompiledFilter::Predicate(predicate) => assert_eq!(
                Value::Object(predicate),
                json!({"$or": [{"status": "DRAFT"}, {"status": "PUBLISHED"}]})
            ),
            other => panic!("expected predicate, got {:?}", other),
        }
    }

    #[test]
    fn test_custom_compiler_stage_injection_forces_pipeline() {
        use crate::ast::CustomCompiler;
        use crate::rewrite::CustomPredicateVisitor;

        let near = CustomCompiler::new("recent_comments", |node, _acc, _ns, pipeline| {
            let extra = object(json!({"createdAt": {"$gt": node.value.clone()}}));
            pipeline.lookup("comments", LookupOptions::default().with_extra_match(extra))?;
            Ok(())
        });
        let rewrite = RewritePipeline::new().with_visitor(CustomPredicateVisitor::new("recent", near));

        let catalog = catalog();
        let registry = OperatorRegistry::new();
        let config = QueryConfig::default();
        let compiler = QueryCompiler::new(&catalog, &registry, &rewrite, &config);

        match compiler.compile(&json!({"recent": 5, "status": "A"}), "Post").unwrap() {
            CompiledFilter::Staged(pipeline) => {
                let stages = pipeline.build().stages;
                assert!(matches!(stages[0], PipelineStage::Lookup(_)));
                assert_eq!(stages.last(), Some(&PipelineStage::Match(object(json!({"status": "A"})))));
            }
            other => panic!("expected staged, got {:?}", other),
        }
    }

    /// Catalog that forgets relations after the first lookup
    struct ForgetfulCatalog {
        inner: InMemoryCatalog,
        calls: std::sync::atomic::AtomicUsize,
    }

    impl RelationCatalog for ForgetfulCatalog {
        fn relation(&self, collection: &str, name: &str) -> Option<&RelationDescriptor> {
            let n = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if n == 0 {
                self.inner.relation(collection, name)
            } else {
                None
            }
        }
    }

    #[test]
    fn test_catalog_disagreement_is_internal_error() {
        let catalog = ForgetfulCatalog {
            inner: catalog(),
            calls: std::sync::atomic::AtomicUsize::new(0),
        };
        let registry = OperatorRegistry::new();
        let config = QueryConfig::default();
        let rewrite = RewritePipeline::new();
        let compiler = QueryCompiler::new(&catalog, &registry, &rewrite, &config);

        let err = compiler
            .compile(&json!({"author": {"name": "Ann"}}), "Post")
            .unwrap_err();
        assert_eq!(err.code().code(), "AERO_QUERY_CATALOG_INCONSISTENT");
        assert!(!err.is_schema_error());
    }
}
