//! Stage accumulator with relation-aware joins
//!
//! Every operation returns the builder for chaining. Stages are only ever
//! appended; corrections are made by appending further stages.

use std::fmt;

use serde_json::{Map, Value};

use crate::catalog::RelationCatalog;
use crate::errors::{QueryError, QueryResult};
use crate::observability::{log_event_with_fields, Event};

use super::stage::{LookupStage, Pipeline, PipelineStage, SortDirection, SortSpec};

/// Owner of a nested join
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinParent {
    /// Collection that declares the relation
    pub collection: String,
    /// Alias path of the parent join (`author`, `author.company`)
    pub path: String,
}

/// Options for `PipelineBuilder::lookup`
#[derive(Debug, Clone, Default)]
pub struct LookupOptions {
    /// Output field; defaults to the relation name under the parent path
    pub alias: Option<String>,
    /// Predicate on the joined document, relative to the alias
    pub extra_match: Option<Map<String, Value>>,
    /// Overrides the builder's deduplication default
    pub deduplicate: Option<bool>,
    /// Set for relations declared on a joined collection
    pub parent: Option<JoinParent>,
}

impl LookupOptions {
    pub fn alias(alias: impl Into<String>) -> Self {
        Self {
            alias: Some(alias.into()),
            ..Default::default()
        }
    }

    pub fn nested(collection: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            parent: Some(JoinParent {
                collection: collection.into(),
                path: path.into(),
            }),
            ..Default::default()
        }
    }

    pub fn with_extra_match(mut self, predicate: Map<String, Value>) -> Self {
        self.extra_match = Some(predicate);
        self
    }

    pub fn without_deduplication(mut self) -> Self {
        self.deduplicate = Some(false);
        self
    }
}

/// In-progress pipeline for one query invocation
#[derive(Clone)]
pub struct PipelineBuilder<'a> {
    collection: String,
    catalog: &'a dyn RelationCatalog,
    stages: Vec<PipelineStage>,
    deduplicate: bool,
    options: Map<String, Value>,
    joins_staged: u64,
    joins_deduplicated: u64,
}

impl fmt::Debug for PipelineBuilder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("collection", &self.collection)
            .field("stages", &self.stages)
            .field("deduplicate", &self.deduplicate)
            .finish()
    }
}

impl<'a> PipelineBuilder<'a> {
    /// Creates an empty builder rooted at `collection`
    pub fn new(collection: impl Into<String>, catalog: &'a dyn RelationCatalog) -> Self {
        Self {
            collection: collection.into(),
            catalog,
            stages: Vec::new(),
            deduplicate: true,
            options: Map::new(),
            joins_staged: 0,
            joins_deduplicated: 0,
        }
    }

    /// Sets the default for `LookupOptions::deduplicate`
    pub fn with_deduplication(mut self, deduplicate: bool) -> Self {
        self.deduplicate = deduplicate;
        self
    }

    /// Sets the options forwarded with the finished pipeline
    pub fn with_options(mut self, options: Map<String, Value>) -> Self {
        self.options = options;
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn catalog(&self) -> &'a dyn RelationCatalog {
        self.catalog
    }

    pub fn stages(&self) -> &[PipelineStage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Lookup stages appended so far
    pub fn joins_staged(&self) -> u64 {
        self.joins_staged
    }

    /// Lookup calls collapsed onto an existing stage
    pub fn joins_deduplicated(&self) -> u64 {
        self.joins_deduplicated
    }

    /// Returns true if a lookup under `alias` has been staged
    pub fn has_join(&self, alias: &str) -> bool {
        self.stages
            .iter()
            .any(|stage| matches!(stage, PipelineStage::Lookup(l) if l.alias == alias))
    }

    /// Appends a match stage; empty predicates are ignored
    pub fn match_(&mut self, predicate: Map<String, Value>) -> &mut Self {
        if !predicate.is_empty() {
            self.stages.push(PipelineStage::Match(predicate));
        }
        self
    }

    /// Stages a join for `relation_name`.
    ///
    /// A relation the catalog does not know is a programming error and
    /// fails immediately. With deduplication on, a join with the same
    /// descriptor and alias is staged once; repeated calls only add their
    /// `extra_match`.
    pub fn lookup(&mut self, relation_name: &str, options: LookupOptions) -> QueryResult<&mut Self> {
        let (owner, prefix) = match &options.parent {
            Some(parent) => (parent.collection.as_str(), Some(parent.path.as_str())),
            None => (self.collection.as_str(), None),
        };

        let relation = self
            .catalog
            .relation(owner, relation_name)
            .ok_or_else(|| QueryError::unknown_relation(owner, relation_name))?
            .clone();

        let (alias, local_field) = match prefix {
            Some(path) if !path.is_empty() => (
                format!("{}.{}", path, relation_name),
                format!("{}.{}", path, relation.local_field),
            ),
            _ => (relation_name.to_string(), relation.local_field.clone()),
        };
        let alias = options.alias.unwrap_or(alias);
        let deduplicate = options.deduplicate.unwrap_or(self.deduplicate);

        let already_staged = self.stages.iter().any(|stage| {
            matches!(stage, PipelineStage::Lookup(l) if l.relation == relation && l.alias == alias)
        });

        if deduplicate && already_staged {
            self.joins_deduplicated += 1;
            log_event_with_fields(
                Event::JoinDeduplicated,
                &[("relation", relation_name), ("alias", alias.as_str())],
            );
        } else {
            log_event_with_fields(
                Event::JoinStaged,
                &[
                    ("relation", relation_name),
                    ("from", relation.target_collection.as_str()),
                    ("alias", alias.as_str()),
                ],
            );
            let fold = relation.is_one();
            self.stages.push(PipelineStage::Lookup(LookupStage {
                relation,
                alias: alias.clone(),
                local_field,
            }));
            if fold {
                self.stages.push(PipelineStage::FoldOne(alias.clone()));
            }
            self.joins_staged += 1;
        }

        if let Some(predicate) = options.extra_match {
            let scoped = namespace_predicate(&predicate, &format!("{}.", alias));
            self.match_(scoped);
        }

        Ok(self)
    }

    /// Appends a projection
    pub fn project(&mut self, fields: Map<String, Value>) -> &mut Self {
        if !fields.is_empty() {
            self.stages.push(PipelineStage::Project(fields));
        }
        self
    }

    /// Appends a sort from `{field: token}` pairs
    pub fn sort(&mut self, order: &Map<String, Value>) -> &mut Self {
        let specs = order
            .iter()
            .map(|(field, token)| SortSpec {
                field: field.clone(),
                direction: SortDirection::from_token(token),
            })
            .collect();
        self.sort_by(specs)
    }

    /// Appends a sort from already-normalized specs
    pub fn sort_by(&mut self, specs: Vec<SortSpec>) -> &mut Self {
        if !specs.is_empty() {
            self.stages.push(PipelineStage::Sort(specs));
        }
        self
    }

    pub fn skip(&mut self, n: u64) -> &mut Self {
        self.stages.push(PipelineStage::Skip(n));
        self
    }

    pub fn limit(&mut self, n: u64) -> &mut Self {
        self.stages.push(PipelineStage::Limit(n));
        self
    }

    /// Appends a count into `output_field`
    pub fn count(&mut self, output_field: impl Into<String>) -> &mut Self {
        self.stages.push(PipelineStage::Count(output_field.into()));
        self
    }

    /// Finishes the builder into an immutable pipeline
    pub fn build(self) -> Pipeline {
        Pipeline {
            collection: self.collection,
            stages: self.stages,
            options: self.options,
        }
    }
}

/// Prefixes every field path in a predicate with `prefix`.
///
/// Logical operators (`$and`, `$or`, `$nor`) are descended into; operator
/// documents under a field are left untouched.
pub fn namespace_predicate(predicate: &Map<String, Value>, prefix: &str) -> Map<String, Value> {
    let mut scoped = Map::new();
    for (key, value) in predicate {
        if key.starts_with('$') {
            let value = match value {
                Value::Array(branches) => Value::Array(
                    branches
                        .iter()
                        .map(|branch| match branch {
                            Value::Object(map) => Value::Object(namespace_predicate(map, prefix)),
                            other => other.clone(),
                        })
                        .collect(),
                ),
                other => other.clone(),
            };
            scoped.insert(key.clone(), value);
        } else {
            scoped.insert(format!("{}{}", prefix, key), value.clone());
        }
    }
    scoped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{InMemoryCatalog, RelationDescriptor};
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

    #[test]
    fn test_empty_match_is_noop() {
        let catalog = catalog();
        let mut builder = PipelineBuilder::new("Post", &catalog);
        builder.match_(Map::new());
        assert!(builder.is_empty());

        builder.match_(object(json!({"status": "DRAFT"})));
        assert_eq!(builder.len(), 1);
    }

    #[test]
    fn test_one_to_one_lookup_folds() {
        let catalog = catalog();
        let mut builder = PipelineBuilder::new("Post", &catalog);
        builder.lookup("author", LookupOptions::default()).unwrap();

        let stages = builder.stages();
        assert_eq!(stages.len(), 2);
        assert!(matches!(&stages[0], PipelineStage::Lookup(l) if l.alias == "author"));
        assert_eq!(stages[1], PipelineStage::FoldOne("author".into()));
    }

    #[test]
    fn test_one_to_many_lookup_does_not_fold() {
        let catalog = catalog();
        let mut builder = PipelineBuilder::new("Post", &catalog);
        builder.lookup("comments", LookupOptions::default()).unwrap();
        assert_eq!(builder.len(), 1);
    }

    #[test]
    fn test_lookup_is_idempotent() {
        let catalog = catalog();
        let mut builder = PipelineBuilder::new("Post", &catalog);
        for _ in 0..3 {
            builder.lookup("author", LookupOptions::default()).unwrap();
        }

        assert_eq!(builder.build().lookup_count(), 1);
    }

    #[test]
    fn test_distinct_alias_is_new_join() {
        let catalog = catalog();
        let mut builder = PipelineBuilder::new("Post", &catalog);
        builder.lookup("author", LookupOptions::default()).unwrap();
        builder.lookup("author", LookupOptions::alias("writer")).unwrap();

        assert_eq!(builder.joins_staged(), 2);
        assert!(builder.has_join("writer"));
    }

    #[test]
    fn test_deduplication_can_be_disabled() {
        let catalog = catalog();
        let mut builder = PipelineBuilder::new("Post", &catalog).with_deduplication(false);
        builder.lookup("comments", LookupOptions::default()).unwrap();
        builder.lookup("comments", LookupOptions::default()).unwrap();
        assert_eq!(builder.joins_staged(), 2);

        let mut builder = PipelineBuilder::new("Post", &catalog);
        builder.lookup("comments", LookupOptions::default()).unwrap();
        builder
            .lookup("comments", LookupOptions::default().without_deduplication())
            .unwrap();
        assert_eq!(builder.joins_staged(), 2);
    }

    #[test]
    fn test_unknown_relation_fails_fast() {
        let catalog = catalog();
        let mut builder = PipelineBuilder::new("Post", &catalog);
        let err = builder.lookup("editor", LookupOptions::default()).unwrap_err();

        assert_eq!(err.code().code(), "AERO_QUERY_UNKNOWN_RELATION");
        assert!(builder.is_empty());
    }

    #[test]
    fn test_extra_match_scoped_to_alias() {
        let catalog = catalog();
        let mut builder = PipelineBuilder::new("Post", &catalog);
        builder
            .lookup(
                "comments",
                LookupOptions::default().with_extra_match(object(json!({"approved": true}))),
            )
            .unwrap();

        assert_eq!(
            builder.stages()[1],
            PipelineStage::Match(object(json!({"comments.approved": true})))
        );
    }

    #[test]
    fn test_deduplicated_lookup_keeps_extra_match() {
        let catalog = catalog();
        let mut builder = PipelineBuilder::new("Post", &catalog);
        builder.lookup("comments", LookupOptions::default()).unwrap();
        builder
            .lookup(
                "comments",
                LookupOptions::default().with_extra_match(object(json!({"approved": true}))),
            )
            .unwrap();

        assert_eq!(builder.joins_deduplicated(), 1);
        assert_eq!(builder.len(), 2);
    }

    #[test]
    fn test_nested_lookup_paths() {
        let catalog = catalog();
        let mut builder = PipelineBuilder::new("Post", &catalog);
        builder.lookup("author", LookupOptions::default()).unwrap();
        builder
            .lookup("company", LookupOptions::nested("User", "author"))
            .unwrap();

        match &builder.stages()[2] {
            PipelineStage::Lookup(lookup) => {
                assert_eq!(lookup.alias, "author.company");
                assert_eq!(lookup.local_field, "author.companyId");
                assert_eq!(lookup.relation.target_collection, "Company");
            }
            other => panic!("expected lookup, got {:?}", other),
        }
        assert_eq!(builder.stages()[3], PipelineStage::FoldOne("author.company".into()));
    }

    #[test]
    fn test_sort_normalizes_tokens() {
        let catalog = catalog();
        let mut builder = PipelineBuilder::new("Post", &catalog);
        builder.sort(&object(json!({"createdAt": "DESC", "title": "asc", "views": 1, "x": 0})));

        assert_eq!(
            builder.stages()[0],
            PipelineStage::Sort(vec![
                SortSpec::desc("createdAt"),
                SortSpec::asc("title"),
                SortSpec::asc("views"),
                SortSpec::desc("x"),
            ])
        );
    }

    #[test]
    fn test_project_keeps_fields() {
        let catalog = catalog();
        let mut builder = PipelineBuilder::new("Post", &catalog);
        builder
            .project(object(json!({"title": 1, "author": 1})))
            .project(Map::new());

        assert_eq!(builder.len(), 1);
        assert_eq!(
            builder.build().to_documents(),
            vec![json!({"$project": {"title": 1, "author": 1}})]
        );
    }

    #[test]
    fn test_clone_is_independent() {
        let catalog = catalog();
        let mut builder = PipelineBuilder::new("Post", &catalog);
        builder.match_(object(json!({"status": "DRAFT"})));

        let mut counter = builder.clone();
        counter.count("count");
        builder.skip(10).limit(5);

        assert_eq!(counter.len(), 2);
        assert_eq!(builder.len(), 3);
        assert_eq!(counter.stages()[1], PipelineStage::Count("count".into()));
    }

    #[test]
    fn test_namespace_predicate_descends_logical() {
        let scoped = namespace_predicate(
            &object(json!({"name": "Ann", "$or": [{"age": {"$gt": 1}}]})),
            "author.",
        );
        assert_eq!(
            Value::Object(scoped),
            json!({"author.name": "Ann", "$or": [{"author.age": {"$gt": 1}}]})
        );
    }

    #[test]
    fn test_build_carries_options() {
        let catalog = catalog();
        let options = object(json!({"allowDiskUse": true}));
        let mut builder = PipelineBuilder::new("Post", &catalog).with_options(options.clone());
        builder.limit(1);
        let pipeline = builder.build();
        assert_eq!(pipeline.options, options);
        assert_eq!(pipeline.collection, "Post");
    }
}
