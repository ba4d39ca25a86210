//! Pagination Matrix Tests
//!
//! Covers every sort direction / page side combination, the placement of
//! the sort stage relative to the pivot match and the window stages, and
//! the rejection of `last`.

use std::sync::{Arc, Mutex};

use serde_json::{json, Map, Value};

use aeroquery::catalog::{InMemoryCatalog, RelationCatalog, RelationDescriptor};
use aeroquery::config::{KeyType, QueryConfig};
use aeroquery::pagination::{OrderBy, PaginationArgs, PaginationCompiler};
use aeroquery::pipeline::{Pipeline, PipelineBuilder, PipelineStage, SortSpec};
use aeroquery::repository::{Cursor, FindRequest, QueryOrchestrator, StoreExecutor, StoreFuture};

fn catalog() -> InMemoryCatalog {
    InMemoryCatalog::new()
        .with_relation("Post", RelationDescriptor::one("author", "User", "authorId", "_id"))
        .unwrap()
}

fn pivot() -> Value {
    json!({"_id": 7, "createdAt": 100, "title": "pivot"})
}

fn pivot_match(args: &PaginationArgs) -> Value {
    let window = PaginationCompiler::new("_id").window(args, Some(&pivot())).unwrap();
    Value::Object(window.pivot_match)
}

fn position(stages: &[PipelineStage], name: &str) -> usize {
    stages
        .iter()
        .position(|stage| stage.name() == name)
        .unwrap_or_else(|| panic!("no {} stage in {:?}", name, stages))
}

// =============================================================================
// DIRECTION MATRIX
// =============================================================================

#[test]
fn test_desc_after_pages_backwards() {
    let args = PaginationArgs::first(10)
        .order_by(OrderBy::desc("createdAt"))
        .after(json!(7));
    assert_eq!(pivot_match(&args), json!({"createdAt": {"$lt": 100}}));
}

#[test]
fn test_desc_before_pages_forwards() {
    let args = PaginationArgs::first(10)
        .order_by(OrderBy::desc("createdAt"))
        .before(json!(7));
    assert_eq!(pivot_match(&args), json!({"createdAt": {"$gt": 100}}));
}

#[test]
fn test_asc_after_pages_forwards() {
    let args = PaginationArgs::first(10)
        .order_by(OrderBy::asc("createdAt"))
        .after(json!(7));
    assert_eq!(pivot_match(&args), json!({"createdAt": {"$gt": 100}}));
}

#[test]
fn test_asc_before_pages_backwards() {
    let args = PaginationArgs::first(10)
        .order_by(OrderBy::asc("createdAt"))
        .before(json!(7));
    assert_eq!(pivot_match(&args), json!({"createdAt": {"$lt": 100}}));
}

#[test]
fn test_order_by_parsed_from_caller_json() {
    let args: PaginationArgs = serde_json::from_value(json!({
        "first": 10,
        "after": 7,
        "orderBy": [{"field": "createdAt", "order": "desc"}]
    }))
    .unwrap();
    assert_eq!(pivot_match(&args), json!({"createdAt": {"$lt": 100}}));
}

#[test]
fn test_no_order_by_pages_on_primary_key() {
    let args = PaginationArgs::first(10).before(json!(7));
    assert_eq!(pivot_match(&args), json!({"_id": {"$lt": 7}}));
}

// =============================================================================
// STAGE ORDERING
// =============================================================================

/// Test: sort lands after the pivot match and before skip and limit, for
/// every direction/side combination.
#[test]
fn test_sort_between_pivot_match_and_window() {
    let catalog = catalog();
    let orders = [OrderBy::asc("createdAt"), OrderBy::desc("createdAt")];

    for order in orders {
        for after in [true, false] {
            let args = PaginationArgs::first(5).with_skip(2).order_by(order.clone());
            let args = if after {
                args.after(json!(7))
            } else {
                args.before(json!(7))
            };

            let mut builder = PipelineBuilder::new("Post", &catalog);
            PaginationCompiler::new("_id")
                .apply(&mut builder, &args, Some(&pivot()))
                .unwrap();
            let stages = builder.build().stages;

            let matched = position(&stages, "match");
            let sorted = position(&stages, "sort");
            assert!(matched < sorted);
            assert!(sorted < position(&stages, "skip"));
            assert!(sorted < position(&stages, "limit"));
            assert_eq!(stages[sorted], PipelineStage::Sort(vec![order.to_sort_spec()]));
        }
    }
}

// =============================================================================
// REJECTION OF LAST
// =============================================================================

#[test]
fn test_last_rejected_without_stages() {
    let catalog = catalog();
    let mut builder = PipelineBuilder::new("Post", &catalog);
    let args = PaginationArgs {
        last: Some(3),
        ..Default::default()
    };

    let err = PaginationCompiler::new("_id")
        .apply(&mut builder, &args, None)
        .unwrap_err();
    assert_eq!(err.code().code(), "AERO_QUERY_UNSUPPORTED");
    assert!(err.to_string().contains("not supported"));
    assert!(builder.is_empty());
}

/// Store serving one pivot document and recording pipelines
#[derive(Default)]
struct PivotStore {
    pipelines: Mutex<Vec<Pipeline>>,
    lookups: Mutex<Vec<Value>>,
}

impl StoreExecutor for PivotStore {
    fn aggregate(&self, pipeline: Pipeline) -> StoreFuture<'_, Cursor> {
        Box::pin(async move {
            self.pipelines.lock().unwrap().push(pipeline);
            let cursor: Cursor = Box::new(Vec::<Value>::new().into_iter());
            Ok(cursor)
        })
    }

    fn find(&self, _request: FindRequest) -> StoreFuture<'_, Cursor> {
        Box::pin(async {
            let cursor: Cursor = Box::new(Vec::<Value>::new().into_iter());
            Ok(cursor)
        })
    }

    fn count_documents(&self, _collection: &str, _filter: Map<String, Value>) -> StoreFuture<'_, u64> {
        Box::pin(async { Ok(0) })
    }

    fn find_by_key(&self, _collection: &str, _primary_key: &str, key: Value) -> StoreFuture<'_, Option<Value>> {
        Box::pin(async move {
            self.lookups.lock().unwrap().push(key);
            Ok(Some(pivot()))
        })
    }
}

fn orchestrator_for(store: Arc<PivotStore>) -> QueryOrchestrator {
    let catalog: Arc<dyn RelationCatalog> = Arc::new(catalog());
    QueryOrchestrator::new(catalog, store, QueryConfig::with_key_type(KeyType::Int))
}

/// Test: a relational page resolves the pivot, then emits
/// joins, filter, pivot match, sort, skip, limit.
#[tokio::test]
async fn test_relational_page_stage_order() {
    let store = Arc::new(PivotStore::default());
    let orchestrator = orchestrator_for(store.clone());
    let args = PaginationArgs::first(3)
        .with_skip(1)
        .order_by(OrderBy::desc("createdAt"))
        .after(json!("7"));

    let documents: Vec<Value> = orchestrator
        .find_many("Post", &json!({"author": {"name": "Ann"}}), &args)
        .await
        .unwrap()
        .collect();
    assert!(documents.is_empty());

    // token coerced to the key type before the lookup
    assert_eq!(*store.lookups.lock().unwrap(), vec![json!(7)]);

    let pipelines = store.pipelines.lock().unwrap();
    let names: Vec<&str> = pipelines[0].stages.iter().map(PipelineStage::name).collect();
    assert_eq!(
        names,
        vec!["lookup", "fold_one", "match", "match", "sort", "skip", "limit"]
    );
    assert_eq!(
        pipelines[0].stages[4],
        PipelineStage::Sort(vec![SortSpec::desc("createdAt")])
    );
}

/// Test: `last` fails before the pivot lookup or any store call.
#[tokio::test]
async fn test_last_rejected_before_io() {
    let store = Arc::new(PivotStore::default());
    let orchestrator = orchestrator_for(store.clone());
    let args = PaginationArgs {
        last: Some(2),
        after: Some(json!(7)),
        ..Default::default()
    };

    let err = orchestrator
        .find_many("Post", &json!({"author": {"name": "Ann"}}), &args)
        .await
        .err()
        .unwrap();

    assert_eq!(err.code().code(), "AERO_QUERY_UNSUPPORTED");
    assert!(store.lookups.lock().unwrap().is_empty());
    assert!(store.pipelines.lock().unwrap().is_empty());
}
