//! Execution collaborator contract
//!
//! The store driver lives outside this crate. It receives finished,
//! immutable requests and owns cancellation and timeouts.

use std::future::Future;
use std::pin::Pin;

use serde_json::{json, Map, Value};

use crate::errors::QueryResult;
use crate::pipeline::{Pipeline, SortSpec};

/// Boxed future returned by store operations
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = QueryResult<T>> + Send + 'a>>;

/// Lazily consumed result documents
pub type Cursor = Box<dyn Iterator<Item = Value> + Send>;

/// Direct filtered read, used when no join is needed
#[derive(Debug, Clone, PartialEq)]
pub struct FindRequest {
    pub collection: String,
    pub filter: Map<String, Value>,
    pub sort: Vec<SortSpec>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

impl FindRequest {
    pub fn new(collection: impl Into<String>, filter: Map<String, Value>) -> Self {
        Self {
            collection: collection.into(),
            filter,
            sort: Vec::new(),
            skip: None,
            limit: None,
        }
    }

    /// Explain form
    pub fn to_json(&self) -> Value {
        let sort: Map<String, Value> = self
            .sort
            .iter()
            .map(|spec| (spec.field.clone(), json!(spec.direction.native())))
            .collect();
        json!({
            "collection": self.collection,
            "filter": self.filter,
            "sort": sort,
            "skip": self.skip,
            "limit": self.limit,
        })
    }
}

/// Store driver executing compiled reads
pub trait StoreExecutor: Send + Sync {
    /// Runs an aggregation pipeline
    fn aggregate(&self, pipeline: Pipeline) -> StoreFuture<'_, Cursor>;

    /// Runs a direct filtered read
    fn find(&self, request: FindRequest) -> StoreFuture<'_, Cursor>;

    /// Counts documents matching a plain filter
    fn count_documents(&self, collection: &str, filter: Map<String, Value>) -> StoreFuture<'_, u64>;

    /// Fetches one document by primary key (pagination pivots)
    fn find_by_key(&self, collection: &str, primary_key: &str, key: Value) -> StoreFuture<'_, Option<Value>>;
}
