//! Query orchestrator
//!
//! Per read: plan synchronously (parse, rewrite, compile, paginate), then
//! hand the finished request to the store. Filters that reference no
//! relation skip the pipeline entirely and run as a direct filtered read.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use crate::catalog::RelationCatalog;
use crate::compiler::{merge_predicate, CompiledFilter, QueryCompiler};
use crate::config::QueryConfig;
use crate::errors::{QueryError, QueryResult, Severity};
use crate::observability::{log_event_with_fields, Event, MetricsRegistry, ObservationScope};
use crate::operators::OperatorRegistry;
use crate::pagination::{PageSide, PageWindow, PaginationArgs, PaginationCompiler};
use crate::rewrite::{NodeVisitor, PrimaryKeyVisitor, RewritePipeline};

use super::executor::{Cursor, FindRequest, StoreExecutor};
use super::plan::{QueryPlan, ReadKind};

/// Output field of the count stage
pub const COUNT_FIELD: &str = "count";

/// Repository-level entry point for reads
pub struct QueryOrchestrator {
    catalog: Arc<dyn RelationCatalog>,
    executor: Arc<dyn StoreExecutor>,
    registry: OperatorRegistry,
    rewrite: RewritePipeline,
    config: QueryConfig,
    metrics: Arc<MetricsRegistry>,
}

impl QueryOrchestrator {
    /// Creates an orchestrator with primary-key canonicalization as the
    /// first rewrite visitor
    pub fn new(
        catalog: Arc<dyn RelationCatalog>,
        executor: Arc<dyn StoreExecutor>,
        config: QueryConfig,
    ) -> Self {
        let rewrite = RewritePipeline::new().with_visitor(PrimaryKeyVisitor::from_config(&config));
        Self {
            catalog,
            executor,
            registry: OperatorRegistry::new(),
            rewrite,
            config,
            metrics: Arc::new(MetricsRegistry::new()),
        }
    }

    /// Appends a rewrite visitor after the built-in ones
    pub fn with_visitor(mut self, visitor: impl NodeVisitor + 'static) -> Self {
        self.rewrite = self.rewrite.with_visitor(visitor);
        self
    }

    /// Shares a metrics registry with other components
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    /// Compiler bound to this orchestrator's catalog, visitors and config
    pub fn compiler(&self) -> QueryCompiler<'_> {
        QueryCompiler::new(self.catalog.as_ref(), &self.registry, &self.rewrite, &self.config)
    }

    /// Decides how a read executes. Never performs I/O.
    ///
    /// `pivot` is the document already resolved from `after`/`before`.
    pub fn plan(
        &self,
        kind: ReadKind,
        collection: &str,
        filter: &Value,
        args: &PaginationArgs,
        pivot: Option<&Value>,
    ) -> QueryResult<QueryPlan> {
        let window = match kind {
            ReadKind::FindMany => {
                PaginationCompiler::new(&self.config.primary_key).window(args, pivot)?
            }
            ReadKind::FindOne => PageWindow {
                limit: Some(1),
                ..Default::default()
            },
            ReadKind::Count => PageWindow::default(),
        };

        let plan = match self.compiler().compile(filter, collection)? {
            CompiledFilter::Predicate(mut predicate) => {
                for (key, value) in window.pivot_match {
                    merge_predicate(&mut predicate, key, value);
                }
                QueryPlan::Simple(FindRequest {
                    collection: collection.to_string(),
                    filter: predicate,
                    sort: window.sort,
                    skip: window.skip,
                    limit: window.limit,
                })
            }
            CompiledFilter::Staged(mut pipeline) => {
                PaginationCompiler::append(&mut pipeline, window);
                if kind == ReadKind::Count {
                    pipeline.count(COUNT_FIELD);
                }
                self.metrics.add_joins_staged(pipeline.joins_staged());
                self.metrics.add_joins_deduplicated(pipeline.joins_deduplicated());
                QueryPlan::Pipeline(pipeline.build())
            }
        };

        self.metrics.increment_queries_planned();
        let stages = match &plan {
            QueryPlan::Simple(_) => "0".to_string(),
            QueryPlan::Pipeline(pipeline) => pipeline.len().to_string(),
        };
        log_event_with_fields(
            Event::QueryPlanned,
            &[
                ("collection", collection),
                ("operation", kind.as_str()),
                ("route", plan.route()),
                ("stages", stages.as_str()),
            ],
        );

        Ok(plan)
    }

    /// First document matching `filter`
    pub async fn find_one(&self, collection: &str, filter: &Value) -> QueryResult<Option<Value>> {
        self.observed(ReadKind::FindOne, collection, self.run_find_one(collection, filter))
            .await
    }

    /// Documents matching `filter`, windowed by `args`
    pub async fn find_many(
        &self,
        collection: &str,
        filter: &Value,
        args: &PaginationArgs,
    ) -> QueryResult<Cursor> {
        self.observed(
            ReadKind::FindMany,
            collection,
            self.run_find_many(collection, filter, args),
        )
        .await
    }

    /// Number of documents matching `filter`
    pub async fn count(&self, collection: &str, filter: &Value) -> QueryResult<u64> {
        self.observed(ReadKind::Count, collection, self.run_count(collection, filter))
            .await
    }

    async fn run_find_one(&self, collection: &str, filter: &Value) -> QueryResult<Option<Value>> {
        let plan = self.plan(ReadKind::FindOne, collection, filter, &PaginationArgs::default(), None)?;
        let mut cursor = self.execute(plan).await?;
        Ok(cursor.next())
    }

    async fn run_find_many(
        &self,
        collection: &str,
        filter: &Value,
        args: &PaginationArgs,
    ) -> QueryResult<Cursor> {
        // reject before any pivot lookup
        PaginationCompiler::validate(args)?;
        let pivot = self.resolve_pivot(collection, args).await?;
        let plan = self.plan(ReadKind::FindMany, collection, filter, args, pivot.as_ref())?;
        self.execute(plan).await
    }

    async fn run_count(&self, collection: &str, filter: &Value) -> QueryResult<u64> {
        let plan = self.plan(ReadKind::Count, collection, filter, &PaginationArgs::default(), None)?;
        match plan {
            QueryPlan::Simple(request) => {
                self.route_simple(&request.collection);
                self.executor
                    .count_documents(&request.collection, request.filter)
                    .await
            }
            QueryPlan::Pipeline(pipeline) => {
                self.route_pipeline(&pipeline.collection);
                let mut cursor = self.executor.aggregate(pipeline).await?;
                match cursor.next() {
                    None => Ok(0),
                    Some(document) => document.get(COUNT_FIELD).and_then(Value::as_u64).ok_or_else(|| {
                        QueryError::Execution(format!("count stage returned no '{}' field", COUNT_FIELD))
                    }),
                }
            }
        }
    }

    /// Runs a plan through the store
    pub async fn execute(&self, plan: QueryPlan) -> QueryResult<Cursor> {
        match plan {
            QueryPlan::Simple(request) => {
                self.route_simple(&request.collection);
                self.executor.find(request).await
            }
            QueryPlan::Pipeline(pipeline) => {
                self.route_pipeline(&pipeline.collection);
                self.executor.aggregate(pipeline).await
            }
        }
    }

    /// Resolves `after`/`before` to the pivot document
    async fn resolve_pivot(&self, collection: &str, args: &PaginationArgs) -> QueryResult<Option<Value>> {
        let (side, token) = match args.pivot_token() {
            Some(pivot) => pivot,
            None => return Ok(None),
        };

        let primary_key = self.config.primary_key.as_str();
        let key = self.config.key_type.coerce(primary_key, token)?;
        let pivot = self
            .executor
            .find_by_key(collection, primary_key, key.clone())
            .await?;

        pivot.map(Some).ok_or_else(|| {
            let side = match side {
                PageSide::After => "after",
                PageSide::Before => "before",
            };
            QueryError::PivotNotFound(format!("'{}' key {} not found in '{}'", side, key, collection))
        })
    }

    fn route_simple(&self, collection: &str) {
        self.metrics.increment_simple_reads();
        log_event_with_fields(Event::SimpleReadRouted, &[("collection", collection)]);
    }

    fn route_pipeline(&self, collection: &str) {
        self.metrics.increment_pipeline_reads();
        log_event_with_fields(Event::PipelineReadRouted, &[("collection", collection)]);
    }

    /// Wraps a read in an observation scope and counts rejections
    async fn observed<T, F>(&self, kind: ReadKind, collection: &str, read: F) -> QueryResult<T>
    where
        F: Future<Output = QueryResult<T>>,
    {
        let scope = ObservationScope::with_fields(kind.as_str(), &[("collection", collection)]);
        let result = read.await;

        match &result {
            Ok(_) => scope.complete(),
            Err(error) => {
                if error.severity() == Severity::Reject {
                    self.metrics.increment_queries_rejected();
                    log_event_with_fields(
                        Event::QueryRejected,
                        &[
                            ("collection", collection),
                            ("operation", kind.as_str()),
                            ("code", error.code().code()),
                        ],
                    );
                }
                scope.fail(error);
            }
        }
        result
    }
}
