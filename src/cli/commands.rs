//! CLI command implementations
//!
//! Both commands boot the same way: load config, apply its log level, load
//! the catalog, read one request from stdin. Neither touches a store; a
//! compiled plan is the whole output.

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::catalog::{CatalogLoader, RelationCatalog};
use crate::config::QueryConfig;
use crate::errors::{QueryError, QueryResult};
use crate::observability::Logger;
use crate::pagination::{PaginationArgs, PaginationCompiler};
use crate::pipeline::Pipeline;
use crate::repository::{
    Cursor, FindRequest, QueryOrchestrator, ReadKind, StoreExecutor, StoreFuture,
};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_request, write_error, write_response};

/// One request read from stdin
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct QueryRequest {
    pub collection: String,
    #[serde(default)]
    pub filter: Value,
    #[serde(default)]
    pub pagination: PaginationArgs,
    /// `findMany` (default), `findOne` or `count`; used by explain
    #[serde(default)]
    pub operation: Option<String>,
    /// Pivot document standing in for the store lookup of `after`/`before`
    #[serde(default)]
    pub pivot: Option<Value>,
}

impl QueryRequest {
    /// Parse the stdin document
    pub fn from_value(value: Value) -> CliResult<Self> {
        serde_json::from_value(value).map_err(|e| CliError::invalid_request(e.to_string()))
    }

    fn read_kind(&self) -> CliResult<ReadKind> {
        match self.operation.as_deref() {
            None | Some("findMany") => Ok(ReadKind::FindMany),
            Some("findOne") => Ok(ReadKind::FindOne),
            Some("count") => Ok(ReadKind::Count),
            Some(other) => Err(CliError::invalid_request(format!(
                "Unknown operation '{}'. Expected findMany, findOne or count.",
                other
            ))),
        }
    }
}

/// Store stand-in for commands that only plan
struct DetachedStore;

impl DetachedStore {
    fn refuse<'a, T: Send + 'a>() -> StoreFuture<'a, T> {
        Box::pin(async { Err(QueryError::Execution("no store attached".to_string())) })
    }
}

impl StoreExecutor for DetachedStore {
    fn aggregate(&self, _pipeline: Pipeline) -> StoreFuture<'_, Cursor> {
        Self::refuse()
    }

    fn find(&self, _request: FindRequest) -> StoreFuture<'_, Cursor> {
        Self::refuse()
    }

    fn count_documents(&self, _collection: &str, _filter: Map<String, Value>) -> StoreFuture<'_, u64> {
        Self::refuse()
    }

    fn find_by_key(&self, _collection: &str, _primary_key: &str, _key: Value) -> StoreFuture<'_, Option<Value>> {
        Self::refuse()
    }
}

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Compile { catalog, config } => compile(&catalog, config.as_deref()),
        Command::Explain { catalog, config } => explain(&catalog, config.as_deref()),
    }
}

/// Compile one filter into a pipeline and print its stages
pub fn compile(catalog_path: &Path, config_path: Option<&Path>) -> CliResult<()> {
    let orchestrator = boot(catalog_path, config_path)?;
    let request = QueryRequest::from_value(read_request()?);
    respond(request.map(|r| compile_request(&orchestrator, &r)))
}

/// Print the plan a read would execute
pub fn explain(catalog_path: &Path, config_path: Option<&Path>) -> CliResult<()> {
    let orchestrator = boot(catalog_path, config_path)?;
    let request = QueryRequest::from_value(read_request()?);
    respond(request.and_then(|r| {
        let kind = r.read_kind()?;
        Ok(explain_request(&orchestrator, kind, &r))
    }))
}

/// Always yields a pipeline, even for filters the orchestrator would route
/// to a direct read
pub fn compile_request(orchestrator: &QueryOrchestrator, request: &QueryRequest) -> QueryResult<Value> {
    let compiler = orchestrator.compiler();
    let mut pipeline = compiler.compile_pipeline(&request.filter, &request.collection)?;
    PaginationCompiler::new(&orchestrator.config().primary_key).apply(
        &mut pipeline,
        &request.pagination,
        request.pivot.as_ref(),
    )?;
    Ok(pipeline.build().to_json())
}

/// Routing decision and finished request for one read
pub fn explain_request(
    orchestrator: &QueryOrchestrator,
    kind: ReadKind,
    request: &QueryRequest,
) -> QueryResult<Value> {
    let plan = orchestrator.plan(
        kind,
        &request.collection,
        &request.filter,
        &request.pagination,
        request.pivot.as_ref(),
    )?;
    Ok(plan.to_json())
}

/// Loads config and catalog into an orchestrator with no store behind it
pub fn boot(catalog_path: &Path, config_path: Option<&Path>) -> CliResult<QueryOrchestrator> {
    let config = match config_path {
        Some(path) => QueryConfig::load(path)?,
        None => QueryConfig::default(),
    };
    Logger::set_min_severity(config.log_level);

    let catalog: Arc<dyn RelationCatalog> = Arc::new(CatalogLoader::load_file(catalog_path)?);
    Ok(QueryOrchestrator::new(catalog, Arc::new(DetachedStore), config))
}

/// Request-level failures are answered on stdout; only I/O ends the process
fn respond(outcome: CliResult<QueryResult<Value>>) -> CliResult<()> {
    match outcome {
        Ok(Ok(data)) => write_response(data),
        Ok(Err(e)) => write_error(e.code().code(), &e.to_string()),
        Err(e) => write_error(e.code_str(), e.message()),
    }
}
