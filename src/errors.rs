//! Query error types following the AERO error-code convention
//!
//! Error codes:
//! - AERO_QUERY_UNKNOWN_RELATION (REJECT)
//! - AERO_QUERY_MALFORMED_FILTER (REJECT)
//! - AERO_QUERY_MALFORMED_LOGICAL_GROUP (REJECT)
//! - AERO_QUERY_INVALID_OPERAND (REJECT)
//! - AERO_QUERY_DEPTH_EXCEEDED (REJECT)
//! - AERO_QUERY_UNSUPPORTED (REJECT)
//! - AERO_QUERY_INVALID_PAGINATION (REJECT)
//! - AERO_QUERY_PIVOT_NOT_FOUND (REJECT)
//! - AERO_QUERY_COERCION_FAILED (REJECT)
//! - AERO_QUERY_CATALOG_INCONSISTENT (FATAL)
//! - AERO_CONFIG_INVALID (FATAL)
//! - AERO_CATALOG_MALFORMED (FATAL)
//! - AERO_EXECUTION_FAILED (ERROR)

use std::fmt;

use thiserror::Error;

/// Severity levels for query errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Caller request rejected, nothing was executed
    Reject,
    /// Execution collaborator failed
    Error,
    /// Internal invariant or startup failure
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Query error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorCode {
    AeroQueryUnknownRelation,
    AeroQueryMalformedFilter,
    AeroQueryMalformedLogicalGroup,
    AeroQueryInvalidOperand,
    AeroQueryDepthExceeded,
    AeroQueryUnsupported,
    AeroQueryInvalidPagination,
    AeroQueryPivotNotFound,
    AeroQueryCoercionFailed,
    AeroQueryCatalogInconsistent,
    AeroConfigInvalid,
    AeroCatalogMalformed,
    AeroExecutionFailed,
}

impl QueryErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            QueryErrorCode::AeroQueryUnknownRelation => "AERO_QUERY_UNKNOWN_RELATION",
            QueryErrorCode::AeroQueryMalformedFilter => "AERO_QUERY_MALFORMED_FILTER",
            QueryErrorCode::AeroQueryMalformedLogicalGroup => "AERO_QUERY_MALFORMED_LOGICAL_GROUP",
            QueryErrorCode::AeroQueryInvalidOperand => "AERO_QUERY_INVALID_OPERAND",
            QueryErrorCode::AeroQueryDepthExceeded => "AERO_QUERY_DEPTH_EXCEEDED",
            QueryErrorCode::AeroQueryUnsupported => "AERO_QUERY_UNSUPPORTED",
            QueryErrorCode::AeroQueryInvalidPagination => "AERO_QUERY_INVALID_PAGINATION",
            QueryErrorCode::AeroQueryPivotNotFound => "AERO_QUERY_PIVOT_NOT_FOUND",
            QueryErrorCode::AeroQueryCoercionFailed => "AERO_QUERY_COERCION_FAILED",
            QueryErrorCode::AeroQueryCatalogInconsistent => "AERO_QUERY_CATALOG_INCONSISTENT",
            QueryErrorCode::AeroConfigInvalid => "AERO_CONFIG_INVALID",
            QueryErrorCode::AeroCatalogMalformed => "AERO_CATALOG_MALFORMED",
            QueryErrorCode::AeroExecutionFailed => "AERO_EXECUTION_FAILED",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            QueryErrorCode::AeroQueryCatalogInconsistent
            | QueryErrorCode::AeroConfigInvalid
            | QueryErrorCode::AeroCatalogMalformed => Severity::Fatal,
            QueryErrorCode::AeroExecutionFailed => Severity::Error,
            _ => Severity::Reject,
        }
    }
}

impl fmt::Display for QueryErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors raised while building, rewriting, compiling or executing a query.
///
/// Every failure is raised at the point of detection; no partially built
/// pipeline ever reaches the execution collaborator.
#[derive(Debug, Clone, Error)]
pub enum QueryError {
    // ==================
    // Schema errors
    // ==================
    /// Relation name not declared for the collection
    #[error("Unknown relation '{relation}' on collection '{collection}'")]
    UnknownRelation { collection: String, relation: String },

    /// Filter is not an object, or a relation value is not an object
    #[error("Malformed filter: {0}")]
    MalformedFilter(String),

    /// and/or/nor value is not a list of filter objects
    #[error("Logical group '{key}' must be a list of filter objects")]
    MalformedLogicalGroup { key: String },

    /// Operator received an operand of the wrong shape
    #[error("Invalid operand for '{field}_{operator}': {reason}")]
    InvalidOperand {
        field: String,
        operator: String,
        reason: String,
    },

    /// Nested filter exceeds the configured depth
    #[error("Filter nesting exceeds maximum depth {max_depth} at '{path}'")]
    DepthExceeded { max_depth: usize, path: String },

    /// Feature intentionally not supported
    #[error("Operator not supported: {0}")]
    Unsupported(String),

    /// Pagination arguments are inconsistent
    #[error("Invalid pagination: {0}")]
    InvalidPagination(String),

    /// Pagination pivot could not be resolved
    #[error("Pagination pivot not found: {0}")]
    PivotNotFound(String),

    // ==================
    // Coercion errors
    // ==================
    /// Value cannot be cast to the field's storage type
    #[error("Cannot coerce value for '{field}': {reason}")]
    Coercion { field: String, reason: String },

    // ==================
    // Internal errors
    // ==================
    /// Catalog and builder disagree about a relation validated earlier
    #[error("Relation catalog inconsistent: '{relation}' on '{collection}' vanished after parse")]
    CatalogInconsistent { collection: String, relation: String },

    // ==================
    // Startup errors
    // ==================
    /// Configuration rejected
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    /// Relation catalog file or registration rejected
    #[error("Malformed relation catalog ({source_name}): {reason}")]
    CatalogMalformed { source_name: String, reason: String },

    // ==================
    // Execution errors
    // ==================
    /// Failure reported by the execution collaborator
    #[error("Execution failed: {0}")]
    Execution(String),
}

impl QueryError {
    /// Create a coercion error
    pub fn coercion(field: impl Into<String>, reason: impl Into<String>) -> Self {
        QueryError::Coercion {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid operand error
    pub fn invalid_operand(
        field: impl Into<String>,
        operator: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        QueryError::InvalidOperand {
            field: field.into(),
            operator: operator.into(),
            reason: reason.into(),
        }
    }

    /// Create an unknown relation error
    pub fn unknown_relation(collection: impl Into<String>, relation: impl Into<String>) -> Self {
        QueryError::UnknownRelation {
            collection: collection.into(),
            relation: relation.into(),
        }
    }

    /// Create a malformed catalog error
    pub fn catalog_malformed(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        QueryError::CatalogMalformed {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    /// Returns the error code
    pub fn code(&self) -> QueryErrorCode {
        match self {
            QueryError::UnknownRelation { .. } => QueryErrorCode::AeroQueryUnknownRelation,
            QueryError::MalformedFilter(_) => QueryErrorCode::AeroQueryMalformedFilter,
            QueryError::MalformedLogicalGroup { .. } => {
                QueryErrorCode::AeroQueryMalformedLogicalGroup
            }
            QueryError::InvalidOperand { .. } => QueryErrorCode::AeroQueryInvalidOperand,
            QueryError::DepthExceeded { .. } => QueryErrorCode::AeroQueryDepthExceeded,
            QueryError::Unsupported(_) => QueryErrorCode::AeroQueryUnsupported,
            QueryError::InvalidPagination(_) => QueryErrorCode::AeroQueryInvalidPagination,
            QueryError::PivotNotFound(_) => QueryErrorCode::AeroQueryPivotNotFound,
            QueryError::Coercion { .. } => QueryErrorCode::AeroQueryCoercionFailed,
            QueryError::CatalogInconsistent { .. } => {
                QueryErrorCode::AeroQueryCatalogInconsistent
            }
            QueryError::ConfigInvalid(_) => QueryErrorCode::AeroConfigInvalid,
            QueryError::CatalogMalformed { .. } => QueryErrorCode::AeroCatalogMalformed,
            QueryError::Execution(_) => QueryErrorCode::AeroExecutionFailed,
        }
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code().severity()
    }

    /// True for "bad request shape" errors
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            QueryError::UnknownRelation { .. }
                | QueryError::MalformedFilter(_)
                | QueryError::MalformedLogicalGroup { .. }
                | QueryError::InvalidOperand { .. }
                | QueryError::DepthExceeded { .. }
                | QueryError::Unsupported(_)
                | QueryError::InvalidPagination(_)
                | QueryError::PivotNotFound(_)
        )
    }

    /// True for "bad value" errors
    pub fn is_coercion_error(&self) -> bool {
        matches!(self, QueryError::Coercion { .. })
    }
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;
