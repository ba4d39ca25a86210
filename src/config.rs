//! Query configuration
//!
//! Every field has a serde default so a partial (or empty) JSON file is valid.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::errors::{QueryError, QueryResult};
use crate::observability::{log_event_with_fields, Event, Severity};

/// Storage type of the primary key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyType {
    String,
    Int,
    Uuid,
    /// 24 hex chars, rendered as `{"$oid": "<hex>"}`
    ObjectId,
}

impl KeyType {
    /// Coerces a key value (scalar or list of scalars) to the storage type
    pub fn coerce(&self, field: &str, value: &Value) -> QueryResult<Value> {
        match value {
            Value::Array(items) => items
                .iter()
                .map(|item| self.coerce_scalar(field, item))
                .collect::<QueryResult<Vec<_>>>()
                .map(Value::Array),
            scalar => self.coerce_scalar(field, scalar),
        }
    }

    fn coerce_scalar(&self, field: &str, value: &Value) -> QueryResult<Value> {
        match (self, value) {
            (KeyType::String, Value::String(_)) => Ok(value.clone()),
            (KeyType::String, Value::Number(n)) => Ok(Value::String(n.to_string())),

            (KeyType::Int, Value::Number(n)) if n.is_i64() => Ok(value.clone()),
            (KeyType::Int, Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(|i| json!(i))
                .map_err(|_| QueryError::coercion(field, format!("'{}' is not an integer key", s))),

            (KeyType::Uuid, Value::String(s)) => Uuid::parse_str(s)
                .map(|u| Value::String(u.hyphenated().to_string()))
                .map_err(|e| QueryError::coercion(field, format!("'{}' is not a UUID: {}", s, e))),

            (KeyType::ObjectId, Value::String(s)) => {
                if s.len() == 24 && s.chars().all(|c| c.is_ascii_hexdigit()) {
                    Ok(json!({ "$oid": s.to_ascii_lowercase() }))
                } else {
                    Err(QueryError::coercion(
                        field,
                        format!("'{}' is not a 24-character hex object id", s),
                    ))
                }
            }
            (KeyType::ObjectId, Value::Object(map)) if map.len() == 1 && map.contains_key("$oid") => {
                Ok(value.clone())
            }

            (key_type, other) => Err(QueryError::coercion(
                field,
                format!("cannot use {} as a {:?} key", type_label(other), key_type),
            )),
        }
    }
}

fn type_label(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Query compiler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Store primary-key field (default: "_id")
    #[serde(default = "default_primary_key")]
    pub primary_key: String,

    /// Caller-facing key canonicalized to `primary_key` (default: "id")
    #[serde(default = "default_id_alias")]
    pub id_alias: String,

    /// Primary-key storage type (default: object_id)
    #[serde(default = "default_key_type")]
    pub key_type: KeyType,

    /// Maximum nesting of relations and logical groups (default: 8)
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Collapse repeated joins onto one lookup stage (default: true)
    #[serde(default = "default_deduplicate_joins")]
    pub deduplicate_joins: bool,

    /// Options forwarded untouched to the execution collaborator
    #[serde(default = "default_pipeline_options")]
    pub pipeline_options: Map<String, Value>,

    /// Minimum log severity (default: INFO)
    #[serde(default = "default_log_level")]
    pub log_level: Severity,
}

fn default_primary_key() -> String {
    "_id".to_string()
}

fn default_id_alias() -> String {
    "id".to_string()
}

fn default_key_type() -> KeyType {
    KeyType::ObjectId
}

fn default_max_depth() -> usize {
    8
}

fn default_deduplicate_joins() -> bool {
    true
}

fn default_pipeline_options() -> Map<String, Value> {
    let mut options = Map::new();
    options.insert("allowDiskUse".to_string(), Value::Bool(true));
    options
}

fn default_log_level() -> Severity {
    Severity::Info
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            primary_key: default_primary_key(),
            id_alias: default_id_alias(),
            key_type: default_key_type(),
            max_depth: default_max_depth(),
            deduplicate_joins: default_deduplicate_joins(),
            pipeline_options: default_pipeline_options(),
            log_level: default_log_level(),
        }
    }
}

impl QueryConfig {
    /// Config with a different primary-key type
    pub fn with_key_type(key_type: KeyType) -> Self {
        Self {
            key_type,
            ..Default::default()
        }
    }

    /// Loads and validates a JSON config file
    pub fn load(path: &Path) -> QueryResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            QueryError::ConfigInvalid(format!("{}: failed to read file: {}", path.display(), e))
        })?;
        let config: QueryConfig = serde_json::from_str(&content).map_err(|e| {
            QueryError::ConfigInvalid(format!("{}: invalid JSON: {}", path.display(), e))
        })?;
        config.validate()?;

        log_event_with_fields(
            Event::ConfigLoaded,
            &[("path", path.display().to_string().as_str())],
        );
        Ok(config)
    }

    /// Rejects configurations the compiler cannot run with
    pub fn validate(&self) -> QueryResult<()> {
        if self.primary_key.trim().is_empty() {
            return Err(QueryError::ConfigInvalid("primary_key must not be empty".into()));
        }
        if self.id_alias.trim().is_empty() {
            return Err(QueryError::ConfigInvalid("id_alias must not be empty".into()));
        }
        if self.max_depth == 0 {
            return Err(QueryError::ConfigInvalid("max_depth must be at least 1".into()));
        }
        Ok(())
    }
}
