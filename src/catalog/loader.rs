//! Catalog loader for reading relation declarations from disk at startup
//!
//! File shape:
//!
//! ```json
//! { "Post": [ { "name": "author", "targetCollection": "User",
//!               "localField": "authorId", "foreignField": "_id",
//!               "cardinality": "one" } ] }
//! ```
//!
//! A malformed file is a startup failure; nothing is partially registered.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::errors::{QueryError, QueryResult};
use crate::observability::{log_event_with_fields, Event};

use super::relation::{InMemoryCatalog, RelationDescriptor};

/// Loads relation catalogs from JSON
pub struct CatalogLoader;

impl CatalogLoader {
    /// Loads a catalog file
    pub fn load_file(path: &Path) -> QueryResult<InMemoryCatalog> {
        let source = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|e| {
            QueryError::catalog_malformed(&source, format!("Failed to read file: {}", e))
        })?;

        let catalog = Self::load_str(&source, &content)?;

        let count = catalog.relation_count().to_string();
        log_event_with_fields(
            Event::CatalogLoaded,
            &[("path", source.as_str()), ("relations", count.as_str())],
        );
        Ok(catalog)
    }

    /// Parses catalog JSON; `source_name` only labels errors
    pub fn load_str(source_name: &str, content: &str) -> QueryResult<InMemoryCatalog> {
        // BTreeMap keeps registration order deterministic
        let declared: BTreeMap<String, Vec<RelationDescriptor>> = serde_json::from_str(content)
            .map_err(|e| QueryError::catalog_malformed(source_name, format!("Invalid JSON: {}", e)))?;

        let mut catalog = InMemoryCatalog::new();
        for (collection, relations) in declared {
            for relation in relations {
                catalog.register(collection.as_str(), relation).map_err(|e| match e {
                    QueryError::CatalogMalformed { reason, .. } => {
                        QueryError::catalog_malformed(source_name, reason)
                    }
                    other => other,
                })?;
            }
        }
        Ok(catalog)
    }
}
