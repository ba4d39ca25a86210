//! Relation descriptors and the read-only catalog contract

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::errors::{QueryError, QueryResult};

/// Join cardinality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    /// Joined array holds at most one document
    One,
    Many,
}

/// Immutable join description declared per collection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationDescriptor {
    /// Relation name as used in filter keys
    pub name: String,
    /// Collection the join reads from
    pub target_collection: String,
    /// Field on the source document
    pub local_field: String,
    /// Field on the target document
    pub foreign_field: String,
    pub cardinality: Cardinality,
}

impl RelationDescriptor {
    /// Creates a one-to-one relation
    pub fn one(
        name: impl Into<String>,
        target_collection: impl Into<String>,
        local_field: impl Into<String>,
        foreign_field: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target_collection: target_collection.into(),
            local_field: local_field.into(),
            foreign_field: foreign_field.into(),
            cardinality: Cardinality::One,
        }
    }

    /// Creates a one-to-many relation
    pub fn many(
        name: impl Into<String>,
        target_collection: impl Into<String>,
        local_field: impl Into<String>,
        foreign_field: impl Into<String>,
    ) -> Self {
        Self {
            cardinality: Cardinality::Many,
            ..Self::one(name, target_collection, local_field, foreign_field)
        }
    }

    /// Returns true if the joined array folds to a single document
    pub fn is_one(&self) -> bool {
        self.cardinality == Cardinality::One
    }

    /// Checks the descriptor for empty names
    pub fn validate_structure(&self) -> Result<(), String> {
        let fields = [
            ("name", &self.name),
            ("targetCollection", &self.target_collection),
            ("localField", &self.local_field),
            ("foreignField", &self.foreign_field),
        ];
        for (label, value) in fields {
            if value.trim().is_empty() {
                return Err(format!("relation {} must not be empty", label));
            }
        }
        Ok(())
    }
}

/// Read-only relation lookup.
///
/// Populated once at startup and shared across concurrent queries; the query
/// core never writes to it.
pub trait RelationCatalog: Send + Sync {
    /// Returns the relation declared on `collection` under `name`
    fn relation(&self, collection: &str, name: &str) -> Option<&RelationDescriptor>;

    /// Returns true if `name` is a relation of `collection`
    fn is_relation(&self, collection: &str, name: &str) -> bool {
        self.relation(collection, name).is_some()
    }
}

/// Catalog backed by an in-memory map
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    relations: HashMap<(String, String), RelationDescriptor>,
}

impl InMemoryCatalog {
    /// Creates an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a relation on `collection`.
    ///
    /// Entries are immutable: registering the same name twice fails.
    pub fn register(
        &mut self,
        collection: impl Into<String>,
        relation: RelationDescriptor,
    ) -> QueryResult<()> {
        let collection = collection.into();
        relation
            .validate_structure()
            .map_err(|e| QueryError::catalog_malformed("<in-memory>", e))?;

        let key = (collection, relation.name.clone());
        if self.relations.contains_key(&key) {
            return Err(QueryError::catalog_malformed(
                "<in-memory>",
                format!("relation '{}' already declared on '{}'", key.1, key.0),
            ));
        }

        self.relations.insert(key, relation);
        Ok(())
    }

    /// Chained registration for fixtures and startup code
    pub fn with_relation(
        mut self,
        collection: impl Into<String>,
        relation: RelationDescriptor,
    ) -> QueryResult<Self> {
        self.register(collection, relation)?;
        Ok(self)
    }

    /// Returns the number of declared relations
    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    /// Relations declared on one collection
    pub fn relations_of<'a>(
        &'a self,
        collection: &'a str,
    ) -> impl Iterator<Item = &'a RelationDescriptor> + 'a {
        self.relations
            .iter()
            .filter(move |((owner, _), _)| owner == collection)
            .map(|(_, relation)| relation)
    }
}

impl RelationCatalog for InMemoryCatalog {
    fn relation(&self, collection: &str, name: &str) -> Option<&RelationDescriptor> {
        self.relations
            .get(&(collection.to_string(), name.to_string()))
    }
}
