//! Pipeline stages and their native rendering

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};

use crate::catalog::RelationDescriptor;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// `1` and `"asc"` (any case) are ascending; every other token is descending
    pub fn from_token(token: &Value) -> Self {
        match token {
            Value::Number(n) if n.as_i64() == Some(1) => SortDirection::Asc,
            Value::String(s) if s.eq_ignore_ascii_case("asc") => SortDirection::Asc,
            _ => SortDirection::Desc,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    /// Native `$sort` value
    pub fn native(&self) -> i32 {
        match self {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }
}

impl Serialize for SortDirection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SortDirection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let token = Value::deserialize(deserializer)?;
        Ok(SortDirection::from_token(&token))
    }
}

/// One sort key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Join against a related collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupStage {
    pub relation: RelationDescriptor,
    /// Output field for the joined documents (dotted for nested joins)
    pub alias: String,
    /// Source field, prefixed with the parent alias for nested joins
    pub local_field: String,
}

/// A single pipeline stage.
///
/// Stages are append-only: once pushed onto a builder they are never edited.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineStage {
    Match(Map<String, Value>),
    Lookup(LookupStage),
    /// Collapses a one-to-one join array to its element (or null)
    FoldOne(String),
    Project(Map<String, Value>),
    Sort(Vec<SortSpec>),
    Skip(u64),
    Limit(u64),
    Count(String),
}

impl PipelineStage {
    /// Short stage name for explain output
    pub fn name(&self) -> &'static str {
        match self {
            PipelineStage::Match(_) => "match",
            PipelineStage::Lookup(_) => "lookup",
            PipelineStage::FoldOne(_) => "fold_one",
            PipelineStage::Project(_) => "project",
            PipelineStage::Sort(_) => "sort",
            PipelineStage::Skip(_) => "skip",
            PipelineStage::Limit(_) => "limit",
            PipelineStage::Count(_) => "count",
        }
    }

    /// Renders the stage as a native stage document
    pub fn to_document(&self) -> Value {
        match self {
            PipelineStage::Match(predicate) => json!({ "$match": predicate }),
            PipelineStage::Lookup(lookup) => json!({
                "$lookup": {
                    "from": lookup.relation.target_collection,
                    "localField": lookup.local_field,
                    "foreignField": lookup.relation.foreign_field,
                    "as": lookup.alias,
                }
            }),
            PipelineStage::FoldOne(alias) => {
                let mut fields = Map::new();
                fields.insert(
                    alias.clone(),
                    json!({ "$ifNull": [{ "$arrayElemAt": [format!("${}", alias), 0] }, null] }),
                );
                json!({ "$addFields": fields })
            }
            PipelineStage::Project(fields) => json!({ "$project": fields }),
            PipelineStage::Sort(specs) => {
                let mut order = Map::new();
                for spec in specs {
                    order.insert(spec.field.clone(), json!(spec.direction.native()));
                }
                json!({ "$sort": order })
            }
            PipelineStage::Skip(n) => json!({ "$skip": n }),
            PipelineStage::Limit(n) => json!({ "$limit": n }),
            PipelineStage::Count(field) => json!({ "$count": field }),
        }
    }
}

/// A finished, immutable stage sequence handed to the execution collaborator
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub collection: String,
    pub stages: Vec<PipelineStage>,
    /// Forwarded untouched to the store
    pub options: Map<String, Value>,
}

impl Pipeline {
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Number of lookup stages
    pub fn lookup_count(&self) -> usize {
        self.stages
            .iter()
            .filter(|s| matches!(s, PipelineStage::Lookup(_)))
            .count()
    }

    /// Renders every stage in order
    pub fn to_documents(&self) -> Vec<Value> {
        self.stages.iter().map(PipelineStage::to_document).collect()
    }

    /// Explain form: collection, rendered stages and options
    pub fn to_json(&self) -> Value {
        json!({
            "collection": self.collection,
            "pipeline": self.to_documents(),
            "options": self.options,
        })
    }
}
