//! Node tree → native predicate
//!
//! Field paths are prefixed with the relation namespace (`author.`) so a
//! predicate on a joined collection reads from the join alias.

use serde_json::{Map, Value};

use crate::ast::{FilterNode, NodeKind};
use crate::errors::QueryResult;
use crate::pipeline::PipelineBuilder;

/// Folds node lists into predicate documents
pub struct AstCompiler;

impl AstCompiler {
    /// Compiles `nodes` into one predicate.
    ///
    /// Suppressed nodes are skipped. Custom compilers get the accumulator,
    /// the namespace and the pipeline so they can inject stages.
    pub fn compile(
        nodes: &[FilterNode],
        namespace: &str,
        pipeline: &mut PipelineBuilder<'_>,
    ) -> QueryResult<Map<String, Value>> {
        let mut acc = Map::new();

        for node in nodes {
            if node.suppressed {
                continue;
            }

            if let Some(custom) = &node.custom_compiler {
                custom.invoke(node, &mut acc, namespace, pipeline)?;
                continue;
            }

            match &node.kind {
                NodeKind::Field {
                    field_name,
                    operator,
                } => {
                    let predicate = match operator {
                        Some(op) => op.build(field_name, &node.value)?,
                        None => node.value.clone(),
                    };
                    merge_predicate(&mut acc, format!("{}{}", namespace, field_name), predicate);
                }
                NodeKind::Logical { op, branches } => {
                    let mut compiled = Vec::with_capacity(branches.len());
                    for branch in branches {
                        let predicate = Self::compile(branch, namespace, pipeline)?;
                        if !predicate.is_empty() {
                            compiled.push(Value::Object(predicate));
                        }
                    }
                    if !compiled.is_empty() {
                        merge_predicate(&mut acc, op.native().to_string(), Value::Array(compiled));
                    }
                }
                NodeKind::Relation { relation, children } => {
                    let scoped = format!("{}{}.", namespace, relation.name);
                    let predicate = Self::compile(children, &scoped, pipeline)?;
                    for (key, value) in predicate {
                        merge_predicate(&mut acc, key, value);
                    }
                }
            }
        }

        Ok(acc)
    }
}

/// Adds `key: value` to a predicate without losing an existing clause.
///
/// - operator documents on the same path merge (`{$gt: 1}` + `{$lt: 9}`)
/// - `$and` lists concatenate
/// - anything else that collides is moved under `$and`
pub fn merge_predicate(acc: &mut Map<String, Value>, key: String, value: Value) {
    if !acc.contains_key(&key) {
        acc.insert(key, value);
        return;
    }

    let value = match acc.get_mut(&key) {
        Some(Value::Object(current)) => match value {
            Value::Object(incoming)
                if is_operator_document(current)
                    && is_operator_document(&incoming)
                    && incoming.keys().all(|k| !current.contains_key(k)) =>
            {
                current.extend(incoming);
                return;
            }
            other => other,
        },
        Some(Value::Array(current)) if key == "$and" => match value {
            Value::Array(incoming) => {
                current.extend(incoming);
                return;
            }
            other => other,
        },
        _ => value,
    };

    let mut clause = Map::new();
    clause.insert(key, value);
    match acc.get_mut("$and") {
        Some(Value::Array(conjuncts)) => conjuncts.push(Value::Object(clause)),
        _ => {
            acc.insert("$and".to_string(), Value::Array(vec![Value::Object(clause)]));
        }
    }
}

/// Field-level query operators a predicate value may combine
const QUERY_OPERATORS: &[&str] = &[
    "$eq", "$ne", "$gt", "$gte", "$lt", "$lte", "$in", "$nin", "$not", "$regex", "$options",
    "$all", "$elemMatch", "$exists", "$size", "$type", "$mod",
];

/// True when every key is a query operator. Extended JSON literals such as
/// `{"$oid": ..}` or `{"$date": ..}` are values, not operator documents.
fn is_operator_document(map: &Map<String, Value>) -> bool {
    !map.is_empty() && map.keys().all(|k| QUERY_OPERATORS.contains(&k.as_str()))
}
