//! In-memory index backend.
//!
//! Interprets the same JSON search bodies the HTTP backend sends, over a
//! fixed document corpus. Used in tests and local development; also counts
//! issued searches so fail-fast behavior can be asserted on.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use async_trait::async_trait;
use serde_json::{json, Value};

use genehub_core::{Error, FacetBucket, Result};

use crate::backend::{IndexBackend, IndexResponse, RawHit};

/// A document index held in memory.
#[derive(Default)]
pub struct MemoryIndex {
    docs: Vec<Value>,
    search_calls: AtomicUsize,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document. Must carry an `id` field (string or number).
    pub fn add(&mut self, doc: Value) {
        debug_assert!(doc.get("id").is_some());
        self.docs.push(doc);
    }

    /// Builder-style [`add`](Self::add).
    pub fn with_doc(mut self, doc: Value) -> Self {
        self.add(doc);
        self
    }

    /// Number of searches issued against this index.
    pub fn search_count(&self) -> usize {
        self.search_calls.load(AtomicOrdering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

/// Hit ids are strings on the wire even when documents store them as
/// numbers.
fn id_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Field lookup supporting dotted paths (`popularity.all_time`).
fn field_value<'a>(doc: &'a Value, field: &str) -> Option<&'a Value> {
    if let Some(v) = doc.get(field) {
        return Some(v);
    }
    let mut current = doc;
    for part in field.split('.') {
        current = current.get(part)?;
    }
    Some(current)
}

/// Loose equality: term filters match scalars directly and match any
/// element of an array-valued field (tags, role_permission).
fn value_matches(doc_value: &Value, query_value: &Value) -> bool {
    match doc_value {
        Value::Array(items) => items.iter().any(|v| scalar_eq(v, query_value)),
        other => scalar_eq(other, query_value),
    }
}

fn scalar_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    // Ids are strings in queries but sometimes numbers in documents.
    match (a, b) {
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            n.to_string() == *s
        }
        _ => false,
    }
}

/// Does any string anywhere in the document contain `term`
/// (case-insensitively)?
fn doc_contains_term(doc: &Value, term: &str) -> bool {
    match doc {
        Value::String(s) => s.to_lowercase().contains(term),
        Value::Array(items) => items.iter().any(|v| doc_contains_term(v, term)),
        Value::Object(map) => map.values().any(|v| doc_contains_term(v, term)),
        _ => false,
    }
}

fn eval_query(node: &Value, doc: &Value) -> Result<bool> {
    if node.get("match_all").is_some() {
        return Ok(true);
    }
    if let Some(qs) = node.get("query_string") {
        let query = qs.get("query").and_then(Value::as_str).unwrap_or("");
        return Ok(query
            .split_whitespace()
            .all(|term| doc_contains_term(doc, &term.to_lowercase())));
    }
    if let Some(term) = node.get("term").and_then(Value::as_object) {
        return Ok(term.iter().all(|(field, value)| {
            field_value(doc, field).is_some_and(|dv| value_matches(dv, value))
        }));
    }
    if let Some(terms) = node.get("terms").and_then(Value::as_object) {
        return Ok(terms.iter().all(|(field, values)| {
            let Some(list) = values.as_array() else {
                return false;
            };
            field_value(doc, field)
                .is_some_and(|dv| list.iter().any(|value| value_matches(dv, value)))
        }));
    }
    if let Some(range) = node.get("range").and_then(Value::as_object) {
        for (field, bounds) in range {
            let Some(actual) = field_value(doc, field).and_then(Value::as_f64) else {
                return Ok(false);
            };
            if let Some(gte) = bounds.get("gte").and_then(Value::as_f64) {
                if actual < gte {
                    return Ok(false);
                }
            }
            if let Some(lte) = bounds.get("lte").and_then(Value::as_f64) {
                if actual > lte {
                    return Ok(false);
                }
            }
        }
        return Ok(true);
    }
    if let Some(b) = node.get("bool") {
        for clause in b.get("must").and_then(Value::as_array).unwrap_or(&vec![]) {
            if !eval_query(clause, doc)? {
                return Ok(false);
            }
        }
        for clause in b.get("filter").and_then(Value::as_array).unwrap_or(&vec![]) {
            if !eval_query(clause, doc)? {
                return Ok(false);
            }
        }
        if let Some(should) = b.get("should").and_then(Value::as_array) {
            if !should.is_empty() {
                let mut any = false;
                for clause in should {
                    if eval_query(clause, doc)? {
                        any = true;
                        break;
                    }
                }
                if !any {
                    return Ok(false);
                }
            }
        }
        return Ok(true);
    }
    Err(Error::Search(format!("unsupported query node: {node}")))
}

/// Total order over JSON scalars for sorting: numbers before strings,
/// missing handled by the caller.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Number(_), _) => Ordering::Less,
        (_, Value::Number(_)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

fn sort_docs(docs: &mut [&Value], sort: &[Value]) {
    docs.sort_by(|a, b| {
        for clause in sort {
            let Some(obj) = clause.as_object() else {
                continue;
            };
            for (field, opts) in obj {
                let desc = opts.get("order").and_then(Value::as_str) == Some("desc");
                let av = field_value(a, field);
                let bv = field_value(b, field);
                let ord = match (av, bv) {
                    (Some(x), Some(y)) => {
                        let ord = compare_values(x, y);
                        if desc {
                            ord.reverse()
                        } else {
                            ord
                        }
                    }
                    // missing values sort last regardless of order
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
        Ordering::Equal
    });
}

fn facet_counts(docs: &[&Value], field: &str) -> Vec<FacetBucket> {
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for doc in docs {
        match field_value(doc, field) {
            Some(Value::String(s)) => *counts.entry(s.clone()).or_default() += 1,
            Some(Value::Array(items)) => {
                for item in items {
                    if let Some(s) = item.as_str() {
                        *counts.entry(s.to_string()).or_default() += 1;
                    }
                }
            }
            _ => {}
        }
    }
    let mut buckets: Vec<FacetBucket> = counts
        .into_iter()
        .map(|(term, count)| FacetBucket { term, count })
        .collect();
    buckets.sort_by(|a, b| b.count.cmp(&a.count).then(a.term.cmp(&b.term)));
    buckets
}

#[async_trait]
impl IndexBackend for MemoryIndex {
    async fn search(&self, body: &Value) -> Result<IndexResponse> {
        self.search_calls.fetch_add(1, AtomicOrdering::SeqCst);

        let query = body
            .get("query")
            .ok_or_else(|| Error::Search("body missing \"query\"".to_string()))?;

        let mut matched: Vec<&Value> = Vec::new();
        for doc in &self.docs {
            if eval_query(query, doc)? {
                matched.push(doc);
            }
        }

        if let Some(sort) = body.get("sort").and_then(Value::as_array) {
            sort_docs(&mut matched, sort);
        }

        let mut aggregations = BTreeMap::new();
        if let Some(aggs) = body.get("aggs").and_then(Value::as_object) {
            for (field, spec) in aggs {
                let agg_field = spec
                    .pointer("/terms/field")
                    .and_then(Value::as_str)
                    .unwrap_or(field);
                aggregations.insert(field.clone(), facet_counts(&matched, agg_field));
            }
        }

        let total = matched.len() as u64;
        let from = body.get("from").and_then(Value::as_u64).unwrap_or(0) as usize;
        let size = body.get("size").and_then(Value::as_u64).unwrap_or(10) as usize;
        let projection: Option<Vec<&str>> = body
            .get("_source")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(Value::as_str).collect());

        let hits = matched
            .into_iter()
            .skip(from)
            .take(size)
            .map(|doc| {
                let id = doc.get("id").map(id_string).unwrap_or_default();
                let fields = match &projection {
                    Some(keys) => {
                        let mut out = serde_json::Map::new();
                        for key in keys {
                            if let Some(v) = field_value(doc, key) {
                                out.insert((*key).to_string(), v.clone());
                            }
                        }
                        Value::Object(out)
                    }
                    None => doc.clone(),
                };
                RawHit {
                    id,
                    fields,
                    highlight: None,
                }
            })
            .collect();

        Ok(IndexResponse {
            hits,
            total,
            aggregations,
        })
    }

    async fn health(&self) -> Result<Value> {
        Ok(json!({ "status": "green", "docs": self.docs.len() }))
    }
}
