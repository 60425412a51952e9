//! Structured index queries and their JSON wire form.
//!
//! [`QueryNode`] is a small boolean/term/range query tree; [`IndexQuery`]
//! wraps one node with pagination, sort, faceting, and highlighting and
//! renders the full search body the document index consumes.

use serde_json::{json, Map, Value};

use genehub_core::{SortKey, SortOrder};

/// Highlight fragment size in characters.
const HIGHLIGHT_FRAGMENT_SIZE: u32 = 300;

/// One node of a structured index query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryNode {
    /// Matches every document.
    MatchAll,
    /// Parsed free-text query; terms are combined with AND.
    QueryString { query: String },
    /// Exact single-value match.
    Term { field: String, value: Value },
    /// Match any of several values on one field.
    Terms { field: String, values: Vec<Value> },
    /// Inclusive numeric range.
    Range {
        field: String,
        gte: Option<i64>,
        lte: Option<i64>,
    },
    /// Boolean combination. `must` and `filter` clauses all have to match;
    /// at least one `should` clause has to match when any are present.
    Bool {
        must: Vec<QueryNode>,
        should: Vec<QueryNode>,
        filter: Vec<QueryNode>,
    },
}

impl QueryNode {
    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        QueryNode::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn terms(field: impl Into<String>, values: Vec<Value>) -> Self {
        QueryNode::Terms {
            field: field.into(),
            values,
        }
    }

    /// Wrap a main query with filter clauses.
    pub fn filtered(main: QueryNode, filters: Vec<QueryNode>) -> Self {
        if filters.is_empty() {
            main
        } else {
            QueryNode::Bool {
                must: vec![main],
                should: Vec::new(),
                filter: filters,
            }
        }
    }

    /// Render this node to the index's JSON query syntax.
    pub fn to_json(&self) -> Value {
        match self {
            QueryNode::MatchAll => json!({ "match_all": {} }),
            QueryNode::QueryString { query } => json!({
                "query_string": { "query": query, "default_operator": "AND" }
            }),
            QueryNode::Term { field, value } => json!({ "term": { field.clone(): value } }),
            QueryNode::Terms { field, values } => json!({ "terms": { field.clone(): values } }),
            QueryNode::Range { field, gte, lte } => {
                let mut bounds = Map::new();
                if let Some(g) = gte {
                    bounds.insert("gte".to_string(), json!(g));
                }
                if let Some(l) = lte {
                    bounds.insert("lte".to_string(), json!(l));
                }
                json!({ "range": { field.clone(): bounds } })
            }
            QueryNode::Bool {
                must,
                should,
                filter,
            } => {
                let mut body = Map::new();
                if !must.is_empty() {
                    body.insert(
                        "must".to_string(),
                        Value::Array(must.iter().map(QueryNode::to_json).collect()),
                    );
                }
                if !should.is_empty() {
                    body.insert(
                        "should".to_string(),
                        Value::Array(should.iter().map(QueryNode::to_json).collect()),
                    );
                    body.insert("minimum_should_match".to_string(), json!(1));
                }
                if !filter.is_empty() {
                    body.insert(
                        "filter".to_string(),
                        Value::Array(filter.iter().map(QueryNode::to_json).collect()),
                    );
                }
                json!({ "bool": body })
            }
        }
    }
}

/// A complete, executable index query: one [`QueryNode`] plus the result
/// shaping the request asked for.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexQuery {
    pub query: QueryNode,
    pub from: usize,
    pub size: usize,
    /// Sort clauses. An ascending `id` tie-break is appended at render time
    /// whenever an explicit sort is present, so pagination stays stable when
    /// the primary key ties.
    pub sort: Vec<SortKey>,
    /// Fields to build terms facets over.
    pub facet_fields: Vec<String>,
    /// Fields to highlight.
    pub highlight_fields: Vec<String>,
    /// Source projection; `["_source"]` returns the whole document.
    pub fields: Vec<String>,
    pub explain: bool,
}

impl IndexQuery {
    pub fn new(query: QueryNode) -> Self {
        Self {
            query,
            from: 0,
            size: genehub_core::DEFAULT_PAGE_SIZE,
            sort: Vec::new(),
            facet_fields: Vec::new(),
            highlight_fields: Vec::new(),
            fields: vec!["_source".to_string()],
            explain: false,
        }
    }

    /// Shift the pagination window, keeping everything else intact. Used by
    /// the pager for out-of-window fetches.
    pub fn with_window(mut self, from: usize, size: usize) -> Self {
        self.from = from;
        self.size = size;
        self
    }

    /// Effective sort clauses including the id tie-break.
    pub fn effective_sort(&self) -> Vec<SortKey> {
        let mut sort = self.sort.clone();
        if !sort.is_empty() && !sort.iter().any(|k| k.field == "id") {
            sort.push(SortKey::asc("id"));
        }
        sort
    }

    /// Render the full search body.
    pub fn body(&self) -> Value {
        let mut body = Map::new();
        body.insert("query".to_string(), self.query.to_json());
        body.insert("from".to_string(), json!(self.from));
        body.insert("size".to_string(), json!(self.size));

        let sort = self.effective_sort();
        if !sort.is_empty() {
            let clauses: Vec<Value> = sort
                .iter()
                .map(|k| {
                    let mut opts = Map::new();
                    opts.insert(
                        "order".to_string(),
                        json!(match k.order {
                            SortOrder::Asc => "asc",
                            SortOrder::Desc => "desc",
                        }),
                    );
                    if k.missing_last {
                        opts.insert("missing".to_string(), json!("_last"));
                    }
                    json!({ k.field.clone(): opts })
                })
                .collect();
            body.insert("sort".to_string(), Value::Array(clauses));
        }

        if !self.facet_fields.is_empty() {
            let mut aggs = Map::new();
            for field in &self.facet_fields {
                aggs.insert(field.clone(), json!({ "terms": { "field": field } }));
            }
            body.insert("aggs".to_string(), Value::Object(aggs));
        }

        if !self.highlight_fields.is_empty() {
            let mut hfields = Map::new();
            for field in &self.highlight_fields {
                hfields.insert(
                    field.clone(),
                    json!({
                        "fragment_size": HIGHLIGHT_FRAGMENT_SIZE,
                        "number_of_fragments": 0
                    }),
                );
            }
            body.insert("highlight".to_string(), json!({ "fields": hfields }));
        }

        if self.fields != ["_source"] {
            body.insert("_source".to_string(), json!(self.fields));
        }
        if self.explain {
            body.insert("explain".to_string(), json!(true));
        }

        Value::Object(body)
    }
}
