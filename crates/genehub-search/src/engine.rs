//! The query engine: turns a normalized request plus a user snapshot into a
//! search body, executes it against the index backend, and adapts the raw
//! response into a [`SearchResult`].
//!
//! Faults never escape: any backend or translation error becomes an error
//! result with empty hits, so callers render a degraded page instead of a
//! failure. Dataset requests are proxied to the dataset service instead of
//! the index.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{info, instrument, warn};

use genehub_core::{
    AuthenticatedUser, Error, Hit, ObjectType, PageWindow, Result, SearchRequest, SearchResult,
    MAX_QUERY_LENGTH,
};

use crate::backend::{IndexBackend, RawHit};
use crate::dataset::{DatasetClient, DatasetOrder};
use crate::permission::{build_predicates, predicates_to_filter};
use crate::query::{IndexQuery, QueryNode};

pub struct IndexEngine {
    backend: Arc<dyn IndexBackend>,
    dataset: Option<Arc<DatasetClient>>,
}

impl IndexEngine {
    pub fn new(backend: Arc<dyn IndexBackend>) -> Self {
        Self {
            backend,
            dataset: None,
        }
    }

    pub fn with_dataset(mut self, dataset: Arc<DatasetClient>) -> Self {
        self.dataset = Some(dataset);
        self
    }

    /// Execute a search. Always returns a `SearchResult`; failures are
    /// captured in its `error` field.
    #[instrument(skip(self, request, user), fields(subsystem = "search", component = "engine"))]
    pub async fn query(
        &self,
        request: &SearchRequest,
        user: Option<&AuthenticatedUser>,
    ) -> SearchResult {
        // Re-checked here so a caller constructing requests directly still
        // cannot reach the backend with an oversized query.
        if request.query_text.len() > MAX_QUERY_LENGTH {
            let err = Error::QueryTooLong {
                len: request.query_text.len(),
                max: MAX_QUERY_LENGTH,
            };
            warn!(action = "query_rejected", qlen = request.query_text.len(), "{err}");
            return SearchResult::from_error(err.to_string());
        }

        let started = Instant::now();
        let outcome = if request.primary_type() == ObjectType::Dataset {
            self.query_dataset(request).await
        } else {
            self.query_index(request, user).await
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(result) => {
                info!(
                    action = "es_query",
                    qlen = request.query_text.len(),
                    types = %request
                        .object_types
                        .iter()
                        .map(|t| t.as_str())
                        .collect::<Vec<_>>()
                        .join(","),
                    total = result.total,
                    num_hits = result.hit_count(),
                    duration_ms,
                    success = true,
                );
                result
            }
            Err(err) => {
                warn!(
                    action = "es_query",
                    qlen = request.query_text.len(),
                    duration_ms,
                    success = false,
                    errormsg = %err,
                );
                SearchResult::from_error(err.to_string())
            }
        }
    }

    /// Build the index query for a request. Exposed so the pager can re-run
    /// the same query with a shifted window.
    pub fn build_query(
        &self,
        request: &SearchRequest,
        user: Option<&AuthenticatedUser>,
    ) -> IndexQuery {
        let mut filters = vec![type_routing(request)];

        // Object-level permissions apply to user-owned types only; gene
        // documents are public reference data.
        if request.object_types.iter().any(ObjectType::is_indexed) {
            filters.push(predicates_to_filter(&build_predicates(user)));
        }

        for (field, values) in &request.filters {
            filters.push(QueryNode::terms(
                field,
                values.iter().map(|v| Value::String(v.clone())).collect(),
            ));
        }

        self.assemble(request, filters)
    }

    /// Build an index query with a caller-supplied filter applied verbatim
    /// in place of the permission and parameter filters. Administrative
    /// path; type routing is still enforced.
    pub fn build_query_with_filter(
        &self,
        request: &SearchRequest,
        filter: QueryNode,
    ) -> IndexQuery {
        self.assemble(request, vec![type_routing(request), filter])
    }

    fn assemble(&self, request: &SearchRequest, filters: Vec<QueryNode>) -> IndexQuery {
        let main = if request.query_text.is_empty() {
            QueryNode::MatchAll
        } else {
            QueryNode::QueryString {
                query: request.query_text.clone(),
            }
        };

        let mut iq = IndexQuery::new(QueryNode::filtered(main, filters))
            .with_window(request.start, request.size);
        iq.sort = request.sort.clone();
        iq.facet_fields = if request.facet_fields.is_empty() {
            default_facets(&request.object_types)
        } else {
            request.facet_fields.clone()
        };
        iq.highlight_fields = request.highlight_fields.clone();
        iq.fields = request.fields.clone();
        iq.explain = request.explain;
        iq
    }

    async fn query_index(
        &self,
        request: &SearchRequest,
        user: Option<&AuthenticatedUser>,
    ) -> Result<SearchResult> {
        let iq = self.build_query(request, user);
        self.execute(&iq).await
    }

    /// Run a prepared index query. Also the pager's entry point.
    pub async fn execute(&self, iq: &IndexQuery) -> Result<SearchResult> {
        let response = self.backend.search(&iq.body()).await?;
        let hits = response.hits.into_iter().map(adapt_hit).collect();
        let mut result = SearchResult::new(
            hits,
            response.total,
            PageWindow::new(iq.from, iq.size),
        );
        result.facets = response.aggregations;
        Ok(result)
    }

    async fn query_dataset(&self, request: &SearchRequest) -> Result<SearchResult> {
        let dataset = self
            .dataset
            .as_ref()
            .ok_or_else(|| Error::Config("dataset service is not configured".to_string()))?;

        let page_by = request.size.max(1);
        let page = request.start / page_by + 1;
        let species = request
            .filters
            .get("species")
            .and_then(|v| v.first())
            .map(String::as_str);
        let tag = request
            .filters
            .get("tag")
            .and_then(|v| v.first())
            .map(String::as_str);

        if request.is_search() {
            dataset
                .search(Some(&request.query_text), species, tag, page, page_by, false)
                .await
        } else if species.is_some() || tag.is_some() {
            dataset.search(None, species, tag, page, page_by, true).await
        } else {
            let order = if request.sort.iter().any(|k| k.field == "created") {
                DatasetOrder::Newest
            } else {
                DatasetOrder::Popular
            };
            dataset.list(page, page_by, order).await
        }
    }

    /// Fetch a single object by type and id, subject to the same visibility
    /// rules as search. `Ok(None)` when nothing matches; an id matching more
    /// than one document is a data fault and surfaces as an error.
    pub async fn get(
        &self,
        object_type: ObjectType,
        id: &str,
        user: Option<&AuthenticatedUser>,
    ) -> Result<Option<Hit>> {
        let mut filters = vec![QueryNode::term("object_type", object_type.as_str())];
        if object_type.is_indexed() {
            filters.push(predicates_to_filter(&build_predicates(user)));
        }
        let query = QueryNode::filtered(QueryNode::term("id", id), filters);
        let iq = IndexQuery::new(query).with_window(0, 2);
        let response = self.backend.search(&iq.body()).await?;
        match response.total {
            0 => Ok(None),
            1 => Ok(response.hits.into_iter().next().map(adapt_hit)),
            n => Err(Error::AmbiguousId(format!(
                "{object_type} id {id:?} matches {n} documents"
            ))),
        }
    }

    /// Backend health, for the status endpoint.
    pub async fn status(&self) -> Result<Value> {
        self.backend.health().await
    }
}

/// Datasets live outside the index and never appear in type routing.
fn type_routing(request: &SearchRequest) -> QueryNode {
    let type_values: Vec<Value> = request
        .object_types
        .iter()
        .filter(|t| **t != ObjectType::Dataset)
        .map(|t| Value::String(t.as_str().to_string()))
        .collect();
    QueryNode::terms("object_type", type_values)
}

/// Hits keep the document body as returned; highlight fragments, when
/// requested, ride along under a `highlight` key.
fn adapt_hit(raw: RawHit) -> Hit {
    let mut fields = raw.fields;
    if let Some(highlight) = raw.highlight {
        if let Some(obj) = fields.as_object_mut() {
            obj.insert("highlight".to_string(), highlight);
        }
    }
    Hit::new(raw.id, fields)
}

/// Union of the default facet fields of the requested types, first
/// occurrence wins.
fn default_facets(types: &[ObjectType]) -> Vec<String> {
    let mut fields = Vec::new();
    for t in types {
        for f in t.default_facets() {
            if !fields.iter().any(|existing| existing == f) {
                fields.push((*f).to_string());
            }
        }
    }
    fields
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryIndex;
    use genehub_core::RawSearchParams;
    use serde_json::json;

    fn plugin_doc(id: u64, name: &str, tag: &str) -> Value {
        json!({
            "id": id,
            "object_type": "plugin",
            "name": name,
            "tag": [tag],
            "role_permission": ["genehubusers"],
            "username": "cwudemo",
        })
    }

    fn engine_with(docs: Vec<Value>) -> (IndexEngine, Arc<MemoryIndex>) {
        let mut index = MemoryIndex::new();
        for doc in docs {
            index.add(doc);
        }
        let index = Arc::new(index);
        (IndexEngine::new(index.clone()), index)
    }

    fn request(params: &[(&str, &str)]) -> SearchRequest {
        let raw: RawSearchParams = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        SearchRequest::normalize(&raw).unwrap()
    }

    #[tokio::test]
    async fn test_keyword_search_counts_and_facets() {
        let (engine, _) = engine_with(vec![
            plugin_doc(1, "Gene expression atlas", "expression"),
            plugin_doc(2, "Pathway viewer", "pathway"),
            plugin_doc(3, "Expression heatmap", "expression"),
        ]);
        let req = request(&[("q", "expression"), ("in", "plugin")]);
        let res = engine.query(&req, None).await;
        assert!(!res.has_error());
        assert_eq!(res.total, 2);
        // default plugin facets kick in without an explicit `f` param
        assert_eq!(res.facet("tag")[0].term, "expression");
        assert_eq!(res.facet("tag")[0].count, 2);
    }

    #[tokio::test]
    async fn test_private_docs_hidden_from_anonymous() {
        let (engine, _) = engine_with(vec![
            plugin_doc(1, "Public plugin", "demo"),
            json!({
                "id": 2,
                "object_type": "plugin",
                "name": "Secret plugin",
                "role_permission": ["curatorgroup"],
                "username": "alice",
            }),
        ]);
        let req = request(&[("in", "plugin")]);

        let res = engine.query(&req, None).await;
        assert_eq!(res.total, 1);

        // the owner sees both
        let alice = AuthenticatedUser::new(7, "alice");
        let res = engine.query(&req, Some(&alice)).await;
        assert_eq!(res.total, 2);
    }

    #[tokio::test]
    async fn test_gene_search_skips_permission_filter() {
        let (engine, _) = engine_with(vec![json!({
            "id": 1017,
            "object_type": "gene",
            "symbol": "CDK2",
        })]);
        let req = request(&[("q", "CDK2"), ("in", "gene")]);
        let res = engine.query(&req, None).await;
        assert_eq!(res.total, 1);
    }

    #[tokio::test]
    async fn test_oversized_query_never_reaches_backend() {
        let (engine, index) = engine_with(vec![plugin_doc(1, "A", "t")]);
        let mut req = request(&[("in", "plugin")]);
        req.query_text = "x".repeat(MAX_QUERY_LENGTH + 1);

        let res = engine.query(&req, None).await;
        assert!(res.has_error());
        assert_eq!(res.total, 0);
        assert_eq!(index.search_count(), 0);
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let (engine, _) = engine_with(vec![plugin_doc(5, "Atlas", "demo")]);

        let hit = engine.get(ObjectType::Plugin, "5", None).await.unwrap();
        assert_eq!(hit.unwrap().field_str("name"), Some("Atlas"));

        let missing = engine.get(ObjectType::Plugin, "99", None).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_get_honors_visibility() {
        let (engine, _) = engine_with(vec![json!({
            "id": 2,
            "object_type": "plugin",
            "name": "Secret plugin",
            "role_permission": ["curatorgroup"],
            "username": "alice",
        })]);

        let anon = engine.get(ObjectType::Plugin, "2", None).await.unwrap();
        assert!(anon.is_none());

        let alice = AuthenticatedUser::new(7, "alice");
        let owned = engine.get(ObjectType::Plugin, "2", Some(&alice)).await.unwrap();
        assert!(owned.is_some());
    }

    #[tokio::test]
    async fn test_get_ambiguous_id_is_an_error() {
        let (engine, _) = engine_with(vec![
            plugin_doc(5, "Atlas", "demo"),
            plugin_doc(5, "Atlas copy", "demo"),
        ]);
        let err = engine.get(ObjectType::Plugin, "5", None).await.unwrap_err();
        assert!(matches!(err, Error::AmbiguousId(_)));
    }

    #[tokio::test]
    async fn test_dataset_request_without_service_is_an_error_result() {
        let (engine, index) = engine_with(vec![]);
        let req = request(&[("q", "cancer"), ("in", "dataset")]);
        let res = engine.query(&req, None).await;
        assert!(res.has_error());
        assert_eq!(index.search_count(), 0);
    }

    #[tokio::test]
    async fn test_custom_filter_replaces_permission_filter() {
        let (engine, _) = engine_with(vec![json!({
            "id": 2,
            "object_type": "plugin",
            "name": "Secret plugin",
            "role_permission": ["curatorgroup"],
            "username": "alice",
        })]);
        let req = request(&[("in", "plugin")]);

        // invisible through the normal path
        assert_eq!(engine.query(&req, None).await.total, 0);

        // visible when a caller supplies its own filter verbatim
        let iq = engine.build_query_with_filter(&req, QueryNode::term("username", "alice"));
        let res = engine.execute(&iq).await.unwrap();
        assert_eq!(res.total, 1);
    }

    #[test]
    fn test_build_query_shape() {
        let (engine, _) = engine_with(vec![]);
        let req = request(&[("q", "cancer"), ("in", "plugin"), ("tag", "expression")]);
        let body = engine.build_query(&req, None).body();

        let filters = body["query"]["bool"]["filter"].as_array().unwrap();
        assert_eq!(filters.len(), 3); // type routing, permission, tag
        assert_eq!(
            filters[0]["terms"]["object_type"],
            json!(["plugin"])
        );
        assert_eq!(filters[2]["terms"]["tag"], json!(["expression"]));
    }
}
