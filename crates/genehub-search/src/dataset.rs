//! Client for the remote dataset service.
//!
//! Datasets are not stored in the local document index; listing and search
//! requests are proxied to an external HTTP service with its own
//! pagination/sort vocabulary, and the JSON response is adapted into the
//! same [`SearchResult`] shape the index engine produces. Dataset content
//! is globally public, so no permission filter is ever applied here.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, instrument};

use genehub_core::{Error, FacetBucket, Hit, PageWindow, Result, SearchResult};

/// Request timeout for dataset-service calls.
const DATASET_TIMEOUT_SECS: u64 = 10;

/// Sort vocabulary of the dataset service's listing endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetOrder {
    Popular,
    Newest,
}

impl DatasetOrder {
    fn as_param(self) -> &'static str {
        match self {
            DatasetOrder::Popular => "pop",
            DatasetOrder::Newest => "new",
        }
    }
}

/// HTTP client for the dataset service.
pub struct DatasetClient {
    client: reqwest::Client,
    base_url: String,
    /// Collection slug in the search endpoint path.
    collection: String,
}

impl DatasetClient {
    pub fn new(base_url: impl Into<String>, collection: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DATASET_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Config(format!("failed to build dataset client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            collection: collection.into(),
        })
    }

    async fn get_details(&self, url: &str, params: &[(&str, String)]) -> Result<Value> {
        debug!(url = %url, "dataset service request");
        let response = self.client.get(url).query(params).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::RemoteService {
                status: status.as_u16(),
                body,
            });
        }
        let json: Value = response.json().await?;
        json.get("details").cloned().ok_or_else(|| {
            Error::Serialization("dataset response missing \"details\"".to_string())
        })
    }

    /// Plain listing, newest or most popular first.
    #[instrument(skip(self), fields(subsystem = "search", component = "dataset", action = "dataset_list"))]
    pub async fn list(
        &self,
        page: usize,
        page_by: usize,
        order: DatasetOrder,
    ) -> Result<SearchResult> {
        let url = format!("{}/dataset/", self.base_url);
        let params = [
            ("page", page.to_string()),
            ("page_by", page_by.to_string()),
            ("order", order.as_param().to_string()),
        ];
        let details = self.get_details(&url, &params).await?;
        Ok(adapt_details(&details, page, page_by))
    }

    /// Query and/or filtered search, optionally requesting aggregations.
    #[instrument(skip(self), fields(subsystem = "search", component = "dataset", action = "dataset_search"))]
    pub async fn search(
        &self,
        query: Option<&str>,
        species: Option<&str>,
        tag: Option<&str>,
        page: usize,
        page_by: usize,
        with_aggregations: bool,
    ) -> Result<SearchResult> {
        let url = format!("{}/dataset/search/{}/", self.base_url, self.collection);
        let mut params = vec![
            ("page", page.to_string()),
            ("page_by", page_by.to_string()),
        ];
        if let Some(q) = query {
            params.push(("query", q.to_string()));
        }
        if let Some(s) = species {
            params.push(("species", s.to_string()));
        }
        if let Some(t) = tag {
            params.push(("tag", t.to_string()));
        }
        if with_aggregations {
            params.push(("agg", "1".to_string()));
        }
        let details = self.get_details(&url, &params).await?;
        Ok(adapt_details(&details, page, page_by))
    }

    /// The service's tag vocabulary, for navigation facets.
    pub async fn tags(&self) -> Result<Vec<String>> {
        let url = format!("{}/dataset/tag/", self.base_url);
        let details = self.get_details(&url, &[]).await?;
        let results = details
            .get("results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(results
            .iter()
            .filter_map(|t| t.get("name").and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }
}

/// Adapt a `details` payload (`results`, `count`, optional `aggregations`)
/// into a [`SearchResult`] windowed at `(page-1)*page_by`.
fn adapt_details(details: &Value, page: usize, page_by: usize) -> SearchResult {
    let results = details
        .get("results")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let count = details.get("count").and_then(Value::as_u64).unwrap_or(0);

    let hits: Vec<Hit> = results
        .into_iter()
        .map(|doc| {
            let id = match doc.get("id") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => String::new(),
            };
            Hit::new(id, doc)
        })
        .collect();

    let start = page.saturating_sub(1) * page_by;
    let mut result = SearchResult::new(hits, count, PageWindow::new(start, page_by));

    if let Some(aggs) = details.get("aggregations").and_then(Value::as_object) {
        for (field, agg) in aggs {
            result
                .facets
                .insert(field.clone(), parse_agg_buckets(agg));
        }
    }
    result
}

/// The service has emitted two aggregation shapes over time: the index-like
/// `{buckets: [{key, doc_count}]}` and a flat `[{name|term, count}]` list.
/// Accept both.
fn parse_agg_buckets(agg: &Value) -> Vec<FacetBucket> {
    let list = agg
        .get("buckets")
        .and_then(Value::as_array)
        .or_else(|| agg.as_array());
    let Some(list) = list else {
        return Vec::new();
    };
    list.iter()
        .filter_map(|bucket| {
            let term = bucket
                .get("key")
                .or_else(|| bucket.get("term"))
                .or_else(|| bucket.get("name"))
                .and_then(Value::as_str)?
                .to_string();
            let count = bucket
                .get("doc_count")
                .or_else(|| bucket.get("count"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            Some(FacetBucket { term, count })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_adapt_details_windows_by_page() {
        let details = json!({
            "results": [ { "id": 11, "name": "GeneAtlas" }, { "id": 12, "name": "Bodymap" } ],
            "count": 25
        });
        let res = adapt_details(&details, 3, 10);
        assert_eq!(res.total, 25);
        assert_eq!(res.window, PageWindow::new(20, 10));
        assert_eq!(res.hits[0].id, "11");

        // placeholders cover the un-fetched pages
        let items = res.padded_items();
        assert_eq!(items.len(), 25);
        assert!(items[0].is_none());
        assert!(items[20].is_some());
        assert!(items[22].is_none());
    }

    #[test]
    fn test_parse_agg_buckets_both_shapes() {
        let es_like = json!({ "buckets": [ { "key": "cancer", "doc_count": 4 } ] });
        assert_eq!(
            parse_agg_buckets(&es_like),
            vec![FacetBucket { term: "cancer".to_string(), count: 4 }]
        );
        let flat = json!([ { "name": "cancer", "count": 4 } ]);
        assert_eq!(
            parse_agg_buckets(&flat),
            vec![FacetBucket { term: "cancer".to_string(), count: 4 }]
        );
    }

    #[tokio::test]
    async fn test_list_translates_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dataset/"))
            .and(query_param("order", "pop"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "details": { "results": [ { "id": 1, "name": "GeneAtlas" } ], "count": 1 }
            })))
            .mount(&server)
            .await;

        let client = DatasetClient::new(server.uri(), "portal").unwrap();
        let res = client.list(1, 10, DatasetOrder::Popular).await.unwrap();
        assert_eq!(res.total, 1);
        assert_eq!(res.hits[0].field_str("name"), Some("GeneAtlas"));
    }

    #[tokio::test]
    async fn test_search_with_filters_and_aggs() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dataset/search/portal/"))
            .and(query_param("species", "human"))
            .and(query_param("agg", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "details": {
                    "results": [ { "id": 2, "name": "Human Expression" } ],
                    "count": 1,
                    "aggregations": { "tag": [ { "name": "expression", "count": 1 } ] }
                }
            })))
            .mount(&server)
            .await;

        let client = DatasetClient::new(server.uri(), "portal").unwrap();
        let res = client
            .search(None, Some("human"), None, 1, 10, true)
            .await
            .unwrap();
        assert_eq!(res.facet("tag")[0].term, "expression");
    }

    #[tokio::test]
    async fn test_non_success_is_remote_service_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dataset/tag/"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = DatasetClient::new(server.uri(), "portal").unwrap();
        let err = client.tags().await.unwrap_err();
        assert!(matches!(err, Error::RemoteService { status: 503, .. }));
    }
}
