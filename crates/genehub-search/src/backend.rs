//! The index backend seam: a trait the engine executes queries through,
//! with an HTTP implementation for a real document index.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};

use genehub_core::{Error, FacetBucket, Result};

/// Request timeout for index calls; a slow index must surface as an error
/// result, not a hung request.
const INDEX_TIMEOUT_SECS: u64 = 10;

/// One raw hit as returned by the index.
#[derive(Debug, Clone, PartialEq)]
pub struct RawHit {
    pub id: String,
    /// Full document when `_source` was requested, field projection
    /// otherwise.
    pub fields: Value,
    pub highlight: Option<Value>,
}

/// Parsed index response: one page of hits plus facet buckets computed over
/// the full match set.
#[derive(Debug, Clone, Default)]
pub struct IndexResponse {
    pub hits: Vec<RawHit>,
    pub total: u64,
    pub aggregations: BTreeMap<String, Vec<FacetBucket>>,
}

impl IndexResponse {
    /// Parse the index's JSON search response.
    pub fn from_json(body: &Value) -> Result<IndexResponse> {
        let hits_obj = body
            .get("hits")
            .ok_or_else(|| Error::Search("index response missing \"hits\"".to_string()))?;

        // `total` is a bare number on older indexes, `{value, relation}` on
        // newer ones.
        let total = match hits_obj.get("total") {
            Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
            Some(Value::Object(o)) => o.get("value").and_then(Value::as_u64).unwrap_or(0),
            _ => 0,
        };

        let mut hits = Vec::new();
        if let Some(list) = hits_obj.get("hits").and_then(Value::as_array) {
            for hit in list {
                let id = hit
                    .get("_id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| Error::Search("hit missing \"_id\"".to_string()))?
                    .to_string();
                let fields = hit
                    .get("fields")
                    .or_else(|| hit.get("_source"))
                    .cloned()
                    .unwrap_or_else(|| serde_json::json!({ "id": id }));
                hits.push(RawHit {
                    id,
                    fields,
                    highlight: hit.get("highlight").cloned(),
                });
            }
        }

        let mut aggregations = BTreeMap::new();
        if let Some(aggs) = body.get("aggregations").and_then(Value::as_object) {
            for (field, agg) in aggs {
                let mut buckets = Vec::new();
                if let Some(list) = agg.get("buckets").and_then(Value::as_array) {
                    for bucket in list {
                        let term = match bucket.get("key") {
                            Some(Value::String(s)) => s.clone(),
                            Some(other) => other.to_string(),
                            None => continue,
                        };
                        let count = bucket.get("doc_count").and_then(Value::as_u64).unwrap_or(0);
                        buckets.push(FacetBucket { term, count });
                    }
                }
                aggregations.insert(field.clone(), buckets);
            }
        }

        Ok(IndexResponse {
            hits,
            total,
            aggregations,
        })
    }
}

/// Executes search bodies against a document index.
#[async_trait]
pub trait IndexBackend: Send + Sync {
    /// Run one search body and return the parsed response.
    async fn search(&self, body: &Value) -> Result<IndexResponse>;

    /// Cluster health / status passthrough for monitoring.
    async fn health(&self) -> Result<Value>;
}

/// HTTP backend talking to a real document index.
pub struct HttpIndexBackend {
    client: reqwest::Client,
    base_url: String,
    index: String,
}

impl HttpIndexBackend {
    /// Create a backend for `{base_url}/{index}`.
    pub fn new(base_url: impl Into<String>, index: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(INDEX_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Config(format!("failed to build index client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            index: index.into(),
        })
    }
}

#[async_trait]
impl IndexBackend for HttpIndexBackend {
    #[instrument(skip(self, body), fields(subsystem = "search", component = "http_index"))]
    async fn search(&self, body: &Value) -> Result<IndexResponse> {
        let url = format!("{}/{}/_search", self.base_url, self.index);
        debug!(url = %url, "issuing index query");
        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Search(format!(
                "index returned {status}: {text}"
            )));
        }
        let json: Value = response.json().await?;
        IndexResponse::from_json(&json)
    }

    async fn health(&self) -> Result<Value> {
        let url = format!("{}/_cluster/health", self.base_url);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Search(format!("index health returned {status}")));
        }
        Ok(response.json().await?)
    }
}
