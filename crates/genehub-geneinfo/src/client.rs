//! HTTP client for the remote gene-information service.
//!
//! The service answers identifier and keyword queries over a large corpus
//! of gene documents. Responses are passed through almost verbatim; the
//! one normalization applied everywhere is homology trimming: cross-species
//! homolog groups are cut down to the species this portal recognizes, and
//! the service's `_id` field is mirrored to `id` for API uniformity.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, instrument, warn};

use genehub_core::{Error, Result, Species};

/// Identifier scopes searched by a batch id lookup.
pub const ID_SCOPES: &[&str] = &[
    "accession",
    "alias",
    "ensemblgene",
    "ensemblprotein",
    "ensembltranscript",
    "entrezgene",
    "flybase",
    "go",
    "hgnc",
    "hprd",
    "interpro",
    "ipi",
    "mgi",
    "mim",
    "mirbase",
    "pdb",
    "pharmgkb",
    "pir",
    "prosite",
    "ratmap",
    "reagent",
    "refseq",
    "reporter",
    "retired",
    "rgd",
    "symbol",
    "tair",
    "unigene",
    "uniprot",
    "wormbase",
    "xenbase",
    "zfin",
];

/// Fields requested for gene documents unless the caller narrows them.
pub const DEFAULT_FIELDS: &[&str] = &[
    "symbol",
    "name",
    "taxid",
    "entrezgene",
    "ensemblgene",
    "homologene",
];

/// Hard cap on identifiers per batch call; larger inputs must be chunked
/// by the caller.
pub const MAX_BATCH_IDS: usize = 10_000;

/// Page size requested from the service (its own maximum).
const QUERY_SIZE: usize = 1000;

/// Connection failures are retried this many times before giving up.
const MAX_RETRIES: usize = 5;

const REQUEST_TIMEOUT_SECS: u64 = 30;

const USER_AGENT: &str = concat!("genehub-reqwest/", env!("CARGO_PKG_VERSION"), " (gzip)");

pub struct GeneInfoClient {
    client: reqwest::Client,
    base_url: String,
    /// Optional predefined server-side filter applied to every query.
    userfilter: Option<String>,
}

impl GeneInfoClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Config(format!("failed to build gene-info client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            userfilter: None,
        })
    }

    pub fn with_userfilter(mut self, userfilter: impl Into<String>) -> Self {
        self.userfilter = Some(userfilter.into());
        self
    }

    /// Per-request filter wins over the client-wide default.
    fn effective_userfilter<'a>(&'a self, userfilter: Option<&'a str>) -> Option<&'a str> {
        userfilter.or(self.userfilter.as_deref())
    }

    async fn send_with_retry(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let mut attempt = 0;
        loop {
            let cloned = request
                .try_clone()
                .ok_or_else(|| Error::Internal("unclonable request".to_string()))?;
            match cloned.send().await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_connect() && attempt < MAX_RETRIES => {
                    attempt += 1;
                    warn!(attempt, errormsg = %e, "gene-info connection failed, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn read_json(&self, response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        if status.as_u16() == 404 {
            return Err(Error::NotFound("gene-info resource".to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::RemoteService {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }

    /// Batch identifier lookup via `POST /query`. One entry per input term,
    /// in input order; unmatched terms come back flagged `notfound`.
    #[instrument(skip(self, terms), fields(subsystem = "geneinfo", action = "query_ids", num_terms = terms.len()))]
    pub async fn query_ids(
        &self,
        terms: &[String],
        scopes: &[&str],
        fields: &[&str],
        userfilter: Option<&str>,
    ) -> Result<Value> {
        if terms.len() > MAX_BATCH_IDS {
            return Err(Error::InvalidInput(format!(
                "too many identifiers in one batch ({} > {MAX_BATCH_IDS})",
                terms.len()
            )));
        }
        let mut form = vec![
            ("q".to_string(), serde_json::to_string(terms)?),
            ("jsoninput".to_string(), "true".to_string()),
            ("scopes".to_string(), scopes.join(",")),
            ("fields".to_string(), fields.join(",")),
            ("size".to_string(), QUERY_SIZE.to_string()),
            ("species".to_string(), Species::default_species_param()),
        ];
        if let Some(f) = self.effective_userfilter(userfilter) {
            form.push(("userfilter".to_string(), f.to_string()));
        }
        let request = self
            .client
            .post(format!("{}/query", self.base_url))
            .form(&form);
        let response = self.send_with_retry(request).await?;
        self.read_json(response).await
    }

    /// Free-text or interval search via `GET /query`.
    #[instrument(skip(self), fields(subsystem = "geneinfo", action = "query", qlen = q.len()))]
    pub async fn query(
        &self,
        q: &str,
        species: Option<&str>,
        userfilter: Option<&str>,
    ) -> Result<Value> {
        let species_param = match species {
            Some(s) => s.to_string(),
            None => Species::default_species_param(),
        };
        let mut params = vec![
            ("q".to_string(), q.to_string()),
            ("fields".to_string(), DEFAULT_FIELDS.join(",")),
            ("species".to_string(), species_param),
            ("size".to_string(), QUERY_SIZE.to_string()),
        ];
        if let Some(f) = self.effective_userfilter(userfilter) {
            params.push(("userfilter".to_string(), f.to_string()));
        }
        let request = self
            .client
            .get(format!("{}/query", self.base_url))
            .query(&params);
        let response = self.send_with_retry(request).await?;
        self.read_json(response).await
    }

    /// Single-document fetch. A 404 is a normal "not found". When one id
    /// maps to several documents the first is returned, with a `warning`
    /// field noting how many were matched.
    #[instrument(skip(self), fields(subsystem = "geneinfo", action = "get_gene"))]
    pub async fn get_gene(&self, geneid: &str, fields: Option<&[&str]>) -> Result<Option<Value>> {
        let mut params = vec![("species".to_string(), Species::default_species_param())];
        if let Some(f) = fields {
            params.push(("fields".to_string(), f.join(",")));
        }
        let request = self
            .client
            .get(format!("{}/gene/{geneid}", self.base_url))
            .query(&params);
        let response = self.send_with_retry(request).await?;
        let gene = match self.read_json(response).await {
            Ok(v) => v,
            Err(Error::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        let mut gene = match gene {
            Value::Array(list) if list.is_empty() => return Ok(None),
            Value::Array(mut list) => {
                let n = list.len();
                let mut first = list.swap_remove(0);
                if n > 1 {
                    debug!(matches = n, "id is ambiguous, taking the first match");
                    if let Some(obj) = first.as_object_mut() {
                        obj.insert(
                            "warning".to_string(),
                            Value::String(format!(
                                "Matching {n} genes and only the first one is returned."
                            )),
                        );
                    }
                }
                first
            }
            other => other,
        };
        trim_homologene(std::slice::from_mut(&mut gene));
        Ok(Some(gene))
    }

    /// Resolve a list of gene ids (entrez/ensembl/retired) into minimal
    /// gene objects, silently dropping unmatched ids.
    pub async fn query_gene_list(&self, geneids: &[String]) -> Result<Vec<Value>> {
        let res = self
            .query_ids(
                geneids,
                &["entrezgene", "ensemblgene", "retired"],
                &["symbol", "name", "taxid"],
                None,
            )
            .await?;
        let hits = match res {
            Value::Array(hits) => hits,
            other => {
                return Err(Error::Search(format!(
                    "unexpected gene-list response: {other}"
                )))
            }
        };
        let mut genes: Vec<Value> = hits
            .into_iter()
            .filter(|h| {
                h.get("notfound").and_then(Value::as_bool) != Some(true)
                    && h.get("error").is_none()
            })
            .collect();
        trim_homologene(&mut genes);
        Ok(genes)
    }

    /// Service metadata (document counts, build info).
    pub async fn metadata(&self) -> Result<Value> {
        let request = self.client.get(format!("{}/metadata", self.base_url));
        let response = self.send_with_retry(request).await?;
        self.read_json(response).await
    }
}

/// Trim `homologene.genes` down to recognized species and mirror `_id`
/// to `id`. Applied in place to every document list leaving this crate.
pub fn trim_homologene(docs: &mut [Value]) {
    let known: Vec<u64> = Species::all_taxids().iter().map(|t| *t as u64).collect();
    for doc in docs {
        let Some(obj) = doc.as_object_mut() else {
            continue;
        };
        if let Some(id) = obj.get("_id").cloned() {
            obj.insert("id".to_string(), id);
        }
        let Some(genes) = obj
            .get_mut("homologene")
            .and_then(Value::as_object_mut)
            .and_then(|h| h.get_mut("genes"))
        else {
            continue;
        };
        if let Value::Array(pairs) = genes {
            pairs.retain(|pair| {
                pair.get(0)
                    .and_then(Value::as_u64)
                    .is_some_and(|taxid| known.contains(&taxid))
            });
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_trim_homologene_filters_unknown_species() {
        let mut docs = vec![json!({
            "_id": "1017",
            "symbol": "CDK2",
            "homologene": {
                "id": 74409,
                // 7955 (zebrafish) is recognized, 9544 (macaque) is not
                "genes": [[9606, 1017], [9544, 709645], [7955, 406715]]
            }
        })];
        trim_homologene(&mut docs);
        assert_eq!(docs[0]["id"], "1017");
        assert_eq!(
            docs[0]["homologene"]["genes"],
            json!([[9606, 1017], [7955, 406715]])
        );
    }

    #[test]
    fn test_trim_homologene_without_group_is_a_noop() {
        let mut docs = vec![json!({ "_id": "1017", "symbol": "CDK2" })];
        trim_homologene(&mut docs);
        assert_eq!(docs[0]["symbol"], "CDK2");
        assert_eq!(docs[0]["id"], "1017");
    }

    #[tokio::test]
    async fn test_batch_cap_rejected_before_any_call() {
        let client = GeneInfoClient::new("http://localhost:1").unwrap();
        let terms: Vec<String> = (0..MAX_BATCH_IDS + 1).map(|i| i.to_string()).collect();
        let err = client.query_ids(&terms, ID_SCOPES, DEFAULT_FIELDS, None).await;
        assert!(matches!(err.unwrap_err(), Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_connect_failures_surface_after_retry_budget() {
        // nothing listens on port 1; the connect error is retried
        // MAX_RETRIES times and then propagated
        let client = GeneInfoClient::new("http://127.0.0.1:1").unwrap();
        let err = client.metadata().await.unwrap_err();
        assert!(matches!(err, Error::Request(_)));
    }

    #[test]
    fn test_per_request_userfilter_wins_over_default() {
        let client = GeneInfoClient::new("http://localhost:1")
            .unwrap()
            .with_userfilter("default_set");
        assert_eq!(client.effective_userfilter(None), Some("default_set"));
        assert_eq!(
            client.effective_userfilter(Some("request_set")),
            Some("request_set")
        );

        let bare = GeneInfoClient::new("http://localhost:1").unwrap();
        assert_eq!(bare.effective_userfilter(None), None);
    }
}
