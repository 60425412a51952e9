//! Query classification and dispatch for gene identifier resolution.
//!
//! A raw user query is classified in priority order: genomic interval,
//! batch identifier list, rejected wildcard batch, then free-text keyword.
//! Whatever happens downstream, the caller always receives a
//! [`GeneQueryOutcome`]; remote faults are folded into its `error` field.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use genehub_core::{safe_genome_pos, Result, Species};

use crate::client::{GeneInfoClient, DEFAULT_FIELDS, ID_SCOPES};
use crate::tokenize::split_query_terms;

static INTERVAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)chr(?P<chr>\w+):(?P<gstart>[0-9,]+)-(?P<gend>[0-9,]+)")
        .expect("invalid interval pattern")
});

static SPECIES_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)species:(?P<species>\w+)").expect("invalid species pattern"));

const TIMEOUT_MSG: &str = "Your query times out now. Consider modify it and try again.";
const NEED_SPECIES_MSG: &str =
    "Need to specify a valid \"species\" parameter, e.g., \"species:human\".";
const WILDCARD_MSG: &str = "Please do wildcard query one at a time.";
const EMPTY_QUERY_MSG: &str = "Invalid input parameters!";

/// How a query was classified and dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    Interval,
    Id,
    Keyword,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Interval => "interval",
            QueryKind::Id => "id",
            QueryKind::Keyword => "keyword",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneQueryData {
    #[serde(rename = "geneList")]
    pub gene_list: Vec<Value>,
    #[serde(rename = "totalCount")]
    pub total_count: usize,
    pub qtype: QueryKind,
    /// Input terms that matched nothing (batch lookups only).
    #[serde(rename = "notfound", default, skip_serializing_if = "Vec::is_empty")]
    pub not_found: Vec<String>,
    /// Per-term errors reported by the service (batch lookups only).
    #[serde(rename = "error", default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    /// The query as sent, for interval/keyword dispatches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

impl GeneQueryData {
    fn new(qtype: QueryKind, gene_list: Vec<Value>) -> Self {
        Self {
            total_count: gene_list.len(),
            gene_list,
            qtype,
            not_found: Vec::new(),
            errors: Vec::new(),
            query: None,
        }
    }
}

/// Uniform result shape for every resolution attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneQueryOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<GeneQueryData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GeneQueryOutcome {
    fn ok(data: GeneQueryData) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn fail(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

/// A classified query, before any network call.
#[derive(Debug, Clone, PartialEq)]
enum Classified {
    Empty,
    Malformed(String),
    IntervalMissingSpecies,
    Interval { query: String, species: &'static str },
    WildcardBatch,
    Batch(Vec<String>),
    Keyword(String),
}

fn classify(raw: &str) -> Classified {
    let q = raw.trim();
    if q.is_empty() {
        return Classified::Empty;
    }

    if let Some(caps) = INTERVAL_RE.captures(q) {
        let species = SPECIES_TOKEN_RE
            .captures(q)
            .and_then(|c| Species::by_name(&c["species"].to_lowercase()));
        let Some(species) = species else {
            return Classified::IntervalMissingSpecies;
        };
        let (Ok(gstart), Ok(gend)) = (
            safe_genome_pos(&caps["gstart"]),
            safe_genome_pos(&caps["gend"]),
        ) else {
            return Classified::Malformed("invalid genome interval".to_string());
        };
        return Classified::Interval {
            query: format!("chr{}:{}-{}", &caps["chr"], gstart, gend),
            species: species.name,
        };
    }

    let with_wildcard = q.contains('*') || q.contains('?');
    let terms = match split_query_terms(q) {
        Ok(terms) => terms,
        Err(e) => return Classified::Malformed(e.to_string()),
    };
    match terms.len() {
        0 => Classified::Empty,
        1 => Classified::Keyword(q.to_string()),
        _ if with_wildcard => Classified::WildcardBatch,
        _ => Classified::Batch(terms),
    }
}

pub struct GeneResolver {
    client: GeneInfoClient,
}

impl GeneResolver {
    pub fn new(client: GeneInfoClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &GeneInfoClient {
        &self.client
    }

    /// Resolve a raw gene query, optionally within a server-side
    /// `userfilter` gene set. Never fails; every fault is reported through
    /// the outcome's `error` field.
    pub async fn resolve(&self, raw_query: &str, userfilter: Option<&str>) -> GeneQueryOutcome {
        let outcome = match classify(raw_query) {
            Classified::Empty => GeneQueryOutcome::fail(EMPTY_QUERY_MSG),
            Classified::Malformed(msg) => GeneQueryOutcome::fail(msg),
            Classified::IntervalMissingSpecies => GeneQueryOutcome::fail(NEED_SPECIES_MSG),
            Classified::WildcardBatch => GeneQueryOutcome::fail(WILDCARD_MSG),
            Classified::Interval { query, species } => self
                .query_by_interval(&query, species, userfilter)
                .await
                .unwrap_or_else(fold_error),
            Classified::Batch(terms) => self
                .query_by_id(&terms, userfilter)
                .await
                .unwrap_or_else(fold_error),
            Classified::Keyword(q) => self
                .query_by_keyword(&q, userfilter)
                .await
                .unwrap_or_else(fold_error),
        };
        info!(
            subsystem = "geneinfo",
            action = "gene_query",
            qlen = raw_query.len(),
            qtype = outcome.data.as_ref().map(|d| d.qtype.as_str()).unwrap_or("-"),
            num_hits = outcome.data.as_ref().map(|d| d.total_count).unwrap_or(0),
            success = outcome.success,
        );
        outcome
    }

    async fn query_by_interval(
        &self,
        query: &str,
        species: &str,
        userfilter: Option<&str>,
    ) -> Result<GeneQueryOutcome> {
        let res = self.client.query(query, Some(species), userfilter).await?;
        if let Some(err) = service_error(&res) {
            return Ok(GeneQueryOutcome::fail(err));
        }
        let mut data = GeneQueryData::new(QueryKind::Interval, hits_of(res));
        data.query = Some(query.to_string());
        Ok(GeneQueryOutcome::ok(data))
    }

    async fn query_by_keyword(
        &self,
        query: &str,
        userfilter: Option<&str>,
    ) -> Result<GeneQueryOutcome> {
        let res = self.client.query(query, None, userfilter).await?;
        if let Some(err) = service_error(&res) {
            return Ok(GeneQueryOutcome::fail(err));
        }
        let mut data = GeneQueryData::new(QueryKind::Keyword, hits_of(res));
        data.query = Some(query.to_string());
        Ok(GeneQueryOutcome::ok(data))
    }

    /// Batch lookup. Matched, unmatched, and erroring terms are reported in
    /// separate buckets; no input term is silently dropped.
    async fn query_by_id(
        &self,
        terms: &[String],
        userfilter: Option<&str>,
    ) -> Result<GeneQueryOutcome> {
        let res = self
            .client
            .query_ids(terms, ID_SCOPES, DEFAULT_FIELDS, userfilter)
            .await?;
        if let Some(err) = service_error(&res) {
            return Ok(GeneQueryOutcome::fail(err));
        }
        let hits = match res {
            Value::Array(hits) => hits,
            other => {
                return Ok(GeneQueryOutcome::fail(format!(
                    "unexpected batch response: {other}"
                )))
            }
        };

        let mut data = GeneQueryData::new(QueryKind::Id, Vec::new());
        for hit in hits {
            if hit.get("notfound").and_then(Value::as_bool) == Some(true) {
                if let Some(term) = hit.get("query").and_then(Value::as_str) {
                    data.not_found.push(term.to_string());
                }
            } else if let Some(err) = hit.get("error") {
                data.errors.push(json_str(err));
            } else {
                data.gene_list.push(hit);
            }
        }
        crate::client::trim_homologene(&mut data.gene_list);
        data.total_count = data.gene_list.len();
        Ok(GeneQueryOutcome::ok(data))
    }
}

/// A transport-level failure, rewritten when it is a timeout.
fn fold_error(err: genehub_core::Error) -> GeneQueryOutcome {
    if err.is_timeout() {
        GeneQueryOutcome::fail(TIMEOUT_MSG)
    } else {
        GeneQueryOutcome::fail(err.to_string())
    }
}

/// An application-level `error` field in an otherwise successful response.
fn service_error(res: &Value) -> Option<String> {
    let err = res.get("error")?;
    let msg = json_str(err);
    if msg == "timeout" {
        Some(TIMEOUT_MSG.to_string())
    } else {
        Some(msg)
    }
}

fn hits_of(res: Value) -> Vec<Value> {
    let mut hits = match res.get("hits") {
        Some(Value::Array(hits)) => hits.clone(),
        _ => Vec::new(),
    };
    crate::client::trim_homologene(&mut hits);
    hits
}

fn json_str(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_interval_with_species_token() {
        let c = classify("chr7:55,000,000-55200000 species:human");
        assert_eq!(
            c,
            Classified::Interval {
                query: "chr7:55000000-55200000".to_string(),
                species: "human",
            }
        );
    }

    #[test]
    fn test_classify_interval_species_case_insensitive() {
        let c = classify("SPECIES:Human chrX:1-1000");
        assert!(matches!(c, Classified::Interval { species: "human", .. }));
    }

    #[test]
    fn test_classify_interval_without_species() {
        assert_eq!(classify("chr7:1-1000"), Classified::IntervalMissingSpecies);
        // an unrecognized species name is as good as none
        assert_eq!(
            classify("chr7:1-1000 species:martian"),
            Classified::IntervalMissingSpecies
        );
    }

    #[test]
    fn test_classify_wildcard_batch_rejected() {
        assert_eq!(classify("CDK*, CDK2"), Classified::WildcardBatch);
        // a single wildcard term is a legitimate keyword query
        assert!(matches!(classify("CDK*"), Classified::Keyword(_)));
    }

    #[test]
    fn test_classify_batch_and_keyword() {
        assert_eq!(
            classify("CDK2, CDK3"),
            Classified::Batch(vec!["CDK2".to_string(), "CDK3".to_string()])
        );
        assert_eq!(
            classify("insulin receptor"),
            Classified::Keyword("insulin receptor".to_string())
        );
        assert_eq!(classify("   "), Classified::Empty);
    }

    #[test]
    fn test_classify_malformed() {
        assert!(matches!(classify("\"CDK2"), Classified::Malformed(_)));
    }

    #[test]
    fn test_service_error_timeout_rewrite() {
        let res = serde_json::json!({ "error": "timeout" });
        assert_eq!(service_error(&res).as_deref(), Some(TIMEOUT_MSG));

        let res = serde_json::json!({ "error": "bad query" });
        assert_eq!(service_error(&res).as_deref(), Some("bad query"));

        let res = serde_json::json!({ "hits": [] });
        assert!(service_error(&res).is_none());
    }

    #[test]
    fn test_outcome_serialization_shape() {
        let mut data = GeneQueryData::new(QueryKind::Id, vec![serde_json::json!({ "id": "1017" })]);
        data.not_found.push("NOSUCHGENE".to_string());
        let out = GeneQueryOutcome::ok(data);
        let v = serde_json::to_value(&out).unwrap();
        assert_eq!(v["success"], true);
        assert_eq!(v["data"]["totalCount"], 1);
        assert_eq!(v["data"]["qtype"], "id");
        assert_eq!(v["data"]["notfound"][0], "NOSUCHGENE");
        assert!(v["data"].get("error").is_none());
    }
}
