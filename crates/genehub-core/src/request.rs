//! Query normalization: raw request parameters → a structured
//! [`SearchRequest`].
//!
//! The user-facing query mini-language allows filter directives embedded in
//! the free-text query itself (`in:plugin,layout tag:cancer species:human
//! kinase`); normalization extracts them into structured fields, strips them
//! from the display text, and applies defaults so every downstream component
//! sees one canonical request shape.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};
use crate::models::{ObjectType, SortKey};

/// Upper limit for the length of an input query string. Longer queries fail
/// fast before any backend call.
pub const MAX_QUERY_LENGTH: usize = 10_000;

/// Default page size when no `size`/`limit` parameter is given.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Hard cap on the page size a single query may request.
pub const MAX_PAGE_SIZE: usize = 1000;

static IN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"in:([\w,]+)").unwrap());
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"tag:([\w,]+)").unwrap());
static SPECIES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"species:([\w,]+)").unwrap());

fn directive_re(field: &str) -> &'static Regex {
    match field {
        "tag" => &TAG_RE,
        "species" => &SPECIES_RE,
        _ => unreachable!("no directive pattern for field {field}"),
    }
}

// =============================================================================
// RAW PARAMETERS
// =============================================================================

/// Flat key/value view of a request's query-string parameters, decoupled
/// from any HTTP framework type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSearchParams {
    params: BTreeMap<String, String>,
}

impl RawSearchParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawSearchParams {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            params: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

// =============================================================================
// SEARCH REQUEST
// =============================================================================

/// A normalized search request. Immutable once built.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SearchRequest {
    /// Display query text, with embedded directives stripped.
    pub query_text: String,
    /// Target object types; never empty after normalization.
    pub object_types: Vec<ObjectType>,
    /// Filter field → values (`tag`, `species`).
    pub filters: BTreeMap<String, Vec<String>>,
    /// First hit to return, for pagination.
    pub start: usize,
    /// Number of hits to return.
    pub size: usize,
    /// Sort clauses, empty for index relevance order.
    pub sort: Vec<SortKey>,
    /// Stored fields to return per hit; `["_source"]` for the whole document.
    pub fields: Vec<String>,
    /// Fields to highlight matches in.
    pub highlight_fields: Vec<String>,
    /// Facet fields; empty means the per-type default facet set.
    pub facet_fields: Vec<String>,
    /// Request score explanations from the index.
    pub explain: bool,
}

impl SearchRequest {
    /// Normalize raw request parameters into a `SearchRequest`.
    ///
    /// `in`/`tag`/`species` are taken from explicit parameters first; when
    /// absent, the query text is scanned for the embedded directive form and
    /// the matched directive is stripped from the display text.
    pub fn normalize(params: &RawSearchParams) -> Result<SearchRequest> {
        let mut q = params.get("q").unwrap_or("").trim().to_string();
        if q.len() > MAX_QUERY_LENGTH {
            return Err(Error::QueryTooLong {
                len: q.len(),
                max: MAX_QUERY_LENGTH,
            });
        }

        // Object types: explicit param wins, then embedded directive.
        let mut types_raw = params.get("in").map(str::to_string);
        if types_raw.is_none() && !q.is_empty() {
            if let Some(cap) = IN_RE.captures(&q) {
                types_raw = Some(cap[1].to_string());
                q = IN_RE.replace(&q, "").trim().to_string();
            }
        }
        let object_types = parse_types(types_raw.as_deref());

        // tag/species filters, same two-step lookup.
        let mut filters = BTreeMap::new();
        for field in ["tag", "species"] {
            let mut value = params.get(field).map(str::to_string);
            if value.is_none() && !q.is_empty() {
                let re = directive_re(field);
                if let Some(cap) = re.captures(&q) {
                    value = Some(cap[1].to_string());
                    q = re.replace(&q, "").trim().to_string();
                }
            }
            if let Some(v) = value {
                let values = split_csv(&v);
                if !values.is_empty() {
                    filters.insert(field.to_string(), values);
                }
            }
        }

        // Pagination accepts both (from,size) and (start,limit) namings.
        let start = int_param(params, "from")?
            .or(int_param(params, "start")?)
            .unwrap_or(0);
        let size = int_param(params, "size")?
            .or(int_param(params, "limit")?)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE);

        let primary = *object_types.first().expect("object_types never empty");
        let sort = parse_sort(params.get("sort"), primary);

        let fields = match params.get("fields") {
            Some(f) => split_csv(f),
            None => vec!["_source".to_string()],
        };
        let facet_fields = params.get("f").map(|v| split_csv(v)).unwrap_or_default();
        let highlight_fields = params.get("h").map(|v| split_csv(v)).unwrap_or_default();
        let explain = params.get("explain") == Some("true");

        Ok(SearchRequest {
            query_text: q,
            object_types,
            filters,
            start,
            size,
            sort,
            fields,
            highlight_fields,
            facet_fields,
            explain,
        })
    }

    /// The type driving per-type defaults (sort field names, facet set,
    /// titles). This is the first requested type.
    pub fn primary_type(&self) -> ObjectType {
        self.object_types[0]
    }

    /// True when the request carries free query text (a "search"
    /// interaction) rather than browsing by filters alone (a "list"
    /// interaction).
    pub fn is_search(&self) -> bool {
        !self.query_text.is_empty()
    }

    /// Render this request back into raw parameters.
    ///
    /// Directives already extracted are emitted as explicit parameters, so
    /// re-normalizing the output yields an equivalent request without
    /// re-extracting or duplicating anything.
    pub fn to_params(&self) -> RawSearchParams {
        let mut params = RawSearchParams::new();
        if !self.query_text.is_empty() {
            params.insert("q", self.query_text.clone());
        }
        params.insert(
            "in",
            self.object_types
                .iter()
                .map(|t| t.as_str())
                .collect::<Vec<_>>()
                .join(","),
        );
        for (field, values) in &self.filters {
            params.insert(field.clone(), values.join(","));
        }
        if self.start != 0 {
            params.insert("start", self.start.to_string());
        }
        if self.size != DEFAULT_PAGE_SIZE {
            params.insert("size", self.size.to_string());
        }
        if let Some(sort) = render_sort(&self.sort, self.primary_type()) {
            params.insert("sort", sort);
        }
        if self.fields != ["_source"] {
            params.insert("fields", self.fields.join(","));
        }
        if !self.facet_fields.is_empty() {
            params.insert("f", self.facet_fields.join(","));
        }
        if !self.highlight_fields.is_empty() {
            params.insert("h", self.highlight_fields.join(","));
        }
        if self.explain {
            params.insert("explain", "true");
        }
        params
    }
}

fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a comma list of type names. Unrecognized names are ignored; when
/// nothing valid remains the request defaults to the gene search path.
fn parse_types(raw: Option<&str>) -> Vec<ObjectType> {
    let mut types: Vec<ObjectType> = Vec::new();
    for t in raw.unwrap_or_default().split(',') {
        if let Ok(parsed) = t.trim().parse::<ObjectType>() {
            // a set in first-seen order, duplicates can be non-adjacent
            if !types.contains(&parsed) {
                types.push(parsed);
            }
        }
    }
    if types.is_empty() {
        types.push(ObjectType::Gene);
    }
    types
}

fn int_param(params: &RawSearchParams, key: &str) -> Result<Option<usize>> {
    match params.get(key) {
        None | Some("") => Ok(None),
        Some(v) => v
            .parse::<usize>()
            .map(Some)
            .map_err(|_| Error::InvalidInput(format!("parameter {key:?} is not a valid integer: {v:?}"))),
    }
}

/// Default sort for the `popular` keyword (and for an absent sort
/// parameter): descending popularity where the type has a score field.
fn popularity_sort(primary: ObjectType) -> Vec<SortKey> {
    match primary {
        ObjectType::Plugin => vec![SortKey::desc("popularity")],
        ObjectType::Dataset => vec![SortKey::desc_missing_last("popularity.all_time")],
        _ => Vec::new(),
    }
}

fn parse_sort(sort_param: Option<&str>, primary: ObjectType) -> Vec<SortKey> {
    match sort_param.map(str::trim) {
        None | Some("") | Some("popular") => popularity_sort(primary),
        Some("newest") => vec![SortKey::desc("created")],
        Some(other) => other
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| match s.strip_prefix('-') {
                Some(field) => SortKey::desc(field),
                None => SortKey::asc(s),
            })
            .collect(),
    }
}

/// Inverse of [`parse_sort`]: None when the sort equals the per-type
/// default (so an omitted parameter round-trips to the same request).
fn render_sort(sort: &[SortKey], primary: ObjectType) -> Option<String> {
    if sort == popularity_sort(primary).as_slice() {
        return None;
    }
    if sort == [SortKey::desc("created")] {
        return Some("newest".to_string());
    }
    Some(
        sort.iter()
            .map(|k| match k.order {
                crate::models::SortOrder::Desc => format!("-{}", k.field),
                crate::models::SortOrder::Asc => k.field.clone(),
            })
            .collect::<Vec<_>>()
            .join(","),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SortOrder;

    fn params(pairs: &[(&str, &str)]) -> RawSearchParams {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_defaults_to_gene_search() {
        let req = SearchRequest::normalize(&params(&[("q", "cdk2")])).unwrap();
        assert_eq!(req.object_types, vec![ObjectType::Gene]);
        assert_eq!(req.query_text, "cdk2");
        assert_eq!(req.start, 0);
        assert_eq!(req.size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_explicit_in_param() {
        let req =
            SearchRequest::normalize(&params(&[("q", "cancer"), ("in", "plugin,layout")])).unwrap();
        assert_eq!(
            req.object_types,
            vec![ObjectType::Plugin, ObjectType::Layout]
        );
    }

    #[test]
    fn test_embedded_in_directive_stripped() {
        let req = SearchRequest::normalize(&params(&[("q", "in:plugin cancer")])).unwrap();
        assert_eq!(req.object_types, vec![ObjectType::Plugin]);
        assert_eq!(req.query_text, "cancer");
    }

    #[test]
    fn test_explicit_param_wins_over_directive() {
        // An explicit `in` parameter suppresses directive extraction, so the
        // token stays in the display text.
        let req =
            SearchRequest::normalize(&params(&[("q", "in:layout cancer"), ("in", "plugin")]))
                .unwrap();
        assert_eq!(req.object_types, vec![ObjectType::Plugin]);
        assert_eq!(req.query_text, "in:layout cancer");
    }

    #[test]
    fn test_embedded_tag_and_species_directives() {
        let req = SearchRequest::normalize(&params(&[(
            "q",
            "in:plugin tag:expression species:human kinase",
        )]))
        .unwrap();
        assert_eq!(req.object_types, vec![ObjectType::Plugin]);
        assert_eq!(req.filters["tag"], vec!["expression"]);
        assert_eq!(req.filters["species"], vec!["human"]);
        assert_eq!(req.query_text, "kinase");
    }

    #[test]
    fn test_multi_value_filter() {
        let req =
            SearchRequest::normalize(&params(&[("in", "plugin"), ("species", "human,mouse")]))
                .unwrap();
        assert_eq!(req.filters["species"], vec!["human", "mouse"]);
    }

    #[test]
    fn test_unknown_types_ignored() {
        let req = SearchRequest::normalize(&params(&[("in", "widget,plugin")])).unwrap();
        assert_eq!(req.object_types, vec![ObjectType::Plugin]);
        let req = SearchRequest::normalize(&params(&[("in", "widget")])).unwrap();
        assert_eq!(req.object_types, vec![ObjectType::Gene]);
    }

    #[test]
    fn test_duplicate_types_collapse_even_when_separated() {
        let req =
            SearchRequest::normalize(&params(&[("in", "plugin,layout,plugin")])).unwrap();
        assert_eq!(req.object_types, vec![ObjectType::Plugin, ObjectType::Layout]);
    }

    #[test]
    fn test_pagination_alternate_names() {
        let req = SearchRequest::normalize(&params(&[
            ("in", "plugin"),
            ("from", "20"),
            ("size", "50"),
        ]))
        .unwrap();
        assert_eq!((req.start, req.size), (20, 50));

        let req = SearchRequest::normalize(&params(&[
            ("in", "plugin"),
            ("start", "5"),
            ("limit", "15"),
        ]))
        .unwrap();
        assert_eq!((req.start, req.size), (5, 15));
    }

    #[test]
    fn test_bad_pagination_is_input_error() {
        let err = SearchRequest::normalize(&params(&[("start", "ten")])).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        let err = SearchRequest::normalize(&params(&[("size", "-3")])).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_size_capped() {
        let req = SearchRequest::normalize(&params(&[("size", "100000")])).unwrap();
        assert_eq!(req.size, MAX_PAGE_SIZE);
    }

    #[test]
    fn test_query_too_long_fails_fast() {
        let long = "x".repeat(MAX_QUERY_LENGTH + 1);
        let err = SearchRequest::normalize(&params(&[("q", &long)])).unwrap_err();
        assert!(matches!(err, Error::QueryTooLong { .. }));

        let ok = "x".repeat(MAX_QUERY_LENGTH);
        assert!(SearchRequest::normalize(&params(&[("q", &ok)])).is_ok());
    }

    #[test]
    fn test_sort_popular_plugin() {
        let req =
            SearchRequest::normalize(&params(&[("in", "plugin"), ("sort", "popular")])).unwrap();
        assert_eq!(req.sort, vec![SortKey::desc("popularity")]);
        // absent sort parameter means the same default
        let req = SearchRequest::normalize(&params(&[("in", "plugin")])).unwrap();
        assert_eq!(req.sort, vec![SortKey::desc("popularity")]);
    }

    #[test]
    fn test_sort_popular_dataset_missing_last() {
        let req =
            SearchRequest::normalize(&params(&[("in", "dataset"), ("sort", "popular")])).unwrap();
        assert_eq!(req.sort, vec![SortKey::desc_missing_last("popularity.all_time")]);
    }

    #[test]
    fn test_sort_newest() {
        let req =
            SearchRequest::normalize(&params(&[("in", "layout"), ("sort", "newest")])).unwrap();
        assert_eq!(req.sort, vec![SortKey::desc("created")]);
    }

    #[test]
    fn test_sort_field_list() {
        let req = SearchRequest::normalize(&params(&[("in", "plugin"), ("sort", "species,-name")]))
            .unwrap();
        assert_eq!(req.sort.len(), 2);
        assert_eq!(req.sort[0], SortKey::asc("species"));
        assert_eq!(req.sort[1].field, "name");
        assert_eq!(req.sort[1].order, SortOrder::Desc);
    }

    #[test]
    fn test_facet_and_highlight_fields() {
        let req = SearchRequest::normalize(&params(&[
            ("in", "plugin"),
            ("f", "tag, species"),
            ("h", "description"),
        ]))
        .unwrap();
        assert_eq!(req.facet_fields, vec!["tag", "species"]);
        assert_eq!(req.highlight_fields, vec!["description"]);
    }

    #[test]
    fn test_normalization_idempotence() {
        // Property: normalize(normalize(raw).to_params()) == normalize(raw).
        let raws = [
            params(&[("q", "in:plugin tag:cancer species:human kinase")]),
            params(&[("q", "cdk2")]),
            params(&[("in", "layout"), ("sort", "newest"), ("from", "30")]),
            params(&[
                ("in", "plugin,genelist"),
                ("tag", "expression"),
                ("size", "25"),
                ("sort", "-name"),
                ("h", "description"),
                ("explain", "true"),
            ]),
            params(&[("in", "dataset"), ("sort", "popular")]),
        ];
        for raw in raws {
            let once = SearchRequest::normalize(&raw).unwrap();
            let twice = SearchRequest::normalize(&once.to_params()).unwrap();
            assert_eq!(once, twice, "round trip diverged for {raw:?}");
        }
    }
}
