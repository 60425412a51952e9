//! Shared data model for the query layer: object types, hits, results,
//! sort keys, and the authenticated-user value type.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Shortname of the role granting public visibility; every index query
/// includes it so anonymous users see public content.
pub const PUBLIC_ROLE_SHORTNAME: &str = "genehubusers";

/// Role name → index shortname pairs for the roles the portal recognizes.
const ROLE_SHORTNAMES: &[(&str, &str)] = &[
    ("GeneHub Users", "genehubusers"),
    ("Curators", "curators"),
    ("Partner Users", "partnerusers"),
];

/// Map a full role name to the shortname stored in the index's
/// `role_permission` field. Unknown roles fall back to a lowercased,
/// alphanumeric-only rendering so new roles stay filterable without a
/// registry change.
pub fn role_shortname(role: &str) -> String {
    for (name, short) in ROLE_SHORTNAMES {
        if *name == role {
            return (*short).to_string();
        }
    }
    role.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

// =============================================================================
// OBJECT TYPES
// =============================================================================

/// The kinds of objects the portal can search.
///
/// Each type maps to a distinct data source: genes come from the remote
/// gene-information service, datasets from the remote dataset service, and
/// the rest from the local document index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Gene,
    Plugin,
    Layout,
    Genelist,
    Dataset,
}

impl ObjectType {
    /// All types, in canonical order.
    pub const ALL: &'static [ObjectType] = &[
        ObjectType::Gene,
        ObjectType::Plugin,
        ObjectType::Layout,
        ObjectType::Genelist,
        ObjectType::Dataset,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Gene => "gene",
            ObjectType::Plugin => "plugin",
            ObjectType::Layout => "layout",
            ObjectType::Genelist => "genelist",
            ObjectType::Dataset => "dataset",
        }
    }

    /// Capitalized singular display name ("Plugin").
    pub fn display_name(&self) -> String {
        let s = self.as_str();
        let mut c = s.chars();
        match c.next() {
            Some(f) => f.to_uppercase().collect::<String>() + c.as_str(),
            None => String::new(),
        }
    }

    /// True for types stored in the local document index and subject to
    /// object-level permission filtering.
    pub fn is_indexed(&self) -> bool {
        matches!(
            self,
            ObjectType::Plugin | ObjectType::Layout | ObjectType::Genelist
        )
    }

    /// Index field holding the popularity score for this type, when one
    /// exists.
    pub fn popularity_field(&self) -> Option<&'static str> {
        match self {
            ObjectType::Plugin => Some("popularity"),
            ObjectType::Dataset => Some("popularity.all_time"),
            _ => None,
        }
    }

    /// Default facet fields for this type.
    pub fn default_facets(&self) -> &'static [&'static str] {
        match self {
            ObjectType::Plugin | ObjectType::Layout | ObjectType::Genelist => &["tag", "species"],
            _ => &[],
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gene" => Ok(ObjectType::Gene),
            "plugin" => Ok(ObjectType::Plugin),
            "layout" => Ok(ObjectType::Layout),
            "genelist" => Ok(ObjectType::Genelist),
            "dataset" => Ok(ObjectType::Dataset),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown object type: {other:?}"
            ))),
        }
    }
}

// =============================================================================
// SORTING
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// One sort clause. `missing_last` pushes documents lacking the field to
/// the end regardless of order (used for popularity scores that not all
/// documents carry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    pub order: SortOrder,
    #[serde(default)]
    pub missing_last: bool,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Asc,
            missing_last: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Desc,
            missing_last: false,
        }
    }

    pub fn desc_missing_last(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Desc,
            missing_last: true,
        }
    }
}

// =============================================================================
// RESULTS
// =============================================================================

/// One matched document: its id plus either the full stored document or a
/// restricted field projection, depending on the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub id: String,
    pub fields: serde_json::Value,
}

impl Hit {
    pub fn new(id: impl Into<String>, fields: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Fetch a string field from the document body.
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(|v| v.as_str())
    }
}

/// One facet term bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetBucket {
    pub term: String,
    pub count: u64,
}

/// The page window a result was fetched for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageWindow {
    pub start: usize,
    pub size: usize,
}

impl PageWindow {
    pub fn new(start: usize, size: usize) -> Self {
        Self { start, size }
    }

    /// `(start, stop)` indexes covered by this window.
    pub fn range(&self) -> (usize, usize) {
        (self.start, self.start + self.size)
    }
}

/// Uniform result shape for index queries and dataset-service queries.
///
/// Invariant: when `error` is set, `hits` is empty and `total` is 0.
/// Callers always receive a `SearchResult`; backend faults never propagate
/// past the query engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub hits: Vec<Hit>,
    pub total: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub facets: BTreeMap<String, Vec<FacetBucket>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub window: PageWindow,
}

impl SearchResult {
    pub fn new(hits: Vec<Hit>, total: u64, window: PageWindow) -> Self {
        Self {
            hits,
            total,
            facets: BTreeMap::new(),
            error: None,
            window,
        }
    }

    /// An error result with no hits.
    pub fn from_error(msg: impl Into<String>) -> Self {
        Self {
            hits: Vec::new(),
            total: 0,
            facets: BTreeMap::new(),
            error: Some(msg.into()),
            window: PageWindow::new(0, 0),
        }
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Number of hits in the current page (not the total).
    pub fn hit_count(&self) -> usize {
        self.hits.len()
    }

    /// Facet buckets for a field, empty when the field was not faceted.
    pub fn facet(&self, field: &str) -> &[FacetBucket] {
        self.facets.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The full result list padded with `None` placeholders outside the
    /// fetched window, so page-based UI components can compute positions
    /// against the total count.
    pub fn padded_items(&self) -> Vec<Option<&Hit>> {
        let mut items: Vec<Option<&Hit>> = vec![None; self.window.start.min(self.total as usize)];
        items.extend(self.hits.iter().map(Some));
        while items.len() < self.total as usize {
            items.push(None);
        }
        items
    }
}

// =============================================================================
// USERS
// =============================================================================

/// User identity assembled once at request-authentication time and passed
/// by reference into the query layer.
///
/// The query layer never reaches back into a live session or ORM object;
/// everything visibility depends on is captured here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub id: i64,
    pub username: String,
    /// Full role names ("GeneHub Users", "Curators", ...).
    #[serde(default)]
    pub roles: Vec<String>,
    /// Usernames of users who have friended this user.
    #[serde(default)]
    pub friends: Vec<String>,
}

impl AuthenticatedUser {
    pub fn new(id: i64, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            roles: Vec::new(),
            friends: Vec::new(),
        }
    }

    pub fn with_roles(mut self, roles: Vec<String>) -> Self {
        self.roles = roles;
        self
    }

    pub fn with_friends(mut self, friends: Vec<String>) -> Self {
        self.friends = friends;
        self
    }

    /// Index shortnames for this user's roles.
    pub fn role_shortnames(&self) -> Vec<String> {
        self.roles.iter().map(|r| role_shortname(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_type_round_trip() {
        for t in ObjectType::ALL {
            assert_eq!(&t.as_str().parse::<ObjectType>().unwrap(), t);
        }
        assert!("widget".parse::<ObjectType>().is_err());
    }

    #[test]
    fn test_object_type_is_indexed() {
        assert!(ObjectType::Plugin.is_indexed());
        assert!(ObjectType::Layout.is_indexed());
        assert!(ObjectType::Genelist.is_indexed());
        assert!(!ObjectType::Gene.is_indexed());
        assert!(!ObjectType::Dataset.is_indexed());
    }

    #[test]
    fn test_object_type_popularity_field() {
        assert_eq!(ObjectType::Plugin.popularity_field(), Some("popularity"));
        assert_eq!(
            ObjectType::Dataset.popularity_field(),
            Some("popularity.all_time")
        );
        assert_eq!(ObjectType::Layout.popularity_field(), None);
    }

    #[test]
    fn test_object_type_default_facets() {
        assert_eq!(ObjectType::Plugin.default_facets(), &["tag", "species"]);
        assert!(ObjectType::Gene.default_facets().is_empty());
    }

    #[test]
    fn test_role_shortname_known() {
        assert_eq!(role_shortname("GeneHub Users"), "genehubusers");
        assert_eq!(role_shortname("Curators"), "curators");
    }

    #[test]
    fn test_role_shortname_fallback() {
        assert_eq!(role_shortname("Beta Testers"), "betatesters");
    }

    #[test]
    fn test_search_result_error_invariant() {
        let res = SearchResult::from_error("index down");
        assert!(res.has_error());
        assert!(res.hits.is_empty());
        assert_eq!(res.total, 0);
    }

    #[test]
    fn test_search_result_padded_items() {
        let hits = vec![
            Hit::new("a", json!({})),
            Hit::new("b", json!({})),
        ];
        let res = SearchResult::new(hits, 5, PageWindow::new(2, 2));
        let items = res.padded_items();
        assert_eq!(items.len(), 5);
        assert!(items[0].is_none());
        assert!(items[1].is_none());
        assert_eq!(items[2].unwrap().id, "a");
        assert_eq!(items[3].unwrap().id, "b");
        assert!(items[4].is_none());
    }

    #[test]
    fn test_hit_field_str() {
        let hit = Hit::new("1017", json!({"symbol": "CDK2", "taxid": 9606}));
        assert_eq!(hit.field_str("symbol"), Some("CDK2"));
        assert_eq!(hit.field_str("taxid"), None); // not a string
        assert_eq!(hit.field_str("missing"), None);
    }

    #[test]
    fn test_user_role_shortnames() {
        let user = AuthenticatedUser::new(42, "ada")
            .with_roles(vec!["GeneHub Users".to_string(), "Curators".to_string()]);
        assert_eq!(user.role_shortnames(), vec!["genehubusers", "curators"]);
    }

    #[test]
    fn test_page_window_range() {
        assert_eq!(PageWindow::new(10, 10).range(), (10, 20));
    }
}
