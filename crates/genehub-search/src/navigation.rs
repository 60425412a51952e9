//! Read-side projection of a search result into the navigation panel:
//! titles, facet filter links, and the paging footer.
//!
//! This is a pure projection. It never mutates the request and never calls
//! a backend; every link encodes the next URL that would apply one more
//! facet on top of the current filters.

use serde::Serialize;

use genehub_core::{ObjectType, SearchRequest, SearchResult, Species, DATASET_SPECIES, SPECIES};

/// Whether the page is a free-text search or a browse-by-filter listing.
/// The two render different titles and build facet links differently:
/// search links rebuild the query string, list links edit the URL path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMode {
    Search,
    List,
}

/// One clickable facet entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FacetLink {
    pub label: String,
    pub url: String,
    pub count: Option<u64>,
    pub active: bool,
    /// Hover text, where the label alone is terse (species genus names).
    pub title: Option<String>,
    pub css_class: Option<&'static str>,
}

impl FacetLink {
    fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
            count: None,
            active: false,
            title: None,
            css_class: None,
        }
    }
}

/// One facet group in the navigation panel ("TAGS", "SPECIES").
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FacetGroup {
    pub name: &'static str,
    pub links: Vec<FacetLink>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NavigationView {
    pub title: String,
    pub query_string: String,
    pub paging_footer: Option<String>,
    pub facets: Vec<FacetGroup>,
}

impl NavigationView {
    /// Project a search or list result. `path` is the request path, used
    /// for list-mode facet links.
    pub fn build(
        mode: PageMode,
        path: &str,
        request: &SearchRequest,
        result: &SearchResult,
    ) -> NavigationView {
        let builder = Builder {
            mode,
            path,
            request,
            // a degraded result renders as if there were no result at all
            result: (!result.has_error()).then_some(result),
            doc_type: single_type(&request.object_types),
        };
        NavigationView {
            title: builder.title(),
            query_string: builder.query_string(),
            paging_footer: builder.paging_footer(),
            facets: builder.facet_groups(),
        }
    }

    /// Dataset browse pages get a fixed navigation: the service's tag
    /// vocabulary and its supported species subset.
    pub fn dataset(title: impl Into<String>, result: Option<&SearchResult>, tags: &[String]) -> NavigationView {
        let mut tag_links: Vec<FacetLink> = tags
            .iter()
            .map(|t| {
                FacetLink::new(
                    t.clone(),
                    format!("/dataset/tag/{}/", urlencoding::encode(t)),
                )
            })
            .collect();
        let mut more = FacetLink::new("more \u{203a}", "/dataset/tag/");
        more.title = Some("Show all Tags".to_string());
        more.css_class = Some("more-link");
        tag_links.push(more);

        let species_links = DATASET_SPECIES
            .iter()
            .filter_map(|name| Species::by_name(name))
            .map(|s| {
                let mut link =
                    FacetLink::new(capitalize(s.name), format!("/dataset/species/{}/", s.name));
                link.title = Some(s.genus.to_string());
                link
            })
            .collect();

        NavigationView {
            title: title.into(),
            query_string: "in:dataset".to_string(),
            paging_footer: result.map(|r| paging_footer(r, Some(ObjectType::Dataset))),
            facets: vec![
                FacetGroup {
                    name: "TAGS",
                    links: tag_links,
                },
                FacetGroup {
                    name: "SPECIES",
                    links: species_links,
                },
            ],
        }
    }
}

struct Builder<'a> {
    mode: PageMode,
    path: &'a str,
    request: &'a SearchRequest,
    result: Option<&'a SearchResult>,
    doc_type: Option<ObjectType>,
}

impl Builder<'_> {
    fn title(&self) -> String {
        if self.mode == PageMode::Search {
            return match self.doc_type {
                Some(t) => format!("{} Search Results", t.display_name()),
                None => "Search Results".to_string(),
            };
        }
        let Some(t) = self.doc_type else {
            return "GeneHub Library".to_string();
        };
        if self.result.is_some() && !self.request.filters.is_empty() {
            let mut out = format!("{}s", t.display_name());
            if let Some(tags) = self.request.filters.get("tag") {
                if let Some(tag) = tags.first() {
                    out = format!("{} {}", capitalize(tag), out);
                }
            }
            if let Some(species) = self.request.filters.get("species") {
                if !species.is_empty() {
                    out.push_str(" for ");
                    out.push_str(&capitalize(&species.join(", ")));
                }
            }
            out
        } else {
            format!("GeneHub {} Library", t.display_name())
        }
    }

    /// Reconstruct the query mini-language for the search box:
    /// `in:<types> tag:<v> species:<v> <text>`.
    fn query_string(&self) -> String {
        let mut parts = Vec::new();
        if !self.request.object_types.is_empty() {
            parts.push(format!(
                "in:{}",
                self.request
                    .object_types
                    .iter()
                    .map(|t| t.as_str())
                    .collect::<Vec<_>>()
                    .join(",")
            ));
        }
        for (field, values) in &self.request.filters {
            parts.push(format!("{}:{}", field, values.join(",")));
        }
        if !self.request.query_text.is_empty() {
            parts.push(self.request.query_text.clone());
        }
        parts.join(" ")
    }

    fn paging_footer(&self) -> Option<String> {
        self.result.map(|r| paging_footer(r, self.doc_type))
    }

    fn facet_groups(&self) -> Vec<FacetGroup> {
        let mut groups = Vec::new();
        if let Some(tags) = self.tag_group() {
            groups.push(tags);
        }
        groups.push(self.species_group());
        groups
    }

    /// Tag links come from the result's facet buckets, bracketed by an
    /// "All <type>s" reset link and a "more" link to the full tag list.
    fn tag_group(&self) -> Option<FacetGroup> {
        let result = self.result?;
        let buckets = result.facet("tag");
        if buckets.is_empty() {
            return None;
        }
        let active_tag = self
            .request
            .filters
            .get("tag")
            .and_then(|v| v.first())
            .map(String::as_str);

        let mut any_active = false;
        let mut links: Vec<FacetLink> = buckets
            .iter()
            .map(|b| {
                let mut link =
                    FacetLink::new(b.term.clone(), self.add_facet_to_path("tag", &b.term));
                link.count = Some(b.count);
                if !any_active && active_tag == Some(b.term.as_str()) {
                    link.active = true;
                    any_active = true;
                }
                link
            })
            .collect();

        if let Some(t) = self.doc_type {
            let mut all = FacetLink::new(
                format!("All {}s", t.display_name()),
                format!("/{}/all/", t.as_str()),
            );
            all.active = !any_active;
            links.insert(0, all);

            let mut more = FacetLink::new("more \u{203a}", format!("/{}/tag/", t.as_str()));
            more.title = Some("Show all Tags".to_string());
            more.css_class = Some("more-link");
            links.push(more);
        }

        Some(FacetGroup {
            name: "TAGS",
            links,
        })
    }

    /// The species group always lists the full registry (datasets only the
    /// subset the service supports), with counts merged in from the
    /// result's species facet.
    fn species_group(&self) -> FacetGroup {
        let dataset_only = self.doc_type == Some(ObjectType::Dataset);
        let active_species = self
            .request
            .filters
            .get("species")
            .and_then(|v| v.first())
            .map(String::as_str);

        let links = SPECIES
            .iter()
            .filter(|s| !dataset_only || DATASET_SPECIES.contains(&s.name))
            .map(|s| {
                let mut link = FacetLink::new(
                    capitalize(s.name),
                    self.add_facet_to_path("species", s.name),
                );
                link.title = Some(s.genus.to_string());
                link.count = self
                    .result
                    .and_then(|r| r.facet("species").iter().find(|b| b.term == s.name))
                    .map(|b| b.count);
                link.active = active_species == Some(s.name);
                link
            })
            .collect();

        FacetGroup {
            name: "SPECIES",
            links,
        }
    }

    fn add_facet_to_path(&self, facet: &str, term: &str) -> String {
        match self.mode {
            PageMode::Search => self.add_facet_to_search_url(facet, term),
            PageMode::List => add_facet_to_list_url(self.path, facet, term),
        }
    }

    /// Search-mode links rebuild `/search/?...` from the current request,
    /// replacing any existing value of `facet` and keeping everything else.
    fn add_facet_to_search_url(&self, facet: &str, term: &str) -> String {
        let mut params = Vec::new();
        if !self.request.query_text.is_empty() {
            params.push(format!("q={}", urlencoding::encode(&self.request.query_text)));
        }
        if !self.request.object_types.is_empty() {
            params.push(format!(
                "in={}",
                self.request
                    .object_types
                    .iter()
                    .map(|t| t.as_str())
                    .collect::<Vec<_>>()
                    .join(",")
            ));
        }
        for (field, values) in &self.request.filters {
            if field == facet {
                continue;
            }
            params.push(format!("{}={}", field, urlencoding::encode(&values.join(","))));
        }
        params.push(format!("{}={}", facet, urlencoding::encode(term)));
        format!("/search/?{}", params.join("&"))
    }
}

/// List-mode links edit the current URL path in place:
/// the catch-all `all` segment is dropped, a bare trailing `tag` segment is
/// dropped, an existing value for `facet` is replaced, and otherwise the
/// `facet/term` pair is inserted before the trailing slash.
fn add_facet_to_list_url(path: &str, facet: &str, term: &str) -> String {
    let mut segments: Vec<String> = path.split('/').map(str::to_string).collect();

    if let Some(i) = segments.iter().position(|s| s == "all") {
        segments.remove(i);
    }
    if segments.len() >= 2 && segments[segments.len() - 2] == "tag" {
        let i = segments.len() - 2;
        segments.remove(i);
    }

    if let Some(i) = segments.iter().position(|s| s == facet) {
        if i + 1 < segments.len() {
            segments[i + 1] = term.to_string();
        }
    } else if let Some(end) = segments.pop() {
        segments.push(facet.to_string());
        segments.push(term.to_string());
        segments.push(end);
    }

    segments.join("/")
}

/// "Displaying plugins 11 - 20 of 57 in total." when the result is a window
/// into a larger set, otherwise a plain count.
fn paging_footer(result: &SearchResult, doc_type: Option<ObjectType>) -> String {
    let noun = doc_type
        .map(|t| t.as_str().to_string())
        .unwrap_or_else(|| "result".to_string());
    let plural = if result.hit_count() != 1 {
        format!("{noun}s")
    } else {
        noun
    };

    if result.total > result.hit_count() as u64 {
        let first = result.window.start + 1;
        let last = result.window.start + result.hit_count();
        format!(
            "Displaying {plural} {first} - {last} of {} in total.",
            result.total
        )
    } else {
        format!("Displaying {} {plural}", result.total)
    }
}

fn single_type(types: &[ObjectType]) -> Option<ObjectType> {
    match types {
        [one] => Some(*one),
        _ => None,
    }
}

fn capitalize(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        Some(f) => f.to_uppercase().collect::<String>() + c.as_str(),
        None => String::new(),
    }
}

// =============================================================================
// TESTS
// =============================================================================
