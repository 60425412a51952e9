//! # genehub-search
//!
//! The permission-aware, faceted query engine for GeneHub's document index,
//! plus the proxy to the remote dataset service and the navigation
//! presenter consumed by the rendering layer.
//!
//! The engine is a read-only boundary: every backend failure is captured
//! into [`genehub_core::SearchResult::error`], never propagated as a fault.

pub mod backend;
pub mod dataset;
pub mod engine;
pub mod memory;
pub mod navigation;
pub mod pager;
pub mod permission;
pub mod query;

pub use backend::{HttpIndexBackend, IndexBackend, IndexResponse, RawHit};
pub use dataset::{DatasetClient, DatasetOrder};
pub use engine::IndexEngine;
pub use memory::MemoryIndex;
pub use navigation::{FacetGroup, FacetLink, NavigationView, PageMode};
pub use pager::Pager;
pub use permission::{build_predicates, predicates_to_filter, AccessPredicate};
pub use query::{IndexQuery, QueryNode};
