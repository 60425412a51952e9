//! # genehub-core
//!
//! Core types, query normalization, and shared abstractions for the GeneHub
//! query layer.
//!
//! This crate provides the foundational data structures the other genehub
//! crates depend on: the workspace error type, the normalized
//! [`SearchRequest`], the uniform [`SearchResult`] shape, the supported
//! species registry, and the structured-logging field vocabulary.

pub mod error;
pub mod logging;
pub mod models;
pub mod request;
pub mod species;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::{
    role_shortname, AuthenticatedUser, FacetBucket, Hit, ObjectType, PageWindow, SearchResult,
    SortKey, SortOrder, PUBLIC_ROLE_SHORTNAME,
};
pub use request::{RawSearchParams, SearchRequest, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, MAX_QUERY_LENGTH};
pub use species::{safe_genome_pos, Species, DATASET_SPECIES, SPECIES};
