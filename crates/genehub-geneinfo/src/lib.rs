//! # genehub-geneinfo
//!
//! Gene identifier resolution against the remote gene-information service.
//!
//! The resolver classifies a raw user query (genomic interval, batch
//! identifier list, wildcard, or free-text keyword), dispatches it through
//! [`GeneInfoClient`], and normalizes every outcome into a
//! [`GeneQueryOutcome`] the HTTP layer can return as-is.

pub mod client;
pub mod resolver;
pub mod tokenize;

pub use client::{GeneInfoClient, ID_SCOPES, MAX_BATCH_IDS};
pub use resolver::{GeneQueryData, GeneQueryOutcome, GeneResolver, QueryKind};
pub use tokenize::split_query_terms;
