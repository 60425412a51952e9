//! Structured logging schema and field name constants for genehub.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized field names across
//! every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events, query completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data (hits, facet buckets) |

// =============================================================================
// IDENTITY FIELDS
// =============================================================================

/// Correlation ID propagated across a request's sub-calls.
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "search", "geneinfo", "dataset"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "index_engine", "pager", "resolver", "navigation"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "es_query", "gene_query", "dataset_list", "fetch_page"
pub const OPERATION: &str = "action";

// =============================================================================
// QUERY FIELDS
// =============================================================================

/// Search query text (truncated when logged).
pub const QUERY: &str = "query";

/// Length of the raw query string.
pub const QUERY_LEN: &str = "qlen";

/// Comma-joined object types the query runs against.
pub const OBJECT_TYPES: &str = "in";

/// Gene query classification ("id", "keyword", "interval").
pub const QTYPE: &str = "qtype";

/// Number of terms in a batch identifier query.
pub const NUM_TERMS: &str = "num_terms";

// =============================================================================
// MEASUREMENT FIELDS
// =============================================================================

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of hits returned in the current page.
pub const NUM_HITS: &str = "num_hits";

/// Total number of matching documents.
pub const TOTAL: &str = "total";

/// Page offset of the issued query.
pub const PAGE_START: &str = "start";

/// Page size of the issued query.
pub const PAGE_SIZE: &str = "size";

// =============================================================================
// OUTCOME FIELDS
// =============================================================================

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Set to 1 on query failure (legacy log-scraper compatibility).
pub const ERROR_FLAG: &str = "error";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "errormsg";
