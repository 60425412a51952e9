//! genehub-api - HTTP API server for the GeneHub query layer

mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::Method;
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use genehub_geneinfo::{GeneInfoClient, GeneResolver};
use genehub_search::{DatasetClient, HttpIndexBackend, IndexEngine};

use handlers::{gene, search, AppState};

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter (default: "genehub_api=debug,tower_http=debug")
    let log_format = env_or("LOG_FORMAT", "text");
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "genehub_api=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    // Optionally create a file appender with daily rotation
    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("genehub-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer().with_writer(non_blocking);
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            } else {
                layer = layer.with_ansi(false); // no ANSI in files
            }
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    // Backend clients, built once and shared across requests
    let index_url = env_or("GENEHUB_INDEX_URL", "http://localhost:9200");
    let index_name = env_or("GENEHUB_INDEX_NAME", "genehub");
    let geneinfo_url = env_or("GENEHUB_GENEINFO_URL", "http://localhost:8000");
    let dataset_url = std::env::var("GENEHUB_DATASET_URL").ok();
    let dataset_collection = env_or("GENEHUB_DATASET_COLLECTION", "portal");

    let backend = Arc::new(HttpIndexBackend::new(index_url.as_str(), index_name.as_str())?);
    let mut engine = IndexEngine::new(backend);
    let dataset = match &dataset_url {
        Some(url) => {
            let client = Arc::new(DatasetClient::new(url.clone(), dataset_collection)?);
            engine = engine.with_dataset(client.clone());
            Some(client)
        }
        None => None,
    };
    let resolver = Arc::new(GeneResolver::new(GeneInfoClient::new(geneinfo_url.as_str())?));

    info!(
        index_url = %index_url,
        index_name = %index_name,
        geneinfo_url = %geneinfo_url,
        dataset_url = dataset_url.as_deref().unwrap_or("(disabled)"),
        "Backends configured"
    );

    let state = AppState {
        engine: Arc::new(engine),
        resolver,
        dataset,
    };

    let app = Router::new()
        .route("/search", get(search::search))
        .route("/search/status", get(search::status))
        .route("/search/:type", get(search::search_in_type))
        .route("/:type/list", get(search::list_type))
        .route("/gene/query", get(gene::query_get).post(gene::query_post))
        .route("/gene/metadata", get(gene::metadata))
        .route("/gene/:id", get(gene::get_gene))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(
            // Read-only API: no credentials, any origin
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST]),
        )
        .with_state(state);

    let host = env_or("HOST", "127.0.0.1");
    let port = env_or("PORT", "3000");
    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
