//! Gene query and lookup handlers.

use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::Form;
use serde_json::json;

use super::{error_body, AppState};

/// `GET /gene/query?query=...` — classify and resolve a gene query.
pub async fn query_get(
    State(state): State<AppState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> impl IntoResponse {
    run_gene_query(&state, params).await
}

/// `POST /gene/query` — same contract with a form body, for long batch
/// identifier lists that exceed URL limits.
pub async fn query_post(
    State(state): State<AppState>,
    Form(params): Form<BTreeMap<String, String>>,
) -> impl IntoResponse {
    run_gene_query(&state, params).await
}

async fn run_gene_query(
    state: &AppState,
    params: BTreeMap<String, String>,
) -> axum::response::Response {
    let query = params.get("query").map(String::as_str).unwrap_or("");
    let userfilter = params.get("userfilter").map(String::as_str);
    let outcome = state.resolver.resolve(query, userfilter).await;
    let code = if outcome.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    (code, Json(outcome)).into_response()
}

/// `GET /gene/{id}` — single gene document, homology-trimmed.
pub async fn get_gene(
    State(state): State<AppState>,
    Path(geneid): Path<String>,
) -> impl IntoResponse {
    match state.resolver.client().get_gene(&geneid, None).await {
        Ok(Some(gene)) => (StatusCode::OK, Json(gene)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(error_body(format!("gene {geneid:?} not found"))),
        )
            .into_response(),
        Err(err) => (StatusCode::BAD_GATEWAY, Json(error_body(err))).into_response(),
    }
}

/// `GET /gene/metadata` — gene-information service metadata passthrough.
pub async fn metadata(State(state): State<AppState>) -> impl IntoResponse {
    match state.resolver.client().metadata().await {
        Ok(meta) => (StatusCode::OK, Json(json!({ "success": true, "metadata": meta }))),
        Err(err) => (StatusCode::BAD_GATEWAY, Json(error_body(err))),
    }
}
