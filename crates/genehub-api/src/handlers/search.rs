//! Search, browse, and status handlers.

use std::collections::BTreeMap;

use axum::extract::{OriginalUri, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use genehub_core::{ObjectType, RawSearchParams, SearchRequest, SearchResult};
use genehub_search::{NavigationView, PageMode};

use super::{current_user, error_body, AppState};

/// Queries longer than this are truncated in log lines.
const LOG_QUERY_MAX: usize = 120;

#[derive(Serialize)]
struct SearchResponse {
    #[serde(flatten)]
    result: SearchResult,
    navigation: NavigationView,
}

/// `GET /search` with the full query mini-language.
pub async fn search(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(params): Query<BTreeMap<String, String>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    run_query(&state, uri.path(), params, &headers, PageMode::Search).await
}

/// `GET /search/{type}`: like `/search` but with the type fixed by the path.
pub async fn search_in_type(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Path(object_type): Path<String>,
    Query(mut params): Query<BTreeMap<String, String>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    params.insert("in".to_string(), object_type);
    run_query(&state, uri.path(), params, &headers, PageMode::Search).await
}

/// `GET /{type}/list`: browse-by-filter listing, no free text.
pub async fn list_type(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Path(object_type): Path<String>,
    Query(mut params): Query<BTreeMap<String, String>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    params.insert("in".to_string(), object_type);
    params.remove("q");
    run_query(&state, uri.path(), params, &headers, PageMode::List).await
}

async fn run_query(
    state: &AppState,
    path: &str,
    params: BTreeMap<String, String>,
    headers: &HeaderMap,
    mode: PageMode,
) -> axum::response::Response {
    let raw: RawSearchParams = params.into_iter().collect();
    let request = match SearchRequest::normalize(&raw) {
        Ok(request) => request,
        Err(err) => {
            return (StatusCode::BAD_REQUEST, Json(error_body(err))).into_response();
        }
    };

    let user = current_user(headers);
    let result = state.engine.query(&request, user.as_ref()).await;

    info!(
        subsystem = "api",
        action = "search",
        types = %request
            .object_types
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(","),
        query = %truncated(&request.query_text),
        qlen = request.query_text.len(),
        total = result.total,
        success = !result.has_error(),
        errormsg = result.error.as_deref().unwrap_or(""),
    );

    // dataset browse pages get the service's own tag vocabulary
    let navigation = if mode == PageMode::List && request.primary_type() == ObjectType::Dataset {
        let tags = match &state.dataset {
            Some(ds) => ds.tags().await.unwrap_or_default(),
            None => Vec::new(),
        };
        NavigationView::dataset(
            "GeneHub Dataset Library",
            (!result.has_error()).then_some(&result),
            &tags,
        )
    } else {
        NavigationView::build(mode, path, &request, &result)
    };
    Json(SearchResponse { result, navigation }).into_response()
}

/// `GET /search/status`: index cluster health passthrough.
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    match state.engine.status().await {
        Ok(health) => (StatusCode::OK, Json(json!({ "success": true, "index": health }))),
        Err(err) => (StatusCode::SERVICE_UNAVAILABLE, Json(error_body(err))),
    }
}

fn truncated(q: &str) -> &str {
    match q.char_indices().nth(LOG_QUERY_MAX) {
        Some((i, _)) => &q[..i],
        None => q,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::get;
    use axum::Router;
    use genehub_geneinfo::{GeneInfoClient, GeneResolver};
    use genehub_search::{IndexEngine, MemoryIndex};
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    #[test]
    fn test_truncated_respects_char_boundaries() {
        let long: String = "é".repeat(200);
        assert_eq!(truncated(&long).chars().count(), LOG_QUERY_MAX);
        assert_eq!(truncated("CDK2"), "CDK2");
    }

    fn test_app() -> Router {
        let mut index = MemoryIndex::new();
        index.add(json!({
            "id": 1,
            "object_type": "plugin",
            "name": "Cancer atlas",
            "tag": ["cancer"],
            "role_permission": ["genehubusers"],
            "username": "cwudemo",
        }));
        let state = AppState {
            engine: Arc::new(IndexEngine::new(Arc::new(index))),
            resolver: Arc::new(GeneResolver::new(
                GeneInfoClient::new("http://localhost:1").unwrap(),
            )),
            dataset: None,
        };
        Router::new()
            .route("/search", get(search))
            .with_state(state)
    }

    #[tokio::test]
    async fn test_search_route_end_to_end() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .uri("/search?q=cancer&in=plugin")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["total"], 1);
        assert_eq!(body["hits"][0]["fields"]["name"], "Cancer atlas");
        assert_eq!(body["navigation"]["title"], "Plugin Search Results");
    }

    #[tokio::test]
    async fn test_bad_pagination_is_a_400() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .uri("/search?q=x&from=notanumber")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
