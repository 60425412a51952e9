//! Request handlers for the GeneHub query API.

pub mod gene;
pub mod search;

use std::sync::Arc;

use axum::http::HeaderMap;
use serde_json::{json, Value};

use genehub_core::AuthenticatedUser;
use genehub_geneinfo::GeneResolver;
use genehub_search::{DatasetClient, IndexEngine};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<IndexEngine>,
    pub resolver: Arc<GeneResolver>,
    pub dataset: Option<Arc<DatasetClient>>,
}

/// Identity headers set by the upstream authentication proxy. Absent
/// headers mean an anonymous request; this service performs no
/// authentication of its own.
pub fn current_user(headers: &HeaderMap) -> Option<AuthenticatedUser> {
    let username = headers.get("x-genehub-user")?.to_str().ok()?.trim();
    if username.is_empty() {
        return None;
    }
    let id = headers
        .get("x-genehub-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(0);
    let user = AuthenticatedUser::new(id, username)
        .with_roles(header_csv(headers, "x-genehub-roles"))
        .with_friends(header_csv(headers, "x-genehub-friends"));
    Some(user)
}

fn header_csv(headers: &HeaderMap, name: &str) -> Vec<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Uniform error body.
pub fn error_body(msg: impl std::fmt::Display) -> Value {
    json!({ "success": false, "error": msg.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_current_user_from_headers() {
        let mut headers = HeaderMap::new();
        assert!(current_user(&headers).is_none());

        headers.insert("x-genehub-user", HeaderValue::from_static("alice"));
        headers.insert("x-genehub-user-id", HeaderValue::from_static("42"));
        headers.insert(
            "x-genehub-roles",
            HeaderValue::from_static("GeneHub Users, Curators"),
        );
        let user = current_user(&headers).unwrap();
        assert_eq!(user.id, 42);
        assert_eq!(user.username, "alice");
        assert_eq!(user.roles, ["GeneHub Users", "Curators"]);
        assert!(user.friends.is_empty());
    }
}
