//! Helpers shared by handler tests.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::{auth::extractors::AuthUser, state::AppState};

pub async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(t) = token {
        req = req.header("authorization", format!("Bearer {t}"));
    }
    match body {
        Some(b) => req
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    }
}

/// Signs a fresh account up against the state's auth backend.
pub async fn sign_up(state: &AppState, username: &str) -> AuthUser {
    let signed = state
        .auth
        .sign_up(
            &format!("{username}@example.com"),
            "secret1",
            json!({ "full_name": username, "username": username }),
        )
        .await
        .unwrap();
    let session = signed.session.unwrap();
    AuthUser {
        identity: session.user,
        access_token: session.access_token,
    }
}
