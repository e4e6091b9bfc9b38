use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;
use uuid::Uuid;

use crate::{backend::Identity, error::ApiError, state::AppState};

/// Caller resolved from `Authorization: Bearer <token>` by the auth surface.
/// The token is kept so data calls run under the caller's row-level policies.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub identity: Identity,
    pub access_token: String,
}

impl AuthUser {
    pub fn id(&self) -> Uuid {
        self.identity.id
    }
}

fn bearer(parts: &Parts) -> Result<&str, ApiError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;

    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::unauthorized("Invalid Authorization header"))
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer(parts)?.to_string();

        let identity = state.auth.get_user(&token).await.map_err(|e| {
            warn!(error = %e, "session rejected");
            if e.is_retryable() {
                ApiError::from(e)
            } else {
                ApiError::unauthorized("Invalid or expired session")
            }
        })?;

        Ok(AuthUser {
            identity,
            access_token: token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};
    use serde_json::json;

    fn parts(auth: Option<&str>) -> Parts {
        let mut req = Request::builder().uri("/api/v1/me");
        if let Some(v) = auth {
            req = req.header(AUTHORIZATION, v);
        }
        req.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn resolves_a_live_session() {
        let state = AppState::fake();
        let signed = state
            .auth
            .sign_up("ana@example.com", "secret1", json!({}))
            .await
            .unwrap();
        let token = signed.session.unwrap().access_token;

        let mut p = parts(Some(&format!("Bearer {token}")));
        let user = AuthUser::from_request_parts(&mut p, &state).await.unwrap();
        assert_eq!(user.id(), signed.user.id);
        assert_eq!(user.access_token, token);
    }

    #[tokio::test]
    async fn rejects_missing_or_malformed_headers() {
        let state = AppState::fake();
        for header in [None, Some("Token abc"), Some("Bearer   ")] {
            let mut p = parts(header);
            let err = AuthUser::from_request_parts(&mut p, &state).await.unwrap_err();
            assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        }
    }

    #[tokio::test]
    async fn rejects_unknown_tokens() {
        let state = AppState::fake();
        let mut p = parts(Some("Bearer not-a-session"));
        let err = AuthUser::from_request_parts(&mut p, &state).await.unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.message, "Invalid or expired session");
    }
}
