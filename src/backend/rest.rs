use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{header, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{AuthBackend, Backend, BackendError, Identity, Query, Session, SignUp};
use crate::config::BackendConfig;

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Client for a hosted PostgREST + GoTrue project.
pub struct RestBackend {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl RestBackend {
    pub fn new(config: &BackendConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .context("build http client")?;
        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
        })
    }

    fn rest(&self, method: Method, table: &str, token: Option<&str>) -> RequestBuilder {
        let url = format!("{}/rest/v1/{}", self.base_url, table);
        self.http
            .request(method, url)
            .header("apikey", self.anon_key.as_str())
            .bearer_auth(token.unwrap_or(self.anon_key.as_str()))
    }

    fn auth(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/auth/v1/{}", self.base_url, path);
        self.http
            .request(method, url)
            .header("apikey", self.anon_key.as_str())
    }

    async fn password_grant(&self, body: Value, grant_type: &str) -> Result<Session, BackendError> {
        let resp = send(
            self.auth(Method::POST, "token")
                .query(&[("grant_type", grant_type)])
                .json(&body),
        )
        .await?;
        read_json(resp).await
    }
}

#[async_trait]
impl Backend for RestBackend {
    async fn select(&self, token: Option<&str>, query: &Query) -> Result<Vec<Value>, BackendError> {
        let resp = send(
            self.rest(Method::GET, query.table, token)
                .query(&[("select", "*")])
                .query(&query.to_params()),
        )
        .await?;
        read_json(resp).await
    }

    async fn insert(&self, token: Option<&str>, table: &str, row: Value) -> Result<Value, BackendError> {
        let resp = send(
            self.rest(Method::POST, table, token)
                .query(&[("select", "*")])
                .header("Prefer", "return=representation")
                .json(&row),
        )
        .await?;
        first_row(read_json(resp).await?)
    }

    async fn update(
        &self,
        token: Option<&str>,
        query: &Query,
        patch: Value,
    ) -> Result<Vec<Value>, BackendError> {
        let resp = send(
            self.rest(Method::PATCH, query.table, token)
                .query(&[("select", "*")])
                .query(&query.to_params())
                .header("Prefer", "return=representation")
                .json(&patch),
        )
        .await?;
        read_json(resp).await
    }

    async fn delete(&self, token: Option<&str>, query: &Query) -> Result<usize, BackendError> {
        let resp = send(
            self.rest(Method::DELETE, query.table, token)
                .query(&query.to_params())
                .header("Prefer", "return=representation"),
        )
        .await?;
        let rows: Vec<Value> = read_json(resp).await?;
        Ok(rows.len())
    }

    async fn upsert(
        &self,
        token: Option<&str>,
        table: &str,
        row: Value,
        on_conflict: &[&str],
    ) -> Result<Value, BackendError> {
        let resp = send(
            self.rest(Method::POST, table, token)
                .query(&[("select", "*".to_string()), ("on_conflict", on_conflict.join(","))])
                .header("Prefer", "resolution=merge-duplicates,return=representation")
                .json(&row),
        )
        .await?;
        first_row(read_json(resp).await?)
    }

    async fn count(&self, token: Option<&str>, query: &Query) -> Result<u64, BackendError> {
        let resp = send(
            self.rest(Method::HEAD, query.table, token)
                .query(&[("select", "id")])
                .query(&query.to_params())
                .header("Prefer", "count=exact"),
        )
        .await?;
        resp.headers()
            .get(header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range)
            .ok_or_else(|| BackendError::Decode("missing Content-Range count".into()))
    }
}

#[async_trait]
impl AuthBackend for RestBackend {
    async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> Result<SignUp, BackendError> {
        let resp = send(self.auth(Method::POST, "signup").json(&json!({
            "email": email,
            "password": password,
            "data": metadata,
        })))
        .await?;
        let body: Value = read_json(resp).await?;
        parse_sign_up(body)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        self.password_grant(json!({ "email": email, "password": password }), "password")
            .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, BackendError> {
        self.password_grant(json!({ "refresh_token": refresh_token }), "refresh_token")
            .await
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        send(self.auth(Method::POST, "logout").bearer_auth(access_token)).await?;
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<Identity, BackendError> {
        let resp = send(self.auth(Method::GET, "user").bearer_auth(access_token)).await?;
        read_json(resp).await
    }
}

/// Sends the request and turns non-2xx responses into [`BackendError::Api`].
async fn send(req: RequestBuilder) -> Result<Response, BackendError> {
    let resp = req
        .send()
        .await
        .map_err(|e| BackendError::Transport(e.to_string()))?;
    let status = resp.status();
    debug!(%status, url = %resp.url().path(), "backend response");
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let err = api_error(status.as_u16(), &body);
    warn!(%status, error = %err, "backend request rejected");
    Err(err)
}

async fn read_json<T: serde::de::DeserializeOwned>(resp: Response) -> Result<T, BackendError> {
    let body = resp
        .text()
        .await
        .map_err(|e| BackendError::Transport(e.to_string()))?;
    serde_json::from_str(&body).map_err(|e| BackendError::Decode(format!("{e}: {body}")))
}

fn first_row(rows: Vec<Value>) -> Result<Value, BackendError> {
    rows.into_iter()
        .next()
        .ok_or_else(|| BackendError::Decode("write returned no rows".into()))
}

#[derive(Debug, Default, Deserialize)]
struct ErrorPayload {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
    code: Option<Value>,
    error_code: Option<String>,
    details: Option<String>,
    hint: Option<String>,
}

/// PostgREST answers `{message, code, details, hint}`; the auth surface uses
/// `msg`/`error_description` instead.
fn api_error(status: u16, body: &str) -> BackendError {
    let p: ErrorPayload = serde_json::from_str(body).unwrap_or_default();
    let message = p
        .message
        .or(p.msg)
        .or(p.error_description)
        .or(p.error)
        .unwrap_or_else(|| {
            if body.is_empty() {
                format!("backend returned status {status}")
            } else {
                body.to_string()
            }
        });
    let code = p.error_code.or(match p.code {
        Some(Value::String(s)) => Some(s),
        _ => None,
    });
    BackendError::Api {
        status,
        code,
        message,
        details: p.details,
        hint: p.hint,
    }
}

fn parse_sign_up(body: Value) -> Result<SignUp, BackendError> {
    if body.get("access_token").is_some() {
        let session: Session =
            serde_json::from_value(body).map_err(|e| BackendError::Decode(e.to_string()))?;
        return Ok(SignUp {
            user: session.user.clone(),
            session: Some(session),
        });
    }
    let user = serde_json::from_value(body).map_err(|e| BackendError::Decode(e.to_string()))?;
    Ok(SignUp { user, session: None })
}

/// `0-24/3573` or `*/0` → total row count.
fn parse_content_range(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_range_total() {
        assert_eq!(parse_content_range("0-24/3573"), Some(3573));
        assert_eq!(parse_content_range("*/0"), Some(0));
        assert_eq!(parse_content_range("0-2/*"), None);
        assert_eq!(parse_content_range("garbage"), None);
    }

    #[test]
    fn postgrest_error_payload() {
        let err = api_error(
            404,
            r#"{"code":"42P01","details":null,"hint":null,"message":"relation \"public.bookmarks\" does not exist"}"#,
        );
        match &err {
            BackendError::Api { status, code, message, .. } => {
                assert_eq!(*status, 404);
                assert_eq!(code.as_deref(), Some("42P01"));
                assert!(message.contains("bookmarks"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(err.friendly().starts_with("The bookmarks table was not found"));
    }

    #[test]
    fn auth_error_payload() {
        let err = api_error(
            400,
            r#"{"code":400,"error_code":"invalid_credentials","msg":"Invalid login credentials"}"#,
        );
        assert_eq!(err.code(), Some("invalid_credentials"));
        assert_eq!(err.to_string(), "Invalid login credentials");
    }

    #[test]
    fn empty_error_body_reports_status() {
        assert_eq!(api_error(500, "").to_string(), "backend returned status 500");
    }

    #[test]
    fn sign_up_with_and_without_session() {
        let id = uuid::Uuid::new_v4();
        let pending = parse_sign_up(json!({ "id": id, "email": "cook@example.com" })).unwrap();
        assert_eq!(pending.user.id, id);
        assert!(pending.session.is_none());

        let confirmed = parse_sign_up(json!({
            "access_token": "a",
            "refresh_token": "r",
            "expires_in": 3600,
            "user": { "id": id, "email": "cook@example.com", "user_metadata": {} }
        }))
        .unwrap();
        assert_eq!(confirmed.session.unwrap().access_token, "a");
    }
}
