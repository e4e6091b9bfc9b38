use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

/// Failure talking to the hosted backend (data or auth surface).
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("backend request failed: {0}")]
    Transport(String),
    #[error("{message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
        details: Option<String>,
        hint: Option<String>,
    },
    #[error("unexpected backend response: {0}")]
    Decode(String),
}

impl BackendError {
    pub fn api(status: u16, code: Option<&str>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            code: code.map(str::to_string),
            message: message.into(),
            details: None,
            hint: None,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Transport(_) | Self::Decode(_) => StatusCode::BAD_GATEWAY,
            Self::Api {
                status,
                code,
                message,
                ..
            } => {
                let lower = message.to_lowercase();
                match (code.as_deref(), *status) {
                    (Some("PGRST116"), _) | (_, 404) | (_, 406) => StatusCode::NOT_FOUND,
                    (Some("23505"), _) | (_, 409) => StatusCode::CONFLICT,
                    (_, 401) => StatusCode::UNAUTHORIZED,
                    (Some("42501"), _) | (_, 403) => StatusCode::FORBIDDEN,
                    _ if lower.contains("permission denied")
                        || lower.contains("row-level security") =>
                    {
                        StatusCode::FORBIDDEN
                    }
                    (_, 400) | (_, 422) => StatusCode::BAD_REQUEST,
                    _ => StatusCode::BAD_GATEWAY,
                }
            }
        }
    }

    /// Whether repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Decode(_) => false,
        }
    }

    pub fn friendly(&self) -> String {
        if self.code() == Some("PGRST116") {
            return "Not found".into();
        }
        friendly_message(&self.to_string())
    }
}

/// Rewrites raw backend messages that users commonly hit into something readable.
pub fn friendly_message(raw: &str) -> String {
    lazy_static! {
        static ref MISSING_RELATION: Regex =
            Regex::new(r#"relation "?([\w.]+)"? does not exist"#).unwrap();
    }

    if let Some(caps) = MISSING_RELATION.captures(raw) {
        let table = caps[1].rsplit('.').next().unwrap_or(&caps[1]);
        return format!("The {table} table was not found. Please run the database setup script.");
    }

    let lower = raw.to_lowercase();
    if lower.contains("permission denied") || lower.contains("row-level security") {
        return "Permission denied. Please check your authentication.".into();
    }
    if lower.contains("duplicate key") {
        return "This entry already exists.".into();
    }
    raw.to_string()
}

/// Error returned by every handler; rendered as `{ "error", "retryable" }`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub retryable: bool,
    pub fields: Option<BTreeMap<&'static str, String>>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a BTreeMap<&'static str, String>>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            retryable: false,
            fields: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn invalid_fields(fields: BTreeMap<&'static str, String>) -> Self {
        Self {
            fields: Some(fields),
            ..Self::bad_request("Please correct the highlighted fields")
        }
    }
}

impl From<BackendError> for ApiError {
    fn from(e: BackendError) -> Self {
        Self {
            status: e.status_code(),
            message: e.friendly(),
            retryable: e.is_retryable(),
            fields: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: &self.message,
            retryable: self.retryable,
            fields: self.fields.as_ref(),
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn friendly_message_names_missing_table() {
        let msg = friendly_message(r#"relation "public.bookmarks" does not exist"#);
        assert_eq!(
            msg,
            "The bookmarks table was not found. Please run the database setup script."
        );
    }

    #[test]
    fn friendly_message_maps_permission_errors() {
        assert_eq!(
            friendly_message("permission denied for table ratings"),
            "Permission denied. Please check your authentication."
        );
        assert_eq!(
            friendly_message("new row violates row-level security policy for table \"comments\""),
            "Permission denied. Please check your authentication."
        );
    }

    #[test]
    fn friendly_message_passes_unknown_text_through() {
        assert_eq!(friendly_message("something odd"), "something odd");
    }

    #[test]
    fn status_mapping_follows_code_then_status() {
        let dup = BackendError::api(409, Some("23505"), "duplicate key value");
        assert_eq!(dup.status_code(), StatusCode::CONFLICT);
        assert_eq!(dup.friendly(), "This entry already exists.");

        let rls = BackendError::api(400, Some("42501"), "permission denied for table x");
        assert_eq!(rls.status_code(), StatusCode::FORBIDDEN);

        let single = BackendError::api(406, Some("PGRST116"), "JSON object requested");
        assert_eq!(single.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(single.friendly(), "Not found");

        let down = BackendError::api(503, None, "upstream unavailable");
        assert_eq!(down.status_code(), StatusCode::BAD_GATEWAY);
        assert!(down.is_retryable());
    }

    #[test]
    fn transport_errors_are_retryable() {
        let api: ApiError = BackendError::Transport("connection reset".into()).into();
        assert_eq!(api.status, StatusCode::BAD_GATEWAY);
        assert!(api.retryable);
    }
}
