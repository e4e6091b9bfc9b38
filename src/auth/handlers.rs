use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, MeResponse, PublicUser, RefreshRequest, RegisterRequest, RegisterResponse},
        extractors::AuthUser,
        services::{self, is_valid_email, validate_registration},
    },
    backend::BackendError,
    error::ApiError,
    profiles::services::ensure_profile,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    if let Err(fields) = validate_registration(&payload) {
        warn!(?fields, "registration form rejected");
        return Err(ApiError::invalid_fields(fields));
    }

    let out = services::register(&state, payload).await.map_err(|e| {
        error!(error = %e, "sign up failed");
        ApiError::from(e)
    })?;
    Ok((StatusCode::CREATED, Json(out)))
}

// Older auth servers send `invalid_grant` with only the message to tell it apart.
fn is_bad_login(e: &BackendError) -> bool {
    e.code() == Some("invalid_credentials") || e.to_string() == "Invalid login credentials"
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::bad_request("Invalid email"));
    }

    let session = state
        .auth
        .sign_in(&payload.email, &payload.password)
        .await
        .map_err(|e| {
            if is_bad_login(&e) {
                warn!(email = %payload.email, "login rejected");
                ApiError::unauthorized("Invalid credentials")
            } else {
                error!(error = %e, "sign in failed");
                ApiError::from(e)
            }
        })?;

    info!(user_id = %session.user.id, "user logged in");
    Ok(Json(AuthResponse::from(session)))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let session = state.auth.refresh(&payload.refresh_token).await.map_err(|e| {
        warn!(error = %e, "refresh rejected");
        if e.is_retryable() {
            ApiError::from(e)
        } else {
            ApiError::unauthorized("Invalid or expired refresh token")
        }
    })?;
    Ok(Json(AuthResponse::from(session)))
}

#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn logout(State(state): State<AppState>, user: AuthUser) -> Result<StatusCode, ApiError> {
    state.auth.sign_out(&user.access_token).await.map_err(|e| {
        error!(error = %e, "sign out failed");
        ApiError::from(e)
    })?;
    info!("user logged out");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn get_me(State(state): State<AppState>, user: AuthUser) -> Result<Json<MeResponse>, ApiError> {
    let profile = ensure_profile(&state.as_user(&user), &user.identity)
        .await
        .map_err(|e| {
            error!(error = %e, "load profile failed");
            ApiError::from(e)
        })?;
    Ok(Json(MeResponse {
        user: PublicUser::from(&user.identity),
        profile,
    }))
}
