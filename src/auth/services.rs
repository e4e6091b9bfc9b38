use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::json;
use tracing::{info, warn};

use super::dto::{AuthResponse, PublicUser, RegisterRequest, RegisterResponse};
use crate::{
    backend::{BackendError, Db},
    profiles::{
        repo::{self as profiles, NewProfile},
        services::is_valid_username,
    },
    state::AppState,
};

pub const MIN_PASSWORD_LEN: usize = 6;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Form checks done before anything reaches the auth surface.
pub fn validate_registration(req: &RegisterRequest) -> Result<(), BTreeMap<&'static str, String>> {
    let mut errors = BTreeMap::new();

    if req.email.trim().is_empty() {
        errors.insert("email", "Email is required".to_string());
    } else if !is_valid_email(req.email.trim()) {
        errors.insert("email", "Email is invalid".to_string());
    }

    if req.password.is_empty() {
        errors.insert("password", "Password is required".to_string());
    } else if req.password.chars().count() < MIN_PASSWORD_LEN {
        errors.insert(
            "password",
            format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        );
    }

    if req.password != req.confirm_password {
        errors.insert("confirm_password", "Passwords do not match".to_string());
    }

    if req.display_name.trim().is_empty() {
        errors.insert("display_name", "Display name is required".to_string());
    }

    if req.username.trim().is_empty() {
        errors.insert("username", "Username is required".to_string());
    } else if !is_valid_username(req.username.trim()) {
        errors.insert(
            "username",
            "Username can only contain letters, numbers, and underscores".to_string(),
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Signs up through the auth surface, then creates the profile when a session
/// came back. A failed profile insert does not undo the registration.
pub async fn register(state: &AppState, req: RegisterRequest) -> Result<RegisterResponse, BackendError> {
    let email = req.email.trim().to_lowercase();
    let display_name = req.display_name.trim().to_string();
    let username = req.username.trim().to_string();

    let signed = state
        .auth
        .sign_up(
            &email,
            &req.password,
            json!({ "full_name": display_name, "username": username }),
        )
        .await?;
    let user = PublicUser::from(&signed.user);

    let Some(session) = signed.session else {
        info!(user_id = %user.id, "user registered; awaiting email confirmation");
        return Ok(RegisterResponse {
            user,
            session: None,
            profile: None,
            message: "Registration successful! Please check your email to confirm your account."
                .into(),
        });
    };

    let db = Db::new(state.db.as_ref(), Some(&session.access_token));
    let new_profile = NewProfile {
        id: signed.user.id,
        display_name,
        username,
    };
    let (profile, message) = match profiles::create(&db, &new_profile).await {
        Ok(p) => (Some(p), "Registration successful!".to_string()),
        Err(e) => {
            warn!(error = %e, user_id = %user.id, "profile creation failed");
            (
                None,
                format!(
                    "Registration successful, but profile creation failed: {}",
                    e.friendly()
                ),
            )
        }
    };

    info!(user_id = %user.id, "user registered");
    Ok(RegisterResponse {
        user,
        session: Some(AuthResponse::from(session)),
        profile,
        message,
    })
}
