use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backend::{Identity, Session};
use crate::profiles::repo::Profile;

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub display_name: String,
    pub username: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: Option<String>,
}

impl From<&Identity> for PublicUser {
    fn from(i: &Identity) -> Self {
        Self {
            id: i.id,
            email: i.email.clone(),
        }
    }
}

/// Tokens handed back to the client, which owns session storage.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: Option<i64>,
    pub user: PublicUser,
}

impl From<Session> for AuthResponse {
    fn from(s: Session) -> Self {
        Self {
            user: PublicUser::from(&s.user),
            access_token: s.access_token,
            refresh_token: s.refresh_token,
            expires_in: s.expires_in,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user: PublicUser,
    /// Absent while the account waits for email confirmation.
    pub session: Option<AuthResponse>,
    pub profile: Option<Profile>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: PublicUser,
    pub profile: Profile,
}
