//! Access to the hosted backend: a PostgREST-style data surface and a
//! GoTrue-style auth surface. Row-level security lives there, so every call
//! carries the caller's bearer token when there is one.

pub mod memory;
pub mod query;
pub mod rest;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub use crate::error::BackendError;
pub use memory::MemoryBackend;
pub use query::{Order, Query};
pub use rest::RestBackend;

pub mod tables {
    pub const PROFILES: &str = "profiles";
    pub const RECIPES: &str = "recipes";
    pub const BOOKMARKS: &str = "bookmarks";
    pub const RATINGS: &str = "ratings";
    pub const COMMENTS: &str = "comments";

    pub const ALL: [&str; 5] = [PROFILES, RECIPES, BOOKMARKS, RATINGS, COMMENTS];
}

#[async_trait]
pub trait Backend: Send + Sync {
    async fn select(&self, token: Option<&str>, query: &Query) -> Result<Vec<Value>, BackendError>;
    async fn insert(&self, token: Option<&str>, table: &str, row: Value) -> Result<Value, BackendError>;
    async fn update(
        &self,
        token: Option<&str>,
        query: &Query,
        patch: Value,
    ) -> Result<Vec<Value>, BackendError>;
    async fn delete(&self, token: Option<&str>, query: &Query) -> Result<usize, BackendError>;
    /// Insert, or merge into the row that collides on `on_conflict`.
    async fn upsert(
        &self,
        token: Option<&str>,
        table: &str,
        row: Value,
        on_conflict: &[&str],
    ) -> Result<Value, BackendError>;
    async fn count(&self, token: Option<&str>, query: &Query) -> Result<u64, BackendError>;
}

/// A user account as the auth surface reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    pub user: Identity,
}

/// Sign-up result. `session` is absent when the account awaits email confirmation.
#[derive(Debug, Clone)]
pub struct SignUp {
    pub user: Identity,
    pub session: Option<Session>,
}

#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> Result<SignUp, BackendError>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError>;
    async fn refresh(&self, refresh_token: &str) -> Result<Session, BackendError>;
    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError>;
    async fn get_user(&self, access_token: &str) -> Result<Identity, BackendError>;
}

/// Typed view over a [`Backend`] bound to one caller.
#[derive(Clone, Copy)]
pub struct Db<'a> {
    backend: &'a dyn Backend,
    token: Option<&'a str>,
}

impl<'a> Db<'a> {
    pub fn new(backend: &'a dyn Backend, token: Option<&'a str>) -> Self {
        Self { backend, token }
    }

    pub async fn fetch_all<T: DeserializeOwned>(&self, query: &Query) -> Result<Vec<T>, BackendError> {
        let rows = self.backend.select(self.token, query).await?;
        rows.into_iter().map(decode).collect()
    }

    pub async fn fetch_optional<T: DeserializeOwned>(&self, query: &Query) -> Result<Option<T>, BackendError> {
        let query = query.clone().limit(1);
        let mut rows = self.backend.select(self.token, &query).await?;
        rows.pop().map(decode).transpose()
    }

    pub async fn insert<T: DeserializeOwned>(
        &self,
        table: &str,
        row: &impl Serialize,
    ) -> Result<T, BackendError> {
        let row = encode(row)?;
        decode(self.backend.insert(self.token, table, row).await?)
    }

    pub async fn update<T: DeserializeOwned>(
        &self,
        query: &Query,
        patch: &impl Serialize,
    ) -> Result<Vec<T>, BackendError> {
        let patch = encode(patch)?;
        let rows = self.backend.update(self.token, query, patch).await?;
        rows.into_iter().map(decode).collect()
    }

    pub async fn delete(&self, query: &Query) -> Result<usize, BackendError> {
        self.backend.delete(self.token, query).await
    }

    pub async fn upsert<T: DeserializeOwned>(
        &self,
        table: &str,
        row: &impl Serialize,
        on_conflict: &[&str],
    ) -> Result<T, BackendError> {
        let row = encode(row)?;
        decode(self.backend.upsert(self.token, table, row, on_conflict).await?)
    }

    pub async fn count(&self, query: &Query) -> Result<u64, BackendError> {
        self.backend.count(self.token, query).await
    }
}

fn encode(body: &impl Serialize) -> Result<Value, BackendError> {
    serde_json::to_value(body).map_err(|e| BackendError::Decode(e.to_string()))
}

fn decode<T: DeserializeOwned>(row: Value) -> Result<T, BackendError> {
    serde_json::from_value(row).map_err(|e| BackendError::Decode(e.to_string()))
}
