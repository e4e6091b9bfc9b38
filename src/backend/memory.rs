use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use serde_json::{Map, Value};
use time::{format_description::FormatItem, macros::format_description, Duration, OffsetDateTime};
use uuid::Uuid;

use super::{tables, AuthBackend, Backend, BackendError, Identity, Query, Session, SignUp};

const TIMESTAMP: &[FormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
);

/// In-process stand-in for the hosted backend, used for local runs without a
/// project and by tests. Row-level security is not modelled; unique keys are.
pub struct MemoryBackend {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    tables: HashMap<String, Vec<Value>>,
    unique: HashMap<String, Vec<Vec<String>>>,
    accounts: HashMap<String, Account>,
    access_tokens: HashMap<String, Uuid>,
    refresh_tokens: HashMap<String, Uuid>,
    last_stamp: Option<OffsetDateTime>,
}

struct Account {
    identity: Identity,
    // plain text: this backend never leaves the process
    password: String,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Empty store with the unique keys of the application schema.
    pub fn new() -> Self {
        let backend = Self {
            inner: Mutex::new(Inner::default()),
        };
        backend.add_unique(tables::PROFILES, &["username"]);
        backend.add_unique(tables::BOOKMARKS, &["user_id", "recipe_id"]);
        backend.add_unique(tables::RATINGS, &["user_id", "recipe_id"]);
        backend
    }

    pub fn add_unique(&self, table: &str, columns: &[&str]) {
        self.lock()
            .unique
            .entry(table.to_string())
            .or_default()
            .push(columns.iter().map(|c| c.to_string()).collect());
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Inner {
    /// Strictly increasing timestamps so `created_at` ordering is total.
    fn stamp(&mut self) -> String {
        let mut now = OffsetDateTime::now_utc();
        if let Some(last) = self.last_stamp {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_stamp = Some(now);
        now.format(TIMESTAMP).unwrap_or_default()
    }

    fn check_unique(&self, table: &str, candidate: &Value, skip: Option<usize>) -> Result<(), BackendError> {
        let Some(keys) = self.unique.get(table) else {
            return Ok(());
        };
        let rows = self.tables.get(table).map(Vec::as_slice).unwrap_or_default();
        for key in keys {
            let clash = rows.iter().enumerate().any(|(i, row)| {
                Some(i) != skip
                    && key.iter().all(|c| match (row.get(c), candidate.get(c)) {
                        (Some(a), Some(b)) => !a.is_null() && a == b,
                        _ => false,
                    })
            });
            if clash {
                return Err(BackendError::api(
                    409,
                    Some("23505"),
                    format!(
                        "duplicate key value violates unique constraint \"{}_{}_key\"",
                        table,
                        key.join("_")
                    ),
                ));
            }
        }
        Ok(())
    }

    fn insert(&mut self, table: &str, row: Value) -> Result<Value, BackendError> {
        let Value::Object(mut obj) = row else {
            return Err(BackendError::api(400, Some("PGRST102"), "row must be a JSON object"));
        };
        if !obj.get("id").is_some_and(|v| !v.is_null()) {
            obj.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
        }
        if !obj.get("created_at").is_some_and(|v| !v.is_null()) {
            obj.insert("created_at".into(), Value::String(self.stamp()));
        }
        let row = Value::Object(obj);

        let id_taken = self
            .tables
            .get(table)
            .is_some_and(|rows| rows.iter().any(|r| r.get("id") == row.get("id")));
        if id_taken {
            return Err(BackendError::api(
                409,
                Some("23505"),
                format!("duplicate key value violates unique constraint \"{table}_pkey\""),
            ));
        }
        self.check_unique(table, &row, None)?;

        self.tables
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        Ok(row)
    }

    fn merge_at(&mut self, table: &str, index: usize, patch: &Map<String, Value>) -> Result<Value, BackendError> {
        let mut merged = self.tables[table][index].clone();
        if let Value::Object(obj) = &mut merged {
            for (k, v) in patch {
                if k != "id" && k != "created_at" {
                    obj.insert(k.clone(), v.clone());
                }
            }
        }
        self.check_unique(table, &merged, Some(index))?;
        if let Some(rows) = self.tables.get_mut(table) {
            rows[index] = merged.clone();
        }
        Ok(merged)
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn select(&self, _token: Option<&str>, query: &Query) -> Result<Vec<Value>, BackendError> {
        let inner = self.lock();
        let rows = inner
            .tables
            .get(query.table)
            .map(|rows| rows.iter().filter(|r| query.matches(r)).cloned().collect())
            .unwrap_or_default();
        Ok(query.arrange(rows))
    }

    async fn insert(&self, _token: Option<&str>, table: &str, row: Value) -> Result<Value, BackendError> {
        self.lock().insert(table, row)
    }

    async fn update(
        &self,
        _token: Option<&str>,
        query: &Query,
        patch: Value,
    ) -> Result<Vec<Value>, BackendError> {
        let Value::Object(patch) = patch else {
            return Err(BackendError::api(400, Some("PGRST102"), "patch must be a JSON object"));
        };
        let mut inner = self.lock();
        let hits: Vec<usize> = inner
            .tables
            .get(query.table)
            .map(|rows| {
                rows.iter()
                    .enumerate()
                    .filter(|(_, r)| query.matches(r))
                    .map(|(i, _)| i)
                    .collect()
            })
            .unwrap_or_default();
        hits.into_iter()
            .map(|i| inner.merge_at(query.table, i, &patch))
            .collect()
    }

    async fn delete(&self, _token: Option<&str>, query: &Query) -> Result<usize, BackendError> {
        let mut inner = self.lock();
        let Some(rows) = inner.tables.get_mut(query.table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|r| !query.matches(r));
        Ok(before - rows.len())
    }

    async fn upsert(
        &self,
        _token: Option<&str>,
        table: &str,
        row: Value,
        on_conflict: &[&str],
    ) -> Result<Value, BackendError> {
        let mut inner = self.lock();
        let existing = inner.tables.get(table).and_then(|rows| {
            rows.iter().position(|r| {
                on_conflict
                    .iter()
                    .all(|c| r.get(*c).is_some() && r.get(*c) == row.get(*c))
            })
        });
        match (existing, row) {
            (Some(i), Value::Object(patch)) => inner.merge_at(table, i, &patch),
            (_, row) => inner.insert(table, row),
        }
    }

    async fn count(&self, _token: Option<&str>, query: &Query) -> Result<u64, BackendError> {
        let inner = self.lock();
        let n = inner
            .tables
            .get(query.table)
            .map_or(0, |rows| rows.iter().filter(|r| query.matches(r)).count());
        Ok(n as u64)
    }
}

impl Inner {
    fn open_session(&mut self, identity: Identity) -> Session {
        let access_token = format!("mem-access-{}", Uuid::new_v4());
        let refresh_token = format!("mem-refresh-{}", Uuid::new_v4());
        self.access_tokens.insert(access_token.clone(), identity.id);
        self.refresh_tokens.insert(refresh_token.clone(), identity.id);
        Session {
            access_token,
            refresh_token,
            expires_in: Some(3600),
            user: identity,
        }
    }

    fn identity(&self, id: Uuid) -> Option<Identity> {
        self.accounts
            .values()
            .find(|a| a.identity.id == id)
            .map(|a| a.identity.clone())
    }
}

fn invalid_token() -> BackendError {
    BackendError::api(401, Some("bad_jwt"), "invalid JWT: unable to parse or verify signature")
}

#[async_trait]
impl AuthBackend for MemoryBackend {
    async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> Result<SignUp, BackendError> {
        let mut inner = self.lock();
        let key = email.to_lowercase();
        if inner.accounts.contains_key(&key) {
            return Err(BackendError::api(422, Some("user_already_exists"), "User already registered"));
        }
        let identity = Identity {
            id: Uuid::new_v4(),
            email: Some(key.clone()),
            user_metadata: metadata,
        };
        inner.accounts.insert(
            key,
            Account {
                identity: identity.clone(),
                password: password.to_string(),
            },
        );
        let session = inner.open_session(identity.clone());
        Ok(SignUp {
            user: identity,
            session: Some(session),
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        let mut inner = self.lock();
        let identity = inner
            .accounts
            .get(&email.to_lowercase())
            .filter(|a| a.password == password)
            .map(|a| a.identity.clone())
            .ok_or_else(|| {
                BackendError::api(400, Some("invalid_credentials"), "Invalid login credentials")
            })?;
        Ok(inner.open_session(identity))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, BackendError> {
        let mut inner = self.lock();
        let identity = inner
            .refresh_tokens
            .remove(refresh_token)
            .and_then(|id| inner.identity(id))
            .ok_or_else(|| {
                BackendError::api(400, Some("refresh_token_not_found"), "Invalid Refresh Token")
            })?;
        Ok(inner.open_session(identity))
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        let mut inner = self.lock();
        let user_id = inner.access_tokens.remove(access_token).ok_or_else(invalid_token)?;
        inner.refresh_tokens.retain(|_, id| *id != user_id);
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<Identity, BackendError> {
        let inner = self.lock();
        inner
            .access_tokens
            .get(access_token)
            .and_then(|id| inner.identity(*id))
            .ok_or_else(invalid_token)
    }
}
