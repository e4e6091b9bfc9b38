use std::collections::{BTreeMap, HashMap};

use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use super::dto::{AuthorSummary, UpdateProfileRequest};
use super::repo::{self, NewProfile, Profile, ProfilePatch};
use crate::backend::{BackendError, Db, Identity};

pub(crate) fn is_valid_username(username: &str) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[a-zA-Z0-9_]+$").unwrap();
    }
    USERNAME_RE.is_match(username)
}

fn fallback_username(id: Uuid) -> String {
    format!("user_{}", &id.simple().to_string()[..8])
}

/// Profile for an account that signed in before one existed.
pub fn default_profile(identity: &Identity) -> NewProfile {
    let meta = |key: &str| {
        identity
            .user_metadata
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let local_part = identity
        .email
        .as_deref()
        .and_then(|e| e.split('@').next())
        .filter(|s| !s.is_empty());

    let display_name = meta("full_name")
        .or_else(|| local_part.map(str::to_string))
        .unwrap_or_else(|| "User".into());

    let username = meta("username")
        .filter(|u| is_valid_username(u))
        .or_else(|| {
            local_part
                .map(|l| {
                    l.chars()
                        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
                        .collect::<String>()
                })
                .filter(|u| is_valid_username(u))
        })
        .unwrap_or_else(|| fallback_username(identity.id));

    NewProfile {
        id: identity.id,
        display_name,
        username,
    }
}

/// Loads the caller's profile, creating it on first use.
pub async fn ensure_profile(db: &Db<'_>, identity: &Identity) -> Result<Profile, BackendError> {
    if let Some(p) = repo::find_by_id(db, identity.id).await? {
        return Ok(p);
    }

    let mut new = default_profile(identity);
    match repo::create(db, &new).await {
        Ok(p) => {
            info!(user_id = %p.id, username = %p.username, "profile created");
            Ok(p)
        }
        Err(e) if e.code() == Some("23505") => {
            // Either a concurrent request created it, or the username is taken.
            if let Some(p) = repo::find_by_id(db, identity.id).await? {
                return Ok(p);
            }
            warn!(user_id = %identity.id, username = %new.username, "username taken; using fallback");
            new.username = fallback_username(identity.id);
            repo::create(db, &new).await
        }
        Err(e) => Err(e),
    }
}

pub fn validate_update(req: UpdateProfileRequest) -> Result<ProfilePatch, BTreeMap<&'static str, String>> {
    let mut errors = BTreeMap::new();
    let display_name = req.display_name.trim().to_string();
    let username = req.username.trim().to_string();

    if display_name.is_empty() {
        errors.insert("display_name", "Display name is required".into());
    }
    if username.is_empty() {
        errors.insert("username", "Username is required".into());
    } else if !is_valid_username(&username) {
        errors.insert(
            "username",
            "Username can only contain letters, numbers, and underscores".into(),
        );
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    let blank_to_none = |s: Option<String>| s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    Ok(ProfilePatch {
        display_name,
        username,
        bio: blank_to_none(req.bio),
        avatar_url: blank_to_none(req.avatar_url),
        updated_at: OffsetDateTime::now_utc(),
    })
}

/// Author lookup for a batch of user ids; missing profiles are simply absent.
pub async fn authors(db: &Db<'_>, user_ids: &[Uuid]) -> Result<HashMap<Uuid, AuthorSummary>, BackendError> {
    let mut ids = user_ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    let profiles = repo::find_many(db, &ids).await?;
    Ok(profiles.iter().map(|p| (p.id, AuthorSummary::from(p))).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use serde_json::json;

    fn identity(email: Option<&str>, metadata: serde_json::Value) -> Identity {
        Identity {
            id: Uuid::new_v4(),
            email: email.map(str::to_string),
            user_metadata: metadata,
        }
    }

    #[test]
    fn default_profile_prefers_metadata() {
        let id = identity(
            Some("jane@example.com"),
            json!({ "full_name": "Jane Cook", "username": "janec" }),
        );
        let p = default_profile(&id);
        assert_eq!(p.display_name, "Jane Cook");
        assert_eq!(p.username, "janec");
    }

    #[test]
    fn invalid_metadata_username_falls_back_to_email() {
        let p = default_profile(&identity(
            Some("jane.doe@example.com"),
            json!({ "username": "jane doe!" }),
        ));
        assert_eq!(p.username, "jane_doe");
    }

    #[test]
    fn default_profile_falls_back_to_email_then_id() {
        let p = default_profile(&identity(Some("jane.doe@example.com"), json!({})));
        assert_eq!(p.display_name, "jane.doe");
        assert_eq!(p.username, "jane_doe");

        let anon = identity(None, json!(null));
        let p = default_profile(&anon);
        assert_eq!(p.display_name, "User");
        assert_eq!(p.username, fallback_username(anon.id));
        assert!(p.username.starts_with("user_") && p.username.len() == 13);
    }

    #[test]
    fn username_rules() {
        assert!(is_valid_username("chef_42"));
        assert!(!is_valid_username("chef 42"));
        assert!(!is_valid_username("chef-42"));
        assert!(!is_valid_username(""));
    }

    #[test]
    fn update_validation_collects_field_errors() {
        let errs = validate_update(UpdateProfileRequest {
            display_name: "  ".into(),
            username: "bad name".into(),
            bio: None,
            avatar_url: None,
        })
        .unwrap_err();
        assert_eq!(errs["display_name"], "Display name is required");
        assert!(errs["username"].contains("letters, numbers, and underscores"));

        let ok = validate_update(UpdateProfileRequest {
            display_name: " Jane ".into(),
            username: "jane".into(),
            bio: Some("   ".into()),
            avatar_url: Some("https://img.example/a.png".into()),
        })
        .unwrap();
        assert_eq!(ok.display_name, "Jane");
        assert_eq!(ok.bio, None);
        assert_eq!(ok.avatar_url.as_deref(), Some("https://img.example/a.png"));
    }

    #[tokio::test]
    async fn ensure_profile_creates_once() {
        let mem = MemoryBackend::new();
        let db = Db::new(&mem, None);
        let who = identity(Some("sam@example.com"), json!({}));

        let first = ensure_profile(&db, &who).await.unwrap();
        let second = ensure_profile(&db, &who).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.username, "sam");
    }

    #[tokio::test]
    async fn ensure_profile_survives_username_clash() {
        let mem = MemoryBackend::new();
        let db = Db::new(&mem, None);
        let a = identity(Some("sam@example.com"), json!({}));
        let b = identity(Some("sam@elsewhere.org"), json!({}));

        ensure_profile(&db, &a).await.unwrap();
        let pb = ensure_profile(&db, &b).await.unwrap();
        assert_eq!(pb.username, fallback_username(b.id));
    }
}
