use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::extractors::AuthUser;
use crate::backend::{AuthBackend, Backend, Db, MemoryBackend, RestBackend};
use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn Backend>,
    pub auth: Arc<dyn AuthBackend>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let state = match &config.backend {
            Some(backend) => {
                let rest = Arc::new(RestBackend::new(backend)?);
                info!(url = %backend.url, "using hosted backend");
                Self::from_parts(rest.clone(), rest, config.clone())
            }
            None => {
                warn!("BACKEND_URL not set; data lives in memory and is lost on exit");
                let mem = Arc::new(MemoryBackend::new());
                Self::from_parts(mem.clone(), mem, config.clone())
            }
        };
        Ok(state)
    }

    pub fn from_parts(db: Arc<dyn Backend>, auth: Arc<dyn AuthBackend>, config: Arc<AppConfig>) -> Self {
        Self { db, auth, config }
    }

    /// State over a fresh in-memory backend.
    pub fn fake() -> Self {
        let mem = Arc::new(MemoryBackend::new());
        let config = Arc::new(AppConfig {
            backend: None,
            host: "127.0.0.1".into(),
            port: 0,
        });
        Self::from_parts(mem.clone(), mem, config)
    }

    /// Data access without a user session.
    pub fn anon(&self) -> Db<'_> {
        Db::new(self.db.as_ref(), None)
    }

    /// Data access as `user`, so row-level policies see their token.
    pub fn as_user<'a>(&'a self, user: &'a AuthUser) -> Db<'a> {
        Db::new(self.db.as_ref(), Some(&user.access_token))
    }
}
