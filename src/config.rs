use serde::Deserialize;

/// Hosted backend project (data + auth surfaces share one base URL).
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub url: String,
    pub anon_key: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// `None` runs against the in-memory backend.
    pub backend: Option<BackendConfig>,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let timeout_secs = var("BACKEND_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(15);
        let backend = match (var("BACKEND_URL"), var("BACKEND_ANON_KEY")) {
            (Some(url), Some(anon_key)) => Some(BackendConfig {
                url,
                anon_key,
                timeout_secs,
            }),
            (None, None) => None,
            _ => anyhow::bail!("BACKEND_URL and BACKEND_ANON_KEY must be set together"),
        };
        let port = match var("APP_PORT") {
            Some(p) => p.parse()?,
            None => 8080,
        };
        Ok(Self {
            backend,
            host: var("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_to_memory_backend() {
        let cfg = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert!(cfg.backend.is_none());
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 8080);
    }

    #[test]
    fn reads_backend_settings() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("BACKEND_URL", "https://project.example.co"),
            ("BACKEND_ANON_KEY", "anon"),
            ("BACKEND_TIMEOUT_SECS", "3"),
            ("APP_PORT", "9000"),
        ]))
        .unwrap();
        let backend = cfg.backend.unwrap();
        assert_eq!(backend.url, "https://project.example.co");
        assert_eq!(backend.timeout_secs, 3);
        assert_eq!(cfg.port, 9000);
    }

    #[test]
    fn rejects_half_configured_backend() {
        let err = AppConfig::from_lookup(lookup(&[("BACKEND_URL", "https://x")])).unwrap_err();
        assert!(err.to_string().contains("must be set together"));
    }
}
