use std::time::Duration;

use anyhow::{Result, anyhow};

pub const DEFAULT_BASE_URL: &str = "https://v3.football.api-sports.io";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
const DEFAULT_SEED: u64 = 42;
const DEFAULT_TREES: usize = 100;

/// Settings for one pipeline run. Built once at startup and handed to the
/// collaborators that need it; nothing here is global.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
    pub cache_ttl: Duration,
    pub seed: u64,
    pub trees: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            seed: DEFAULT_SEED,
            trees: DEFAULT_TREES,
        }
    }
}

impl ApiConfig {
    /// Loads `.env.local` then `.env` (real env vars win) and reads the process environment.
    pub fn from_env() -> Self {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::from_filename(".env");
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        let api_key = lookup("APISPORTS_KEY")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        let base_url = lookup("APISPORTS_BASE_URL")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(d.base_url);
        let timeout_secs = parse_u64(lookup("APISPORTS_TIMEOUT_SECS"))
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
            .max(1);
        let cache_ttl_secs =
            parse_u64(lookup("APISPORTS_CACHE_TTL_SECS")).unwrap_or(DEFAULT_CACHE_TTL_SECS);
        let seed = parse_u64(lookup("MAXFOOT_SEED")).unwrap_or(DEFAULT_SEED);
        let trees = parse_u64(lookup("MAXFOOT_TREES"))
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_TREES)
            .clamp(1, 1000);

        Self {
            api_key,
            base_url,
            timeout: Duration::from_secs(timeout_secs),
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            seed,
            trees,
        }
    }

    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| anyhow!("APISPORTS_KEY is not set (env or .env file)"))
    }
}

fn parse_u64(raw: Option<String>) -> Option<u64> {
    raw.and_then(|v| v.trim().parse::<u64>().ok())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::{ApiConfig, DEFAULT_BASE_URL};

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let cfg = ApiConfig::from_lookup(|_| None);
        assert!(cfg.api_key.is_none());
        assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.timeout, Duration::from_secs(10));
        assert_eq!(cfg.seed, 42);
        assert_eq!(cfg.trees, 100);
        assert!(cfg.require_api_key().is_err());
    }

    #[test]
    fn values_are_parsed_and_clamped() {
        let cfg = ApiConfig::from_lookup(lookup_from(&[
            ("APISPORTS_KEY", " abc "),
            ("APISPORTS_BASE_URL", "http://localhost:9000/"),
            ("APISPORTS_TIMEOUT_SECS", "0"),
            ("APISPORTS_CACHE_TTL_SECS", "5"),
            ("MAXFOOT_SEED", "7"),
            ("MAXFOOT_TREES", "5000"),
        ]));
        assert_eq!(cfg.require_api_key().unwrap(), "abc");
        assert_eq!(cfg.base_url, "http://localhost:9000");
        assert_eq!(cfg.timeout, Duration::from_secs(1));
        assert_eq!(cfg.cache_ttl, Duration::from_secs(5));
        assert_eq!(cfg.seed, 7);
        assert_eq!(cfg.trees, 1000);
    }

    #[test]
    fn invalid_numbers_fall_back() {
        let cfg = ApiConfig::from_lookup(lookup_from(&[
            ("APISPORTS_KEY", "   "),
            ("MAXFOOT_SEED", "not-a-number"),
        ]));
        assert!(cfg.api_key.is_none());
        assert_eq!(cfg.seed, 42);
    }
}
