//! Process configuration.
//!
//! Configuration is layered: serialized defaults, then `pod-reaper.toml`,
//! then `REAPER__`-prefixed environment variables split on `__`. On top of
//! that the flat environment variables of the original deployment surface
//! (`REAPER_TTL_TO_DELETE`, `REAPER_WATCH_NAMESPACES`,
//! `REAPER_WATCH_ALL_NAMESPACES`) are honored with lenient parsing: a
//! malformed TTL falls back to the default instead of failing startup.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

/// Default grace period before an evicted pod is deleted, in seconds.
pub const DEFAULT_TTL_SECONDS: i64 = 300;

const LEGACY_TTL_ENV: &str = "REAPER_TTL_TO_DELETE";
const LEGACY_NAMESPACES_ENV: &str = "REAPER_WATCH_NAMESPACES";
const LEGACY_WATCH_ALL_ENV: &str = "REAPER_WATCH_ALL_NAMESPACES";

/// Reconciliation settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReaperConfig {
    /// Seconds an evicted pod may linger before deletion. Zero or negative
    /// means "already expired": matching pods are deleted on first sight.
    pub ttl_seconds: i64,
    /// Watch every namespace instead of the explicit list below.
    pub watch_all_namespaces: bool,
    /// Namespaces the watch layer observes when not watching all of them.
    pub namespaces: Vec<String>,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: DEFAULT_TTL_SECONDS,
            watch_all_namespaces: false,
            namespaces: vec!["default".to_string()],
        }
    }
}

impl ReaperConfig {
    pub fn namespace_filter(&self) -> NamespaceFilter {
        NamespaceFilter::new(self.watch_all_namespaces, self.namespaces.clone())
    }
}

/// Namespace scope applied by the watch layer before keys are enqueued.
/// The decision engine never consults this.
#[derive(Clone, Debug)]
pub struct NamespaceFilter {
    watch_all: bool,
    namespaces: HashSet<String>,
}

impl NamespaceFilter {
    pub fn new(watch_all: bool, namespaces: Vec<String>) -> Self {
        Self {
            watch_all,
            namespaces: namespaces.into_iter().collect(),
        }
    }

    pub fn allows(&self, namespace: &str) -> bool {
        self.watch_all || self.namespaces.contains(namespace)
    }
}

/// HTTP exposure for `/metrics` and `/health`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Bind address for the HTTP server.
    pub listen: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Watch-layer settings for the built-in polling event source.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Interval between store listings.
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Configuration {
    pub reaper: ReaperConfig,
    pub http: HttpConfig,
    pub watch: WatchConfig,
}

impl Configuration {
    pub fn load() -> Result<Self, Box<figment::Error>> {
        Self::load_figment(Figment::from(Serialized::defaults(Configuration::default()))
            .merge(Toml::file("pod-reaper.toml")))
    }

    pub fn load_from_path(path: &Path) -> Result<Self, Box<figment::Error>> {
        Self::load_figment(Figment::from(Serialized::defaults(Configuration::default()))
            .merge(Toml::file(path)))
    }

    fn load_figment(figment: Figment) -> Result<Self, Box<figment::Error>> {
        let mut config: Configuration = figment
            .merge(Env::prefixed("REAPER__").split("__"))
            .extract()
            .map_err(Box::new)?;
        config.apply_legacy_env();
        Ok(config)
    }

    /// Apply the flat environment variables of the original deployment
    /// surface on top of whatever figment resolved.
    fn apply_legacy_env(&mut self) {
        if let Ok(raw) = std::env::var(LEGACY_TTL_ENV) {
            self.reaper.ttl_seconds = parse_ttl(&raw);
        }
        if let Ok(raw) = std::env::var(LEGACY_NAMESPACES_ENV) {
            self.reaper.namespaces = parse_namespaces(&raw);
        }
        if let Ok(raw) = std::env::var(LEGACY_WATCH_ALL_ENV) {
            self.reaper.watch_all_namespaces = raw == "true";
        }
    }
}

/// Parse a TTL value in seconds. Malformed input falls back to the default
/// with a warning rather than failing startup.
pub fn parse_ttl(raw: &str) -> i64 {
    if raw.is_empty() {
        return DEFAULT_TTL_SECONDS;
    }
    match raw.parse::<i64>() {
        Ok(ttl) => ttl,
        Err(e) => {
            log::warn!("invalid TTL value {raw:?}, using default {DEFAULT_TTL_SECONDS}: {e}");
            DEFAULT_TTL_SECONDS
        }
    }
}

/// Parse a comma-separated namespace list, trimming whitespace per entry.
/// Empty input falls back to the default scope.
pub fn parse_namespaces(raw: &str) -> Vec<String> {
    if raw.is_empty() {
        return vec!["default".to_string()];
    }
    raw.split(',').map(|ns| ns.trim().to_string()).collect()
}
