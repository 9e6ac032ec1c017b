//! Agent configuration with layered loading.
//!
//! Configuration is loaded with figment from multiple sources:
//!
//! 1. Environment variables (OFFLINE_AGENT_*)
//! 2. TOML config file (if OFFLINE_AGENT_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Deserializer, Serialize};

mod validation;

pub use validation::ConfigError;

/// Agent configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (OFFLINE_AGENT_*)
/// 2. TOML config file (if OFFLINE_AGENT_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Application name shown in the offline page title.
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Prefix shared by both store names.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Agent version. Bumping it retires every store of the previous version
    /// at the next activation.
    #[serde(default = "default_version")]
    pub version: String,

    /// Application origin the static manifest is resolved against.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Root-relative paths pre-cached at install.
    ///
    /// Lists accept an array or a comma-separated string, so
    /// `OFFLINE_AGENT_STATIC_ASSETS=/,/app.css` works from the environment.
    #[serde(default = "default_static_assets", deserialize_with = "string_list")]
    pub static_assets: Vec<String>,

    /// Hosts never intercepted (matched by substring).
    ///
    /// Set via OFFLINE_AGENT_EXCLUDED_HOSTS (comma-separated).
    #[serde(default = "default_excluded_hosts", deserialize_with = "string_list")]
    pub excluded_hosts: Vec<String>,

    /// Web-font hosts, always served cache-first (matched by substring).
    #[serde(default = "default_font_hosts", deserialize_with = "string_list")]
    pub font_hosts: Vec<String>,

    /// Request immediate activation once install completes.
    #[serde(default = "default_true")]
    pub skip_waiting_on_install: bool,

    /// Path to the SQLite cache storage.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for network fetches.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Network fetch timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum response body size in bytes.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

fn default_app_name() -> String {
    "Devis App".into()
}

fn default_cache_prefix() -> String {
    "devis-app".into()
}

fn default_version() -> String {
    "v1".into()
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_static_assets() -> Vec<String> {
    [
        "/",
        "/index.html",
        "/app/login.html",
        "/app/register.html",
        "/app/dashboard.html",
        "/app/quotes.html",
        "/app/view-quote.html",
        "/app/create-quote.html",
        "/app/edit-quote.html",
        "/app/clients.html",
        "/app/liste-clients.html",
        "/app/settings.html",
        "/app/forgot-password.html",
        "/app/shared.css",
        "/manifest.json",
        "/icons/icon-192x192.png",
        "/icons/icon-512x512.png",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_excluded_hosts() -> Vec<String> {
    vec!["supabase.co".into(), "esm.sh".into(), "cdnjs.cloudflare.com".into()]
}

fn default_font_hosts() -> Vec<String> {
    vec!["fonts.gstatic.com".into(), "fonts.googleapis.com".into()]
}

fn default_true() -> bool {
    true
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./offline-agent-cache.sqlite")
}

fn default_user_agent() -> String {
    "offline-agent/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    10_485_760 // 10MB
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringList {
    Joined(String),
    Items(Vec<String>),
}

/// Accept either a sequence or one comma-separated string.
fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = match StringList::deserialize(deserializer)? {
        StringList::Joined(joined) => joined.split(',').map(str::to_string).collect(),
        StringList::Items(items) => items,
    };
    Ok(items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect())
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            cache_prefix: default_cache_prefix(),
            version: default_version(),
            origin: default_origin(),
            static_assets: default_static_assets(),
            excluded_hosts: default_excluded_hosts(),
            font_hosts: default_font_hosts(),
            skip_waiting_on_install: true,
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
        }
    }
}

impl AgentConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Name of the current dynamic store, e.g. `devis-app-v1`.
    pub fn dynamic_cache_name(&self) -> String {
        format!("{}-{}", self.cache_prefix, self.version)
    }

    /// Name of the current static store, e.g. `devis-app-static-v1`.
    pub fn static_cache_name(&self) -> String {
        format!("{}-static-{}", self.cache_prefix, self.version)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    /// The layered figment `load` extracts from.
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("OFFLINE_AGENT_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment.merge(
            Env::prefixed("OFFLINE_AGENT_")
                .ignore(&["config_file"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        )
    }

    /// Extract and validate a configuration from an arbitrary figment.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
