use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub upstream: UpstreamConfig,

    pub cache: CacheConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// `SQLite` connection string. Empty disables persistence entirely.
    pub database_url: String,

    pub log_level: String,

    /// `"pretty"` or `"json"`.
    pub log_format: String,

    /// Tokio worker threads; 0 lets the runtime decide.
    pub worker_threads: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:data/adlib-proxy.db".to_string(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            worker_threads: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3001,
            cors_allowed_origins: vec!["*".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,

    /// Sent as `X-RapidAPI-Key`.
    pub api_key: String,

    /// Sent as `X-RapidAPI-Host`.
    pub api_host: String,

    pub timeout_seconds: u64,

    pub search_country_code: String,

    pub ads_country_code: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://ad-libraries.p.rapidapi.com".to_string(),
            api_key: String::new(),
            api_host: "ad-libraries.p.rapidapi.com".to_string(),
            timeout_seconds: 30,
            search_country_code: "PL".to_string(),
            ads_country_code: "US".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum age of stored page ads before a lookup goes upstream again.
    pub page_ads_ttl_hours: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            page_ads_ttl_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            upstream: UpstreamConfig::default(),
            cache: CacheConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Config {
    /// Loads `.env`, the first config file found, then environment overrides.
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            info!("Loaded environment from: {}", path.display());
        }

        let mut config = Self::load_file()?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn load_file() -> Result<Self> {
        for path in &Self::config_paths() {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Applies `PORT`, `RAPIDAPI_KEY`, `RAPIDAPI_HOST`, `DATABASE_URL` and
    /// `LOG_LEVEL` on top of the file values.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid PORT value: {port}"))?;
        }
        if let Some(key) = lookup("RAPIDAPI_KEY") {
            self.upstream.api_key = key;
        }
        if let Some(host) = lookup("RAPIDAPI_HOST") {
            self.upstream.api_host = host;
        }
        if let Some(url) = lookup("DATABASE_URL") {
            self.general.database_url = url;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.general.log_level = level;
        }
        Ok(())
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("adlib-proxy").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.upstream.base_url.is_empty() {
            anyhow::bail!("Upstream base URL cannot be empty");
        }

        url::Url::parse(&self.upstream.base_url)
            .with_context(|| format!("Invalid upstream base URL: {}", self.upstream.base_url))?;

        if self.upstream.api_host.is_empty() {
            anyhow::bail!("Upstream API host cannot be empty");
        }

        if self.upstream.timeout_seconds == 0 {
            anyhow::bail!("Upstream timeout must be > 0");
        }

        if self.cache.page_ads_ttl_hours == 0 {
            anyhow::bail!("Page ads TTL must be > 0");
        }

        Ok(())
    }

    #[must_use]
    pub fn persistence_enabled(&self) -> bool {
        !self.general.database_url.trim().is_empty()
    }

    #[must_use]
    pub fn page_ads_ttl(&self) -> chrono::Duration {
        let hours = i64::try_from(self.cache.page_ads_ttl_hours)
            .unwrap_or(i64::MAX)
            .min(i64::MAX / 3_600_000);
        chrono::Duration::hours(hours)
    }
}
