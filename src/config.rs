//! Site configuration: an optional TOML file overlaid with environment variables.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{BlogError, Result};
use crate::reading_time::DEFAULT_WORDS_PER_MINUTE;

const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cms: CmsConfig,
    pub site: SiteConfig,
    pub server: ServerConfig,
    pub build: BuildConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CmsConfig {
    /// Prismic API entry point, e.g. `https://my-repo.cdn.prismic.io/api/v2`.
    pub endpoint: String,
    pub access_token: Option<String>,
    pub document_type: String,
    pub page_size: u32,
    pub timeout_secs: u64,
}

impl Default for CmsConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            access_token: None,
            document_type: "posts".to_string(),
            page_size: 10,
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub title: String,
    /// Directory holding layout templates and `static/` assets.
    pub content_dir: PathBuf,
    pub words_per_minute: u32,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "spacetraveling".to_string(),
            content_dir: PathBuf::from("content"),
            words_per_minute: DEFAULT_WORDS_PER_MINUTE,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Enables the file watcher and the hot-reload script.
    pub development: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            development: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub output_dir: PathBuf,
    /// Maximum number of post fetches in flight during a build.
    pub concurrency: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("public"),
            concurrency: 4,
        }
    }
}

impl Config {
    /// Loads `path` if it exists, applies environment overrides and validates.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            info!(path = %path.display(), "Loading configuration");
            let raw = std::fs::read_to_string(path)?;
            Self::from_toml_str(&raw)?
        } else {
            debug!(path = %path.display(), "No configuration file, using defaults");
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Overlays `PRISMIC_API_ENDPOINT`, `PRISMIC_ACCESS_TOKEN`, `PORT` and `RUST_ENV`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(endpoint) = lookup("PRISMIC_API_ENDPOINT") {
            self.cms.endpoint = endpoint;
        }
        if let Some(token) = lookup("PRISMIC_ACCESS_TOKEN").filter(|t| !t.is_empty()) {
            self.cms.access_token = Some(token);
        }
        if let Some(port) = lookup("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(env) = lookup("RUST_ENV") {
            self.server.development = env == "development";
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.cms.endpoint.trim().is_empty() {
            return Err(BlogError::config(
                "cms.endpoint is required (or set PRISMIC_API_ENDPOINT)",
            ));
        }
        if reqwest::Url::parse(&self.cms.endpoint).is_err() {
            return Err(BlogError::config(format!(
                "cms.endpoint is not a valid URL: {}",
                self.cms.endpoint
            )));
        }
        if self.cms.page_size == 0 || self.cms.page_size > MAX_PAGE_SIZE {
            return Err(BlogError::config(format!(
                "cms.page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        if self.site.words_per_minute == 0 {
            return Err(BlogError::InvalidConfiguration(
                "site.words_per_minute must be positive".to_string(),
            ));
        }
        if self.build.concurrency == 0 {
            return Err(BlogError::config("build.concurrency must be positive"));
        }
        Ok(())
    }
}
