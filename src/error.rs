//! Error types shared by the CMS client, renderers and entry points.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BlogError>;

#[derive(Error, Debug)]
pub enum BlogError {
    /// A CMS request failed or answered with a non-success status.
    #[error("fetch failed for {url}: {message}")]
    Fetch {
        url: String,
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// A uid lookup returned no document.
    #[error("document not found: {doc_type}/{uid}")]
    NotFound { doc_type: String, uid: String },

    /// A continuation cursor that does not point at the configured CMS.
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    /// A programming or configuration contract was violated.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BlogError {
    pub fn fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn fetch_with_source(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Fetch {
            url: url.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    pub fn not_found(doc_type: impl Into<String>, uid: impl Into<String>) -> Self {
        Self::NotFound {
            doc_type: doc_type.into(),
            uid: uid.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
