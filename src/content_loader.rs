use std::io::ErrorKind;
use std::path::Path;

use tokio::fs;
use tracing::{debug, error, info};

use crate::state::AppState;

const LAYOUT_FILE: &str = "layout.html";
const HEADER_FILE: &str = "header.html";
const NOT_FOUND_FILE: &str = "not_found.html";

/// Site-owned markup wrapped around every rendered page.
#[derive(Debug, Clone)]
pub struct Templates {
    /// Supports `{{ title }}`, `{{ header }}` and `{{ content }}`.
    pub layout: String,
    pub header: String,
    /// Supports a `{{slug}}` placeholder.
    pub not_found: String,
}

impl Templates {
    pub fn bundled() -> Self {
        Self {
            layout: include_str!("../content/layout.html").to_string(),
            header: include_str!("../content/header.html").to_string(),
            not_found: include_str!("../content/not_found.html").to_string(),
        }
    }
}

async fn read_or_bundled(dir: &Path, name: &str, bundled: String) -> Result<String, std::io::Error> {
    match fs::read_to_string(dir.join(name)).await {
        Ok(contents) => Ok(contents),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(file = name, "Template missing, using bundled copy");
            Ok(bundled)
        }
        Err(e) => Err(e),
    }
}

pub async fn load_templates(content_dir: &Path) -> Result<Templates, std::io::Error> {
    let bundled = Templates::bundled();
    Ok(Templates {
        layout: read_or_bundled(content_dir, LAYOUT_FILE, bundled.layout).await?,
        header: read_or_bundled(content_dir, HEADER_FILE, bundled.header).await?,
        not_found: read_or_bundled(content_dir, NOT_FOUND_FILE, bundled.not_found).await?,
    })
}

/// Re-reads templates and drops every cached CMS response.
pub async fn reload_content(app_state: &AppState) {
    info!("Reloading application content...");
    match load_templates(&app_state.config.site.content_dir).await {
        Ok(templates) => {
            *app_state.templates.write().await = templates;
            app_state.clear_caches().await;
            info!("Content successfully reloaded.");
        }
        Err(e) => {
            error!("Failed to reload content: {}", e);
        }
    }
}
