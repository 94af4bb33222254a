use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use super::documents::{ApiInfo, SearchResponse};
use super::ContentSource;
use crate::config::CmsConfig;
use crate::error::{BlogError, Result};
use crate::models::{Post, PostListPage};

/// Prismic REST API v2 client.
pub struct PrismicClient {
    http: reqwest::Client,
    endpoint: Url,
    access_token: Option<String>,
}

impl PrismicClient {
    pub fn new(config: &CmsConfig) -> Result<Self> {
        let endpoint = Url::parse(config.endpoint.trim_end_matches('/')).map_err(|e| {
            BlogError::config(format!("invalid CMS endpoint {}: {e}", config.endpoint))
        })?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BlogError::config(format!("failed to build HTTP client: {e}")))?;

        info!(endpoint = %endpoint, "Prismic client ready");
        Ok(Self {
            http,
            endpoint,
            access_token: config.access_token.clone(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!(%url, "CMS request");
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| BlogError::fetch_with_source(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BlogError::fetch(url.as_str(), format!("status {status}")));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| BlogError::fetch_with_source(url.as_str(), e))
    }

    fn with_token(&self, mut url: Url) -> Url {
        if let Some(token) = &self.access_token {
            if !url.query_pairs().any(|(k, _)| k == "access_token") {
                url.query_pairs_mut().append_pair("access_token", token);
            }
        }
        url
    }

    async fn master_ref(&self) -> Result<String> {
        let info: ApiInfo = self.get_json(self.with_token(self.endpoint.clone())).await?;
        info.master_ref()
            .map(str::to_string)
            .ok_or_else(|| BlogError::fetch(self.endpoint.as_str(), "API exposes no master ref"))
    }

    async fn search(&self, predicate: &str, page_size: Option<u32>) -> Result<SearchResponse> {
        let reference = self.master_ref().await?;
        let base = self.endpoint.as_str().trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}/documents/search"))
            .map_err(|e| BlogError::config(format!("invalid CMS endpoint: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("ref", &reference);
            query.append_pair("q", &format!("[{predicate}]"));
            if let Some(size) = page_size {
                query.append_pair("pageSize", &size.to_string());
            }
        }
        self.get_json(self.with_token(url)).await
    }

    /// Cursors come back from browsers, so only URLs on the CMS origin are followed.
    fn cursor_url(&self, cursor: &str) -> Result<Url> {
        let url = Url::parse(cursor).map_err(|_| BlogError::InvalidCursor(cursor.to_string()))?;
        let same_origin = url.scheme() == self.endpoint.scheme()
            && url.host_str() == self.endpoint.host_str()
            && url.port_or_known_default() == self.endpoint.port_or_known_default();
        if !same_origin {
            return Err(BlogError::InvalidCursor(cursor.to_string()));
        }
        Ok(self.with_token(url))
    }
}

fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[async_trait]
impl ContentSource for PrismicClient {
    async fn query_by_type(&self, doc_type: &str, page_size: u32) -> Result<PostListPage> {
        let predicate = format!("[at(document.type,\"{}\")]", quote(doc_type));
        let response = self.search(&predicate, Some(page_size)).await?;
        Ok(response.into_page())
    }

    async fn fetch_page(&self, cursor: &str) -> Result<PostListPage> {
        let url = self.cursor_url(cursor)?;
        let response: SearchResponse = self.get_json(url).await?;
        Ok(response.into_page())
    }

    async fn get_by_uid(&self, doc_type: &str, uid: &str) -> Result<Post> {
        let predicate = format!("[at(my.{}.uid,\"{}\")]", quote(doc_type), quote(uid));
        self.search(&predicate, Some(1))
            .await?
            .into_first_post()
            .ok_or_else(|| BlogError::not_found(doc_type, uid))
    }
}
