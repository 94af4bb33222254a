//! Boundary to the headless CMS.
//!
//! Pages and handlers only see [`ContentSource`]; the Prismic HTTP client is
//! built once in `main` and passed down, so everything above this module can
//! be exercised with an in-memory source.

mod documents;
mod prismic;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Post, PostListPage};

pub use prismic::PrismicClient;

#[async_trait]
pub trait ContentSource: Send + Sync {
    /// First page of documents of `doc_type`.
    async fn query_by_type(&self, doc_type: &str, page_size: u32) -> Result<PostListPage>;

    /// A later page, addressed by the opaque cursor of the previous one.
    async fn fetch_page(&self, cursor: &str) -> Result<PostListPage>;

    /// A single document by its slug.
    async fn get_by_uid(&self, doc_type: &str, uid: &str) -> Result<Post>;
}
