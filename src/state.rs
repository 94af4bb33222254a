use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};

use crate::cms::ContentSource;
use crate::config::Config;
use crate::content_loader::Templates;
use crate::models::{Post, PostListPage};

pub type RefreshBroadcaster = broadcast::Sender<()>;

pub struct AppState {
    pub config: Config,
    pub source: Arc<dyn ContentSource>,
    pub templates: RwLock<Templates>,
    /// First listing page, fetched on the first home page request.
    pub first_page: RwLock<Option<PostListPage>>,
    /// Posts rendered so far, keyed by uid.
    pub posts: RwLock<HashMap<String, Arc<Post>>>,
    pub is_development: bool,
}

impl AppState {
    pub fn new(config: Config, source: Arc<dyn ContentSource>, templates: Templates) -> Self {
        let is_development = config.server.development;
        Self {
            config,
            source,
            templates: RwLock::new(templates),
            first_page: RwLock::new(None),
            posts: RwLock::new(HashMap::new()),
            is_development,
        }
    }

    pub async fn clear_caches(&self) {
        *self.first_page.write().await = None;
        self.posts.write().await.clear();
    }
}

#[derive(Clone)]
pub struct RouterState {
    pub app_state: Arc<AppState>,
    pub broadcaster: RefreshBroadcaster,
}

impl axum::extract::FromRef<RouterState> for Arc<AppState> {
    fn from_ref(state: &RouterState) -> Self {
        state.app_state.clone()
    }
}

impl axum::extract::FromRef<RouterState> for RefreshBroadcaster {
    fn from_ref(state: &RouterState) -> Self {
        state.broadcaster.clone()
    }
}
