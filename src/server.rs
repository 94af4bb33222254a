use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, get_service},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::{net::TcpListener, sync::broadcast};
use tower_http::services::ServeDir;
use tracing::{debug, error, info, warn};

use crate::content_loader::load_templates;
use crate::error::BlogError;
use crate::hot_reload::{start_content_watcher, ws_handler};
use crate::listing::ListingState;
use crate::models::{Post, PostListPage};
use crate::reading_time::estimate_reading_minutes;
use crate::render::{
    encode_component, error_body, listing_body, not_found_body, post_body, render_with_layout,
    ListingFragment, LoadMore,
};
use crate::rich_text::TrustedHtml;
use crate::state::{AppState, RouterState};

/// Upper bound for `/?pages=N`.
const MAX_LISTING_PAGES: usize = 20;

const LOAD_FAILED_MESSAGE: &str = "Não foi possível carregar mais posts. Tente novamente.";

#[derive(Debug, Deserialize)]
struct HomeQuery {
    pages: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct MoreQuery {
    cursor: String,
}

fn fragment_url(cursor: &str) -> String {
    format!("/api/posts?cursor={}", encode_component(cursor))
}

async fn render_page(
    state: &AppState,
    status: StatusCode,
    title: &str,
    body: &TrustedHtml,
) -> Response {
    let templates = state.templates.read().await;
    let page = render_with_layout(&templates, title, body, state.is_development);
    (status, Html(page)).into_response()
}

async fn render_error(state: &AppState, status: StatusCode, message: &str) -> Response {
    let title = state.config.site.title.clone();
    render_page(state, status, &title, &error_body(message)).await
}

/// The first listing page is fetched once and reused until the next reload.
async fn first_page(state: &AppState) -> Result<PostListPage, BlogError> {
    if let Some(page) = state.first_page.read().await.as_ref() {
        return Ok(page.clone());
    }

    let cms = &state.config.cms;
    let page = state
        .source
        .query_by_type(&cms.document_type, cms.page_size)
        .await?;
    *state.first_page.write().await = Some(page.clone());
    Ok(page)
}

async fn homepage(State(state): State<Arc<AppState>>, Query(query): Query<HomeQuery>) -> Response {
    let wanted = query.pages.unwrap_or(1).clamp(1, MAX_LISTING_PAGES);

    let first = match first_page(&state).await {
        Ok(page) => page,
        Err(e) => {
            error!(error = %e, "Failed to fetch the post listing");
            return render_error(
                &state,
                StatusCode::BAD_GATEWAY,
                "Não foi possível carregar os posts.",
            )
            .await;
        }
    };

    let mut listing = ListingState::from_first_page(first);
    let mut loaded = 1;
    let mut load_error = None;
    while loaded < wanted && listing.has_more() {
        match listing.load_more(state.source.as_ref()).await {
            Ok(_) => loaded += 1,
            Err(_) => {
                load_error = Some(LOAD_FAILED_MESSAGE);
                break;
            }
        }
    }

    let load_more = listing.cursor().map(|cursor| LoadMore {
        next: fragment_url(cursor),
        href: Some(format!("/?pages={}", loaded + 1)),
    });
    let body = listing_body(listing.posts(), load_more.as_ref(), load_error);
    let title = state.config.site.title.clone();
    render_page(&state, StatusCode::OK, &title, &body).await
}

async fn more_posts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MoreQuery>,
) -> Response {
    match state.source.fetch_page(&query.cursor).await {
        Ok(page) => {
            debug!(items = page.items.len(), "Serving listing fragment");
            let next = page.next_cursor.as_deref().map(fragment_url);
            Json(ListingFragment::new(&page.items, next)).into_response()
        }
        Err(e) => {
            warn!(error = %e, "Listing fragment failed");
            let status = match e {
                BlogError::InvalidCursor(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::BAD_GATEWAY,
            };
            (status, Json(json!({ "error": e.to_string() }))).into_response()
        }
    }
}

/// Cached posts render immediately; anything else is fetched while the
/// request waits, then cached.
async fn cached_post(state: &AppState, slug: &str) -> Result<Arc<Post>, BlogError> {
    if let Some(post) = state.posts.read().await.get(slug) {
        return Ok(post.clone());
    }

    let post = Arc::new(
        state
            .source
            .get_by_uid(&state.config.cms.document_type, slug)
            .await?,
    );
    state
        .posts
        .write()
        .await
        .insert(slug.to_string(), post.clone());
    Ok(post)
}

async fn render_post(Path(slug): Path<String>, State(state): State<Arc<AppState>>) -> Response {
    let post = match cached_post(&state, &slug).await {
        Ok(post) => post,
        Err(e) if e.is_not_found() => {
            debug!(%slug, "Post not found");
            let body = not_found_body(&*state.templates.read().await, &slug);
            let title = state.config.site.title.clone();
            return render_page(&state, StatusCode::NOT_FOUND, &title, &body).await;
        }
        Err(e) => {
            error!(%slug, error = %e, "Failed to fetch post");
            return render_error(
                &state,
                StatusCode::BAD_GATEWAY,
                "Não foi possível carregar este post.",
            )
            .await;
        }
    };

    let wpm = state.config.site.words_per_minute;
    let minutes = match estimate_reading_minutes(&post.content, wpm) {
        Ok(minutes) => minutes,
        Err(e) => {
            error!(error = %e, "Reading time estimation failed");
            return render_error(&state, StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()).await;
        }
    };

    let title = format!("{} | {}", post.title, state.config.site.title);
    render_page(&state, StatusCode::OK, &title, &post_body(&post, minutes)).await
}

pub fn router(state: Arc<AppState>, broadcaster: broadcast::Sender<()>) -> Router {
    let static_dir = get_service(ServeDir::new(state.config.site.content_dir.join("static")));
    let router_state = RouterState {
        app_state: state,
        broadcaster,
    };

    Router::new()
        .route("/", get(homepage))
        .route("/post/{slug}", get(render_post))
        .route("/api/posts", get(more_posts))
        .nest_service("/static", static_dir)
        .route("/ws", get(ws_handler))
        .with_state(router_state)
}

pub async fn serve(state: Arc<AppState>) -> anyhow::Result<()> {
    info!("RUST_ENV is set to development: {}", state.is_development);

    let (tx, _rx) = broadcast::channel(1);
    if state.is_development {
        info!("Hot reload enabled. Check logs for file change events.");
        start_content_watcher(tx.clone(), state.clone());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.server.port));
    let app = router(state, tx);

    info!(%addr, "listening");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Builds the state `serve` runs with, reading templates from disk.
pub async fn app_state(
    config: crate::config::Config,
    source: Arc<dyn crate::cms::ContentSource>,
) -> anyhow::Result<Arc<AppState>> {
    let templates = load_templates(&config.site.content_dir).await?;
    Ok(Arc::new(AppState::new(config, source, templates)))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use scraper::{Html as Document, Selector};
    use tower::ServiceExt;

    use super::*;
    use crate::cms::testing::StaticSource;
    use crate::cms::ContentSource;
    use crate::config::Config;
    use crate::content_loader::Templates;

    fn test_app(source: Arc<StaticSource>) -> (Router, Arc<AppState>) {
        let mut config = Config::default();
        config.cms.endpoint = "https://blog.cdn.prismic.io/api/v2".to_string();
        config.site.content_dir = "does-not-exist".into();
        let source: Arc<dyn ContentSource> = source;
        let state = Arc::new(AppState::new(config, source, Templates::bundled()));
        let (tx, _rx) = broadcast::channel(1);
        (router(state.clone(), tx), state)
    }

    async fn get(app: &Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn count(html: &str, css: &str) -> usize {
        let doc = Document::parse_document(html);
        doc.select(&Selector::parse(css).unwrap()).count()
    }

    fn attr_of(html: &str, css: &str, name: &str) -> Option<String> {
        let doc = Document::parse_document(html);
        let found = doc
            .select(&Selector::parse(css).unwrap())
            .next()
            .and_then(|e| e.value().attr(name).map(str::to_string));
        found
    }

    #[tokio::test]
    async fn homepage_lists_first_page_with_load_more() {
        let (app, _) = test_app(Arc::new(StaticSource::with_pages(&[2, 2, 1])));
        let (status, html) = get(&app, "/").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(count(&html, "a.post-card"), 2);
        assert_eq!(
            attr_of(&html, ".show-more", "data-next").as_deref(),
            Some("/api/posts?cursor=page-2")
        );
        assert_eq!(attr_of(&html, ".show-more", "href").as_deref(), Some("/?pages=2"));
    }

    #[tokio::test]
    async fn pages_query_accumulates_listing() {
        let (app, _) = test_app(Arc::new(StaticSource::with_pages(&[2, 2, 1])));

        let (_, html) = get(&app, "/?pages=2").await;
        assert_eq!(count(&html, "a.post-card"), 4);
        assert_eq!(attr_of(&html, ".show-more", "href").as_deref(), Some("/?pages=3"));

        let (_, html) = get(&app, "/?pages=9").await;
        assert_eq!(count(&html, "a.post-card"), 5);
        assert_eq!(count(&html, ".show-more"), 0);
    }

    #[tokio::test]
    async fn failed_page_keeps_listing_and_offers_retry() {
        let source = StaticSource::with_pages(&[2, 2, 1]).failing_on("page-3");
        let (app, _) = test_app(Arc::new(source));

        let (status, html) = get(&app, "/?pages=3").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(count(&html, "a.post-card"), 4);
        assert!(html.contains(LOAD_FAILED_MESSAGE));
        assert_eq!(
            attr_of(&html, ".show-more", "data-next").as_deref(),
            Some("/api/posts?cursor=page-3")
        );
    }

    #[tokio::test]
    async fn fragment_endpoint_returns_next_page() {
        let (app, _) = test_app(Arc::new(StaticSource::with_pages(&[2, 2, 1])));
        let (status, body) = get(&app, "/api/posts?cursor=page-2").await;

        assert_eq!(status, StatusCode::OK);
        let fragment: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(count(fragment["html"].as_str().unwrap(), "a.post-card"), 2);
        assert_eq!(fragment["next"], "/api/posts?cursor=page-3");

        let (_, body) = get(&app, "/api/posts?cursor=page-3").await;
        let fragment: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert!(fragment["next"].is_null());
    }

    #[tokio::test]
    async fn fragment_endpoint_reports_failures() {
        let source = StaticSource::with_pages(&[1, 1]).failing_on("page-2");
        let (app, _) = test_app(Arc::new(source));

        let (status, _) = get(&app, "/api/posts?cursor=page-2").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        let (status, _) = get(&app, "/api/posts?cursor=garbage").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn post_page_renders_once_and_is_cached() {
        let source = Arc::new(StaticSource::with_pages(&[2]));
        let (app, _) = test_app(source.clone());

        let (status, html) = get(&app, "/post/post-1").await;
        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("<title>Title of post-1 | spacetraveling</title>"));
        assert!(html.contains("1 min"));

        get(&app, "/post/post-1").await;
        assert_eq!(source.post_fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_post_is_a_404_page() {
        let (app, _) = test_app(Arc::new(StaticSource::with_pages(&[1])));
        let (status, html) = get(&app, "/post/missing").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(html.contains("<code>missing</code>"));
    }

    #[tokio::test]
    async fn clearing_caches_refetches_posts() {
        let source = Arc::new(StaticSource::with_pages(&[1]));
        let (app, state) = test_app(source.clone());

        get(&app, "/post/post-1").await;
        state.clear_caches().await;
        get(&app, "/post/post-1").await;
        assert_eq!(source.post_fetches.load(Ordering::SeqCst), 2);
    }
}
