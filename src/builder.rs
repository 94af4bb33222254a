//! Static site generation: every listing page and every post written to disk.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use futures::stream::{self, StreamExt, TryStreamExt};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::cms::ContentSource;
use crate::config::Config;
use crate::content_loader::Templates;
use crate::error::{BlogError, Result};
use crate::listing::{collect_all, ListingState};
use crate::models::Post;
use crate::reading_time::estimate_reading_minutes;
use crate::render::{
    error_body, listing_body, post_body, render_with_layout, ListingFragment, LoadMore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildReport {
    pub listing_pages: usize,
    pub posts: usize,
}

fn fragment_path(page_number: usize) -> String {
    format!("/listing/page-{page_number}.json")
}

/// Slugs become directory names, so only plain ones are written.
fn is_plain_slug(uid: &str) -> bool {
    !uid.is_empty()
        && uid != "."
        && uid != ".."
        && uid
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

async fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, contents).await?;
    debug!(path = %path.display(), "Wrote");
    Ok(())
}

async fn copy_dir(from: &Path, to: &Path) -> Result<usize> {
    let mut copied = 0;
    let mut pending: Vec<(PathBuf, PathBuf)> = vec![(from.to_path_buf(), to.to_path_buf())];

    while let Some((src, dst)) = pending.pop() {
        fs::create_dir_all(&dst).await?;
        let mut entries = fs::read_dir(&src).await?;
        while let Some(entry) = entries.next_entry().await? {
            let target = dst.join(entry.file_name());
            if entry.file_type().await?.is_dir() {
                pending.push((entry.path(), target));
            } else {
                fs::copy(entry.path(), &target).await?;
                copied += 1;
            }
        }
    }
    Ok(copied)
}

pub async fn build_site(
    config: &Config,
    source: &dyn ContentSource,
    templates: &Templates,
    output: &Path,
) -> Result<BuildReport> {
    let start = Instant::now();
    let cms = &config.cms;
    let site_title = config.site.title.as_str();
    info!(output = %output.display(), doc_type = %cms.document_type, "Starting build");

    let pages = collect_all(source, &cms.document_type, cms.page_size).await?;
    let page_count = pages.len();

    // Index: the first page, with the control pointing at page 2.
    let first = pages.first().cloned().unwrap_or_default();
    let load_more = (page_count > 1).then(|| LoadMore {
        next: fragment_path(2),
        href: None,
    });
    let index_html = render_with_layout(
        templates,
        site_title,
        &listing_body(&first.items, load_more.as_ref(), None),
        false,
    );
    write_file(&output.join("index.html"), &index_html).await?;

    for (position, page) in pages.iter().enumerate().skip(1) {
        let number = position + 1;
        let next = (number < page_count).then(|| fragment_path(number + 1));
        let fragment = serde_json::to_string(&ListingFragment::new(&page.items, next))?;
        write_file(&output.join(format!("listing/page-{number}.json")), &fragment).await?;
    }

    let listing = pages
        .into_iter()
        .fold(ListingState::default(), ListingState::append_page);
    let mut seen = HashSet::new();
    let uids: Vec<String> = listing
        .posts()
        .iter()
        .map(|p| p.uid.clone())
        .filter(|uid| {
            if !is_plain_slug(uid) {
                warn!(uid = %uid, "Skipping post with an unusable slug");
                return false;
            }
            seen.insert(uid.clone())
        })
        .collect();

    // Paths use the requested slug, which was checked above; the fetched
    // document's uid is not.
    let posts: Vec<(String, Post)> = stream::iter(uids)
        .map(|uid| async move {
            let post = source.get_by_uid(&cms.document_type, &uid).await?;
            Ok::<_, BlogError>((uid, post))
        })
        .buffer_unordered(config.build.concurrency)
        .try_collect()
        .await?;

    for (uid, post) in &posts {
        let minutes = estimate_reading_minutes(&post.content, config.site.words_per_minute)?;
        let title = format!("{} | {}", post.title, site_title);
        let page = render_with_layout(templates, &title, &post_body(post, minutes), false);
        write_file(&output.join("post").join(uid).join("index.html"), &page).await?;
    }

    let not_found = render_with_layout(
        templates,
        site_title,
        &error_body("Página não encontrada."),
        false,
    );
    write_file(&output.join("404.html"), &not_found).await?;

    let static_dir = config.site.content_dir.join("static");
    if fs::metadata(&static_dir).await.is_ok() {
        let copied = copy_dir(&static_dir, &output.join("static")).await?;
        debug!(copied, "Copied static assets");
    }

    let report = BuildReport {
        listing_pages: page_count,
        posts: posts.len(),
    };
    info!(
        listing_pages = report.listing_pages,
        posts = report.posts,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Build complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms::testing::{summary, StaticSource};
    use crate::models::PostListPage;

    fn config_with_content(content_dir: &Path) -> Config {
        let mut config = Config::default();
        config.cms.endpoint = "https://blog.cdn.prismic.io/api/v2".to_string();
        config.site.content_dir = content_dir.to_path_buf();
        config
    }

    fn read(path: PathBuf) -> String {
        std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("{}: {e}", path.display()))
    }

    #[tokio::test]
    async fn writes_listing_posts_and_assets() {
        let content = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(content.path().join("static/img")).unwrap();
        std::fs::write(content.path().join("static/styles.css"), "body{}").unwrap();
        std::fs::write(content.path().join("static/img/logo.svg"), "<svg/>").unwrap();
        let out = tempfile::tempdir().unwrap();

        let source = StaticSource::with_pages(&[2, 2, 1]);
        let report = build_site(
            &config_with_content(content.path()),
            &source,
            &Templates::bundled(),
            out.path(),
        )
        .await
        .unwrap();

        assert_eq!(report, BuildReport { listing_pages: 3, posts: 5 });

        let index = read(out.path().join("index.html"));
        assert_eq!(index.matches("class=\"post-card\"").count(), 2);
        assert!(index.contains("data-next=\"/listing/page-2.json\""));

        let page2: serde_json::Value =
            serde_json::from_str(&read(out.path().join("listing/page-2.json"))).unwrap();
        assert_eq!(page2["next"], "/listing/page-3.json");
        let page3: serde_json::Value =
            serde_json::from_str(&read(out.path().join("listing/page-3.json"))).unwrap();
        assert!(page3["next"].is_null());
        assert!(page3["html"].as_str().unwrap().contains("/post/post-5"));

        for n in 1..=5 {
            let post = read(out.path().join(format!("post/post-{n}/index.html")));
            assert!(post.contains(&format!("Title of post-{n}")));
            assert!(post.contains("1 min"));
        }
        assert!(out.path().join("404.html").exists());
        assert_eq!(read(out.path().join("static/img/logo.svg")), "<svg/>");
    }

    #[tokio::test]
    async fn single_page_listing_has_no_load_more() {
        let content = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let source = StaticSource::with_pages(&[1]);

        build_site(
            &config_with_content(content.path()),
            &source,
            &Templates::bundled(),
            out.path(),
        )
        .await
        .unwrap();

        let index = read(out.path().join("index.html"));
        assert!(!index.contains("data-next"));
        assert!(!out.path().join("listing").exists());
    }

    #[tokio::test]
    async fn duplicate_and_unsafe_slugs_are_written_once_or_skipped() {
        let content = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let mut source = StaticSource::with_pages(&[1]);
        source.pages[0].items.push(summary("post-1"));
        source.pages.push(PostListPage {
            items: vec![summary("../escape")],
            next_cursor: None,
        });
        source.pages[0].next_cursor = Some("page-2".to_string());

        let report = build_site(
            &config_with_content(content.path()),
            &source,
            &Templates::bundled(),
            out.path(),
        )
        .await
        .unwrap();

        assert_eq!(report.posts, 1);
        assert!(!out.path().join("escape").exists());
    }

    #[tokio::test]
    async fn post_path_comes_from_the_listed_slug() {
        let content = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let mut source = StaticSource::with_pages(&[1]);
        if let Some(post) = source.posts.get_mut("post-1") {
            post.uid = String::new();
        }

        build_site(
            &config_with_content(content.path()),
            &source,
            &Templates::bundled(),
            out.path(),
        )
        .await
        .unwrap();

        assert!(out.path().join("post/post-1/index.html").exists());
        assert!(!out.path().join("post/index.html").exists());
    }

    #[tokio::test]
    async fn missing_post_fails_the_build() {
        let content = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let mut source = StaticSource::with_pages(&[2]);
        source.posts.remove("post-2");

        let err = build_site(
            &config_with_content(content.path()),
            &source,
            &Templates::bundled(),
            out.path(),
        )
        .await
        .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn plain_slugs() {
        assert!(is_plain_slug("como-utilizar-hooks"));
        assert!(!is_plain_slug(""));
        assert!(!is_plain_slug(".."));
        assert!(!is_plain_slug("a/b"));
    }
}
