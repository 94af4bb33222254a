//! Page composition: layout templates around listing and post bodies.

use chrono::{DateTime, FixedOffset, Locale};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;

use crate::content_loader::Templates;
use crate::models::{Post, PostSummary};
use crate::rich_text::{attr, render_rich_text, safe_href, TrustedHtml};

const HOT_RELOAD_SCRIPT: &str = r#"
<script>
    const socket = new WebSocket("ws://" + window.location.host + "/ws");
    socket.onmessage = (event) => {
        if (event.data === "reload") {
            window.location.reload();
        }
    };
</script>
"#;

const LOAD_MORE_LABEL: &str = "Carregar mais posts";

/// Characters left alone in a path segment or query value.
const URL_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, URL_COMPONENT).to_string()
}

pub fn post_path(uid: &str) -> String {
    format!("/post/{}", encode_component(uid))
}

/// `15 mar 2021`
pub fn format_date(date: &DateTime<FixedOffset>) -> String {
    date.format_localized("%-d %b %Y", Locale::pt_BR).to_string()
}

pub fn render_with_layout(
    templates: &Templates,
    title: &str,
    content: &TrustedHtml,
    is_development: bool,
) -> String {
    let mut page = templates
        .layout
        .replace("{{ title }}", TrustedHtml::text(title).as_str())
        .replace("{{ header }}", &templates.header)
        .replace("{{ content }}", content.as_str());

    if is_development {
        page = page.replace("</body>", &format!("{}</body>", HOT_RELOAD_SCRIPT));
    }

    page
}

fn info_items(date: Option<&DateTime<FixedOffset>>, author: &str) -> String {
    let mut info = String::new();
    if let Some(date) = date {
        info.push_str(&format!(
            "<span class=\"info\"><time datetime=\"{}\">{}</time></span>",
            attr(&date.to_rfc3339()),
            TrustedHtml::text(&format_date(date))
        ));
    }
    info.push_str(&format!(
        "<span class=\"info\">{}</span>",
        TrustedHtml::text(author)
    ));
    info
}

/// One card per summary, in the given order.
pub fn post_cards(posts: &[PostSummary]) -> TrustedHtml {
    let mut html = TrustedHtml::default();
    for post in posts {
        html.push_markup(&format!(
            "<a class=\"post-card\" href=\"{}\"><h1>{}</h1><h2>{}</h2><div class=\"info-container\">{}</div></a>",
            attr(&post_path(&post.uid)),
            TrustedHtml::text(&post.title),
            TrustedHtml::text(&post.subtitle),
            info_items(post.publication_date.as_ref(), &post.author),
        ));
    }
    html
}

/// Where the "load more" control points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadMore {
    /// Fragment URL fetched by the browser script.
    pub next: String,
    /// Full-page fallback for browsers without scripts.
    pub href: Option<String>,
}

/// Listing page body. `load_more` is `None` once the listing is complete,
/// which removes the control.
pub fn listing_body(
    posts: &[PostSummary],
    load_more: Option<&LoadMore>,
    error: Option<&str>,
) -> TrustedHtml {
    let mut html = TrustedHtml::default();
    html.push_markup("<main class=\"container\"><div class=\"posts\"><div class=\"post-list\" data-post-list>");
    html.push(&post_cards(posts));
    html.push_markup("</div><p class=\"load-status\" data-load-status>");
    if let Some(message) = error {
        html.push(&TrustedHtml::text(message));
    }
    html.push_markup("</p>");

    if let Some(load_more) = load_more {
        let control = match &load_more.href {
            Some(href) => format!(
                "<a class=\"show-more\" href=\"{}\" data-next=\"{}\">{LOAD_MORE_LABEL}</a>",
                attr(href),
                attr(&load_more.next)
            ),
            None => format!(
                "<button type=\"button\" class=\"show-more\" data-next=\"{}\">{LOAD_MORE_LABEL}</button>",
                attr(&load_more.next)
            ),
        };
        html.push_markup(&control);
    }

    html.push_markup("</div></main>");
    html
}

pub fn post_body(post: &Post, reading_minutes: u32) -> TrustedHtml {
    let mut html = TrustedHtml::default();
    if let Some(banner) = post.banner_url.as_deref().and_then(safe_href) {
        html.push_markup(&format!(
            "<img class=\"banner\" src=\"{}\" alt=\"\" />",
            attr(banner)
        ));
    }

    html.push_markup(&format!(
        "<main class=\"container\"><article class=\"post\"><h1>{}</h1>",
        TrustedHtml::text(&post.title)
    ));
    if !post.subtitle.is_empty() {
        html.push_markup(&format!(
            "<p class=\"subtitle\">{}</p>",
            TrustedHtml::text(&post.subtitle)
        ));
    }
    html.push_markup(&format!(
        "<div class=\"info-container\">{}<span class=\"info reading-time\">{} min</span></div><div class=\"post-content\">",
        info_items(post.publication_date.as_ref(), &post.author),
        reading_minutes
    ));

    for block in &post.content {
        if let Some(heading) = &block.heading {
            html.push_markup(&format!("<h2>{}</h2>", TrustedHtml::text(heading)));
        }
        html.push_markup("<div class=\"paragraphs\">");
        html.push(&render_rich_text(&block.body));
        html.push_markup("</div>");
    }

    html.push_markup("</div></article></main>");
    html
}

pub fn not_found_body(templates: &Templates, slug: &str) -> TrustedHtml {
    TrustedHtml::from_template(
        templates
            .not_found
            .replace("{{slug}}", TrustedHtml::text(slug).as_str()),
    )
}

pub fn error_body(message: &str) -> TrustedHtml {
    let mut html = TrustedHtml::default();
    html.push_markup("<main class=\"container\"><h1>Algo deu errado</h1><p>");
    html.push(&TrustedHtml::text(message));
    html.push_markup("</p></main>");
    html
}

/// One page of the listing as consumed by `load-more.js`.
#[derive(Debug, Serialize)]
pub struct ListingFragment {
    pub html: String,
    pub next: Option<String>,
}

impl ListingFragment {
    pub fn new(posts: &[PostSummary], next: Option<String>) -> Self {
        Self {
            html: post_cards(posts).into_string(),
            next,
        }
    }
}
