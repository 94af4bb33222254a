//! Prismic response shapes and their mapping onto the blog's models.
//!
//! Every field is optional on the wire. A document missing a title or a
//! paragraph missing its text still renders; it just renders less.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

use crate::models::{
    BlockKind, ContentBlock, Post, PostListPage, PostSummary, RichTextBlock, Span, SpanKind,
};

#[derive(Debug, Deserialize)]
pub(super) struct ApiInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub refs: Vec<ApiRef>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ApiRef {
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(rename = "isMasterRef", default)]
    pub is_master_ref: bool,
}

impl ApiInfo {
    pub fn master_ref(&self) -> Option<&str> {
        self.refs
            .iter()
            .find(|r| r.is_master_ref)
            .map(|r| r.reference.as_str())
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct SearchResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub results: Vec<Document>,
    #[serde(default)]
    pub next_page: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct Document {
    #[serde(default)]
    uid: Option<String>,
    #[serde(default)]
    first_publication_date: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    data: DocumentData,
}

#[derive(Debug, Default, Deserialize)]
struct DocumentData {
    #[serde(default)]
    title: Option<Value>,
    #[serde(default)]
    subtitle: Option<Value>,
    #[serde(default)]
    author: Option<Value>,
    #[serde(default)]
    banner: Option<Banner>,
    #[serde(default, deserialize_with = "null_as_default")]
    content: Vec<RawContentBlock>,
}

#[derive(Debug, Deserialize)]
struct Banner {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawContentBlock {
    #[serde(default)]
    heading: Option<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    body: Vec<RawRichText>,
}

#[derive(Debug, Deserialize)]
struct RawRichText {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    spans: Vec<RawSpan>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    alt: Option<String>,
}

/// Spans missing an offset or a type are dropped when mapped.
#[derive(Debug, Deserialize)]
struct RawSpan {
    #[serde(default)]
    start: Option<usize>,
    #[serde(default)]
    end: Option<usize>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

impl SearchResponse {
    pub fn into_page(self) -> PostListPage {
        PostListPage {
            items: self.results.into_iter().map(Document::into_summary).collect(),
            next_cursor: self.next_page.filter(|c| !c.is_empty()),
        }
    }

    pub fn into_first_post(self) -> Option<Post> {
        self.results.into_iter().next().map(Document::into_post)
    }
}

impl Document {
    fn into_summary(self) -> PostSummary {
        PostSummary {
            publication_date: parse_publication_date(self.first_publication_date.as_deref()),
            uid: self.uid.unwrap_or_default(),
            title: plain_text(self.data.title.as_ref()).unwrap_or_default(),
            subtitle: plain_text(self.data.subtitle.as_ref()).unwrap_or_default(),
            author: plain_text(self.data.author.as_ref()).unwrap_or_default(),
        }
    }

    fn into_post(self) -> Post {
        let data = self.data;
        Post {
            publication_date: parse_publication_date(self.first_publication_date.as_deref()),
            uid: self.uid.unwrap_or_default(),
            title: plain_text(data.title.as_ref()).unwrap_or_default(),
            subtitle: plain_text(data.subtitle.as_ref()).unwrap_or_default(),
            banner_url: data.banner.and_then(|b| b.url),
            author: plain_text(data.author.as_ref()).unwrap_or_default(),
            content: data
                .content
                .into_iter()
                .map(|block| ContentBlock {
                    heading: plain_text(block.heading.as_ref()),
                    body: block.body.into_iter().map(RawRichText::into_block).collect(),
                })
                .collect(),
        }
    }
}

impl RawRichText {
    fn into_block(self) -> RichTextBlock {
        let kind = match self.kind.as_deref() {
            Some("paragraph") | None => BlockKind::Paragraph,
            Some("preformatted") => BlockKind::Preformatted,
            Some("list-item") => BlockKind::ListItem,
            Some("o-list-item") => BlockKind::OrderedListItem,
            Some("image") => BlockKind::Image,
            Some(other) => match other.strip_prefix("heading").and_then(|n| n.parse().ok()) {
                Some(level @ 1..=6) => BlockKind::Heading(level),
                _ => BlockKind::Other,
            },
        };

        RichTextBlock {
            kind,
            text: self.text,
            spans: self.spans.into_iter().filter_map(RawSpan::into_span).collect(),
            url: self.url,
            alt: self.alt,
        }
    }
}

impl RawSpan {
    fn into_span(self) -> Option<Span> {
        let (start, end) = (self.start?, self.end?);
        if end <= start {
            return None;
        }
        let (kind, data) = match self.kind.as_deref()? {
            "strong" => (SpanKind::Strong, None),
            "em" => (SpanKind::Em, None),
            "hyperlink" => (SpanKind::Hyperlink, self.data_field("url")),
            "label" => (SpanKind::Label, self.data_field("label")),
            _ => return None,
        };
        Some(Span {
            start,
            end,
            kind,
            data,
        })
    }

    fn data_field(&self, key: &str) -> Option<String> {
        self.data
            .as_ref()
            .and_then(|d| d.get(key))
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

/// Treats an explicit `null` like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts key-text fields (plain strings) and rich-text fields (arrays of
/// blocks, whose texts are joined with a space).
fn plain_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Array(blocks) => {
            let parts: Vec<&str> = blocks
                .iter()
                .filter_map(|b| b.get("text").and_then(Value::as_str))
                .collect();
            (!parts.is_empty()).then(|| parts.join(" "))
        }
        _ => None,
    }
}

/// Prismic emits `2021-03-25T19:25:28+0000`; RFC 3339 is accepted as well.
pub(super) fn parse_publication_date(raw: Option<&str>) -> Option<DateTime<FixedOffset>> {
    let raw = raw?;
    DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z")
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map_err(|e| warn!(value = raw, error = %e, "Unparsable publication date"))
        .ok()
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    use super::*;

    fn search(value: Value) -> SearchResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn maps_listing_documents_in_order() {
        let page = search(json!({
            "page": 1,
            "next_page": "https://blog.cdn.prismic.io/api/v2/documents/search?page=2",
            "results": [
                {
                    "uid": "como-utilizar-hooks",
                    "first_publication_date": "2021-03-15T19:25:28+0000",
                    "data": { "title": "Como utilizar Hooks", "subtitle": "Pensando em sincronização", "author": "Joseph Oliveira" }
                },
                {
                    "uid": "criando-um-app-cra-do-zero",
                    "first_publication_date": "2021-03-25T19:27:35+0000",
                    "data": { "title": "Criando um app CRA do zero", "subtitle": "Tudo sobre", "author": "Danilo Vieira" }
                }
            ]
        }))
        .into_page();

        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].uid, "como-utilizar-hooks");
        assert_eq!(page.items[1].author, "Danilo Vieira");
        assert_eq!(
            page.next_cursor.as_deref(),
            Some("https://blog.cdn.prismic.io/api/v2/documents/search?page=2")
        );
        let date = page.items[0].publication_date.unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2021, 3, 15));
        assert_eq!(date.hour(), 19);
    }

    #[test]
    fn null_next_page_ends_pagination() {
        let page = search(json!({ "results": [], "next_page": null })).into_page();
        assert!(page.items.is_empty());
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let page = search(json!({ "results": [ { "data": {} } ] })).into_page();
        let item = &page.items[0];
        assert_eq!(item.uid, "");
        assert_eq!(item.title, "");
        assert!(item.publication_date.is_none());
    }

    #[test]
    fn null_and_incomplete_content_still_maps() {
        let post = search(json!({
            "results": [{
                "uid": "a",
                "data": {
                    "title": null,
                    "content": [
                        { "heading": null, "body": null },
                        { "heading": "Parte 2", "body": [
                            { "type": "paragraph", "text": "Nullam dolor", "spans": null },
                            { "type": "paragraph", "text": "sapien vitae", "spans": [
                                { "start": 0, "end": 6 },
                                { "start": 0, "type": "em" },
                                { "start": 7, "end": 12, "type": "strong" }
                            ] }
                        ] }
                    ]
                }
            }]
        }))
        .into_first_post()
        .unwrap();

        assert_eq!(post.title, "");
        assert_eq!(post.content.len(), 2);
        assert!(post.content[0].heading.is_none());
        assert!(post.content[0].body.is_empty());
        let body = &post.content[1].body;
        assert!(body[0].spans.is_empty());
        assert_eq!(body[1].spans.len(), 1);
        assert_eq!(body[1].spans[0].kind, SpanKind::Strong);
    }

    #[test]
    fn null_data_and_content_fall_back_to_defaults() {
        let post = search(json!({ "results": [ { "uid": "a", "data": null } ] }))
            .into_first_post()
            .unwrap();
        assert_eq!(post.uid, "a");
        assert!(post.content.is_empty());

        let post = search(json!({ "results": [ { "uid": "b", "data": { "content": null } } ] }))
            .into_first_post()
            .unwrap();
        assert!(post.content.is_empty());

        let page = search(json!({ "results": null, "next_page": null })).into_page();
        assert!(page.items.is_empty());
    }

    #[test]
    fn maps_post_content_blocks_and_spans() {
        let post = search(json!({
            "results": [{
                "uid": "como-utilizar-hooks",
                "first_publication_date": "2021-03-15T19:25:28+0000",
                "data": {
                    "title": "Como utilizar Hooks",
                    "subtitle": "Pensando em sincronização",
                    "author": "Joseph Oliveira",
                    "banner": { "url": "https://images.prismic.io/banner.png" },
                    "content": [{
                        "heading": "Proin et varius",
                        "body": [
                            { "type": "paragraph", "text": "Nullam dolor sapien", "spans": [
                                { "start": 0, "end": 6, "type": "strong" },
                                { "start": 7, "end": 12, "type": "hyperlink", "data": { "link_type": "Web", "url": "https://example.com" } },
                                { "start": 0, "end": 3, "type": "mystery" }
                            ] },
                            { "type": "heading3", "text": "Sub" },
                            { "type": "o-list-item", "text": "one" },
                            { "type": "image", "url": "https://images.prismic.io/pic.png", "alt": "pic" },
                            { "type": "embed" }
                        ]
                    }]
                }
            }]
        }))
        .into_first_post()
        .unwrap();

        assert_eq!(post.subtitle, "Pensando em sincronização");
        assert_eq!(post.banner_url.as_deref(), Some("https://images.prismic.io/banner.png"));
        let block = &post.content[0];
        assert_eq!(block.heading.as_deref(), Some("Proin et varius"));
        let kinds: Vec<BlockKind> = block.body.iter().map(|b| b.kind).collect();
        assert_eq!(
            kinds,
            vec![
                BlockKind::Paragraph,
                BlockKind::Heading(3),
                BlockKind::OrderedListItem,
                BlockKind::Image,
                BlockKind::Other
            ]
        );
        let spans = &block.body[0].spans;
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[1].kind, SpanKind::Hyperlink);
        assert_eq!(spans[1].data.as_deref(), Some("https://example.com"));
        assert!(block.body[3].text.is_none());
    }

    #[test]
    fn rich_text_titles_are_flattened() {
        let page = search(json!({ "results": [{ "uid": "a", "data": {
            "title": [ { "type": "heading1", "text": "Rich", "spans": [] }, { "type": "paragraph", "text": "title" } ]
        } }] }))
        .into_page();
        assert_eq!(page.items[0].title, "Rich title");
    }

    #[test]
    fn master_ref_is_selected() {
        let info: ApiInfo = serde_json::from_value(json!({
            "refs": [
                { "id": "preview", "ref": "preview-ref", "isMasterRef": false },
                { "id": "master", "ref": "YF-master", "isMasterRef": true }
            ]
        }))
        .unwrap();
        assert_eq!(info.master_ref(), Some("YF-master"));
    }

    #[test]
    fn accepts_rfc3339_dates() {
        assert!(parse_publication_date(Some("2021-03-15T19:25:28Z")).is_some());
        assert!(parse_publication_date(Some("yesterday")).is_none());
        assert!(parse_publication_date(None).is_none());
    }
}
