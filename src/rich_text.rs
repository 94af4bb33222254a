//! Rich text to HTML, and the [`TrustedHtml`] type that carries the result.

use std::fmt;

use htmlescape::encode_minimal;

use crate::models::{BlockKind, RichTextBlock, Span, SpanKind};

/// Markup that is safe to inject into a page verbatim.
///
/// Only produced by escaping user text, by the renderers in this crate, or
/// from template files owned by the site. Handlers never build it from CMS
/// strings directly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustedHtml(String);

impl TrustedHtml {
    /// Escapes `text` for use as element content.
    pub fn text(text: &str) -> Self {
        Self(encode_minimal(text))
    }

    /// Markup from a template file on disk or compiled into the binary.
    pub(crate) fn from_template(markup: impl Into<String>) -> Self {
        Self(markup.into())
    }

    pub(crate) fn push(&mut self, other: &TrustedHtml) {
        self.0.push_str(&other.0);
    }

    pub(crate) fn push_markup(&mut self, markup: &str) {
        self.0.push_str(markup);
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for TrustedHtml {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Escapes `value` for use inside a double-quoted attribute.
pub fn attr(value: &str) -> String {
    encode_minimal(value)
}

/// Only web, mail and site-relative links survive; anything else (e.g.
/// `javascript:`) is dropped.
pub fn safe_href(url: &str) -> Option<&str> {
    let url = url.trim();
    let lower = url.to_ascii_lowercase();
    let allowed = ["http://", "https://", "mailto:", "/", "#"]
        .iter()
        .any(|prefix| lower.starts_with(prefix));
    (allowed && !lower.starts_with("//")).then_some(url)
}

/// Renders a sequence of rich-text blocks. Consecutive list items are
/// grouped into a single `<ul>`/`<ol>`.
pub fn render_rich_text(blocks: &[RichTextBlock]) -> TrustedHtml {
    let mut out = String::new();
    let mut open_list: Option<&'static str> = None;

    for block in blocks {
        let list_tag = match block.kind {
            BlockKind::ListItem => Some("ul"),
            BlockKind::OrderedListItem => Some("ol"),
            _ => None,
        };
        if open_list != list_tag {
            if let Some(tag) = open_list {
                out.push_str(&format!("</{tag}>"));
            }
            if let Some(tag) = list_tag {
                out.push_str(&format!("<{tag}>"));
            }
            open_list = list_tag;
        }

        match block.kind {
            BlockKind::Paragraph | BlockKind::Other => {
                if let Some(text) = &block.text {
                    wrap(&mut out, "p", &render_inline(text, &block.spans));
                }
            }
            BlockKind::Heading(level) => {
                let text = block.text.as_deref().unwrap_or_default();
                wrap(&mut out, &format!("h{level}"), &render_inline(text, &block.spans));
            }
            BlockKind::Preformatted => {
                let text = block.text.as_deref().unwrap_or_default();
                wrap(&mut out, "pre", &render_inline(text, &block.spans));
            }
            BlockKind::ListItem | BlockKind::OrderedListItem => {
                let text = block.text.as_deref().unwrap_or_default();
                wrap(&mut out, "li", &render_inline(text, &block.spans));
            }
            BlockKind::Image => {
                if let Some(src) = block.url.as_deref().and_then(safe_href) {
                    out.push_str(&format!(
                        "<p class=\"block-img\"><img src=\"{}\" alt=\"{}\" /></p>",
                        attr(src),
                        attr(block.alt.as_deref().unwrap_or_default())
                    ));
                }
            }
        }
    }

    if let Some(tag) = open_list {
        out.push_str(&format!("</{tag}>"));
    }
    TrustedHtml(out)
}

fn wrap(out: &mut String, tag: &str, inner: &str) {
    out.push_str(&format!("<{tag}>{inner}</{tag}>"));
}

fn open_tag(span: &Span) -> String {
    match (span.kind, span.data.as_deref()) {
        (SpanKind::Strong, _) => "<strong>".to_string(),
        (SpanKind::Em, _) => "<em>".to_string(),
        (SpanKind::Hyperlink, Some(url)) => match safe_href(url) {
            Some(href) => format!(
                "<a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">",
                attr(href)
            ),
            None => "<span>".to_string(),
        },
        (SpanKind::Hyperlink, None) => "<span>".to_string(),
        (SpanKind::Label, Some(label)) => format!("<span class=\"{}\">", attr(label)),
        (SpanKind::Label, None) => "<span>".to_string(),
    }
}

fn close_tag(span: &Span) -> &'static str {
    match (span.kind, span.data.as_deref()) {
        (SpanKind::Strong, _) => "</strong>",
        (SpanKind::Em, _) => "</em>",
        (SpanKind::Hyperlink, Some(url)) if safe_href(url).is_some() => "</a>",
        _ => "</span>",
    }
}

/// Closes every open span that ends at `pos`. Spans opened after the first
/// ending one are closed too and reopened, which keeps overlapping spans
/// well nested.
fn close_ended<'a>(out: &mut String, stack: &mut Vec<&'a Span>, pos: usize) {
    let Some(first) = stack.iter().position(|s| s.end <= pos) else {
        return;
    };
    let above: Vec<&Span> = stack.drain(first..).collect();
    for span in above.iter().rev() {
        out.push_str(close_tag(span));
    }
    for span in above {
        if span.end > pos {
            out.push_str(&open_tag(span));
            stack.push(span);
        }
    }
}

/// Span offsets count UTF-16 code units, as the CMS produces them.
fn render_inline(text: &str, spans: &[Span]) -> String {
    let mut ordered: Vec<&Span> = spans.iter().collect();
    ordered.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));
    let mut pending = ordered.into_iter().peekable();

    let mut out = String::with_capacity(text.len());
    let mut stack: Vec<&Span> = Vec::new();
    let mut pos = 0;
    let mut buf = [0u8; 4];

    for ch in text.chars() {
        close_ended(&mut out, &mut stack, pos);
        while let Some(span) = pending.next_if(|s| s.start <= pos) {
            if span.end > pos {
                out.push_str(&open_tag(span));
                stack.push(span);
            }
        }

        match ch {
            '\n' => out.push_str("<br />"),
            _ => out.push_str(&encode_minimal(ch.encode_utf8(&mut buf))),
        }
        pos += ch.len_utf16();
    }

    for span in stack.iter().rev() {
        out.push_str(close_tag(span));
    }
    out
}
