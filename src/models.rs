use chrono::{DateTime, FixedOffset};

/// Listing entry for one post, as shown on the home page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostSummary {
    pub uid: String,
    pub publication_date: Option<DateTime<FixedOffset>>,
    pub title: String,
    pub subtitle: String,
    pub author: String,
}

/// One CMS query's worth of summaries. `next_cursor` is `None` on the last page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostListPage {
    pub items: Vec<PostSummary>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Paragraph,
    Heading(u8),
    Preformatted,
    ListItem,
    OrderedListItem,
    Image,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    Strong,
    Em,
    Hyperlink,
    Label,
}

/// Inline formatting over `[start, end)`, measured in UTF-16 code units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub kind: SpanKind,
    /// Link target for hyperlinks, class name for labels.
    pub data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RichTextBlock {
    pub kind: BlockKind,
    /// Raw source text; absent on malformed or non-text blocks.
    pub text: Option<String>,
    pub spans: Vec<Span>,
    /// Image source for image blocks.
    pub url: Option<String>,
    pub alt: Option<String>,
}

impl RichTextBlock {
    pub fn paragraph(text: impl Into<String>) -> Self {
        Self {
            kind: BlockKind::Paragraph,
            text: Some(text.into()),
            spans: Vec::new(),
            url: None,
            alt: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentBlock {
    pub heading: Option<String>,
    pub body: Vec<RichTextBlock>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub uid: String,
    pub publication_date: Option<DateTime<FixedOffset>>,
    pub title: String,
    pub subtitle: String,
    pub banner_url: Option<String>,
    pub author: String,
    pub content: Vec<ContentBlock>,
}
