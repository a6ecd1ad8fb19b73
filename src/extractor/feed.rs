//! RSS and Atom feed extraction

use super::{ContentKind, ExtractionError, ExtractionResult, Extractor};
use crate::DownloadResult;
use async_trait::async_trait;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use scraper::Html;

/// One item of an RSS channel or entry of an Atom feed
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct FeedItem {
    pub title: String,
    pub link: String,
    pub published: String,
    pub summary: String,
}

impl FeedItem {
    fn render(&self) -> String {
        [&self.title, &self.link, &self.published, &self.summary]
            .into_iter()
            .map(|field| field.trim())
            .filter(|field| !field.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct Feed {
    pub title: Option<String>,
    pub items: Vec<FeedItem>,
}

/// Renders feed items as plain-text blocks
#[derive(Debug, Default, Clone)]
pub struct FeedExtractor;

impl FeedExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Extractor for FeedExtractor {
    fn can_handle(&self, kind: ContentKind) -> bool {
        kind == ContentKind::Feed
    }

    async fn extract(&self, download: &DownloadResult) -> Result<ExtractionResult, ExtractionError> {
        let xml = String::from_utf8_lossy(&download.content);
        let feed = parse_feed(&xml)?;

        let text = feed
            .items
            .iter()
            .map(FeedItem::render)
            .filter(|block| !block.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut result = ExtractionResult::new(text)
            .with("format", ContentKind::Feed.as_str())
            .with("items", feed.items.len());
        if let Some(title) = feed.title {
            result.insert("title", title);
        }
        Ok(result)
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Field {
    Title,
    Link,
    Published,
    Summary,
}

impl Field {
    fn from_tag(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Self::Title),
            b"link" | b"guid" => Some(Self::Link),
            b"pubDate" | b"published" | b"updated" | b"date" => Some(Self::Published),
            b"description" | b"summary" | b"content" | b"encoded" => Some(Self::Summary),
            _ => None,
        }
    }
}

/// Parses RSS 2.0, RSS 1.0 (RDF), or Atom
pub(crate) fn parse_feed(xml: &str) -> Result<Feed, ExtractionError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut feed = Feed::default();
    let mut saw_root = false;
    let mut item: Option<FeedItem> = None;
    let mut field: Option<Field> = None;
    let mut buffer = String::new();
    let mut depth = 0usize;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| ExtractionError::malformed(ContentKind::Feed, e))?;

        match event {
            Event::Start(e) => {
                depth += 1;
                let name = e.local_name();
                match name.as_ref() {
                    b"rss" | b"feed" | b"RDF" if depth == 1 => saw_root = true,
                    b"item" | b"entry" => item = Some(FeedItem::default()),
                    tag => {
                        field = Field::from_tag(tag);
                        buffer.clear();
                        if let (Some(Field::Link), Some(current)) = (field, item.as_mut()) {
                            take_atom_link(&e, current);
                        }
                    }
                }
            }
            Event::Empty(e) => {
                if e.local_name().as_ref() == b"link" {
                    if let Some(current) = item.as_mut() {
                        take_atom_link(&e, current);
                    }
                }
            }
            Event::Text(e) if field.is_some() => {
                let text = e
                    .unescape()
                    .map(|text| text.into_owned())
                    .unwrap_or_else(|_| String::from_utf8_lossy(&e).into_owned());
                buffer.push_str(&text);
            }
            Event::CData(e) if field.is_some() => {
                buffer.push_str(&String::from_utf8_lossy(&e));
            }
            Event::End(e) => {
                depth = depth.saturating_sub(1);
                match e.local_name().as_ref() {
                    b"item" | b"entry" => {
                        if let Some(done) = item.take() {
                            feed.items.push(done);
                        }
                    }
                    tag if field.is_some() && Field::from_tag(tag) == field => {
                        let value = std::mem::take(&mut buffer);
                        store(&mut feed, item.as_mut(), field, value);
                        field = None;
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(ExtractionError::malformed(
            ContentKind::Feed,
            "no <rss>, <feed>, or <rdf:RDF> root element",
        ));
    }

    Ok(feed)
}

fn store(feed: &mut Feed, item: Option<&mut FeedItem>, field: Option<Field>, value: String) {
    let value = match field {
        Some(Field::Summary) => strip_markup(&value),
        _ => value.trim().to_string(),
    };
    if value.is_empty() {
        return;
    }

    match (item, field) {
        (Some(item), Some(Field::Title)) => item.title = value,
        (Some(item), Some(Field::Link)) if item.link.is_empty() => item.link = value,
        (Some(item), Some(Field::Published)) if item.published.is_empty() => {
            item.published = value
        }
        (Some(item), Some(Field::Summary)) if item.summary.is_empty() => item.summary = value,
        (None, Some(Field::Title)) if feed.title.is_none() => feed.title = Some(value),
        _ => {}
    }
}

/// Atom links carry the URL in `href`; only alternate links count
fn take_atom_link(element: &BytesStart<'_>, item: &mut FeedItem) {
    if !item.link.is_empty() {
        return;
    }

    let attr = |name: &str| {
        element
            .try_get_attribute(name)
            .ok()
            .flatten()
            .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
    };

    let alternate = attr("rel").map_or(true, |rel| rel == "alternate");
    if let (true, Some(href)) = (alternate, attr("href")) {
        item.link = href;
    }
}

/// Summaries are often escaped HTML; keep only their text
fn strip_markup(value: &str) -> String {
    if !value.contains('<') {
        return value.split_whitespace().collect::<Vec<_>>().join(" ");
    }
    let fragment = Html::parse_fragment(value);
    fragment
        .root_element()
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
