//! HTML main-content extraction
//!
//! This module strips page furniture (navigation, headers, footers, scripts,
//! forms) and keeps the text of the element that most looks like the main
//! content:
//! - an `<article>`, `<main>`, or `[role=main]` element, if present
//! - otherwise the `<div>`/`<section>` whose direct paragraphs hold the most text
//! - otherwise the whole `<body>`

use super::{ContentKind, ExtractionError, ExtractionResult, Extractor};
use crate::DownloadResult;
use async_trait::async_trait;
use scraper::{ElementRef, Html, Node, Selector};

/// Elements whose content is never part of the document text
const BOILERPLATE: &[&str] = &[
    "nav", "header", "footer", "aside", "script", "style", "noscript", "form", "template",
    "svg", "iframe", "button", "select", "head",
];

/// Elements that start a new line of output
const BLOCKS: &[&str] = &[
    "p", "div", "section", "article", "main", "h1", "h2", "h3", "h4", "h5", "h6", "li", "ul",
    "ol", "tr", "table", "blockquote", "pre", "dt", "dd", "dl", "figcaption", "br", "hr",
    "address", "caption",
];

/// A candidate block needs this much direct paragraph text to beat the body
const MIN_CANDIDATE_CHARS: usize = 140;

const STOPWORDS: &[(&str, &[&str])] = &[
    ("en", &["the", "and", "of", "to", "is", "in", "that", "for", "with", "are"]),
    ("fr", &["le", "la", "les", "et", "des", "est", "une", "pour", "dans", "sur"]),
    ("de", &["der", "die", "und", "das", "ist", "nicht", "mit", "den", "von", "für"]),
    ("es", &["el", "los", "las", "y", "que", "es", "una", "para", "con", "por"]),
];

/// What was pulled out of an HTML document
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct HtmlContent {
    pub text: String,
    pub title: Option<String>,
    pub language: Option<String>,
    pub main_content: bool,
}

/// Extracts readable text and basic metadata from HTML
#[derive(Debug, Default, Clone)]
pub struct HtmlExtractor;

impl HtmlExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Extractor for HtmlExtractor {
    fn can_handle(&self, kind: ContentKind) -> bool {
        kind == ContentKind::Html
    }

    async fn extract(&self, download: &DownloadResult) -> Result<ExtractionResult, ExtractionError> {
        let html = String::from_utf8_lossy(&download.content);
        let original_length = html.chars().count();
        let content = parse_html(&html);

        if content.text.is_empty() {
            return Err(ExtractionError::malformed(
                ContentKind::Html,
                "document has no readable text",
            ));
        }

        let method = if content.main_content {
            "main-content"
        } else {
            "body-fallback"
        };

        let mut result = ExtractionResult::new(content.text)
            .with("format", ContentKind::Html.as_str())
            .with("extraction_method", method)
            .with("original_length", original_length);
        if let Some(title) = content.title {
            result.insert("title", title);
        }
        if let Some(language) = content.language {
            result.insert("detected_language", language);
        }

        Ok(result)
    }
}

/// Parses HTML and extracts main text, title, and language
pub(crate) fn parse_html(html: &str) -> HtmlContent {
    let document = Html::parse_document(html);

    let (root, main_content) = match find_main_content(&document) {
        Some(element) => (Some(element), true),
        None => (first(&document, "body"), false),
    };

    let text = match root {
        Some(element) => render_text(element),
        None => String::new(),
    };

    HtmlContent {
        title: extract_title(&document),
        language: declared_language(&document).or_else(|| guess_language(&text)),
        text,
        main_content,
    }
}

fn first<'a>(document: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(selector).ok()?;
    document.select(&selector).next()
}

/// Extracts the page title from `<title>`, falling back to `og:title`
fn extract_title(document: &Html) -> Option<String> {
    let from_tag = first(document, "title")
        .map(|element| collapse_whitespace(&element.text().collect::<String>()))
        .filter(|s| !s.is_empty());

    from_tag.or_else(|| {
        first(document, "meta[property='og:title']")
            .and_then(|element| element.value().attr("content"))
            .map(collapse_whitespace)
            .filter(|s| !s.is_empty())
    })
}

/// Language declared by `<html lang>` or a Content-Language meta tag
fn declared_language(document: &Html) -> Option<String> {
    let from_html = first(document, "html[lang]").and_then(|el| el.value().attr("lang"));
    let from_meta = || {
        first(document, "meta[http-equiv]")
            .filter(|el| {
                el.value()
                    .attr("http-equiv")
                    .is_some_and(|v| v.eq_ignore_ascii_case("content-language"))
            })
            .and_then(|el| el.value().attr("content"))
    };

    from_html
        .or_else(from_meta)
        .and_then(|tag| tag.split(['-', '_', ',']).next())
        .map(|primary| primary.trim().to_lowercase())
        .filter(|primary| !primary.is_empty())
}

/// Guesses the language from common function words
fn guess_language(text: &str) -> Option<String> {
    let words: Vec<String> = text
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
        .take(2000)
        .map(str::to_lowercase)
        .collect();

    STOPWORDS
        .iter()
        .map(|(code, stopwords)| {
            let hits = words.iter().filter(|w| stopwords.contains(&w.as_str())).count();
            (code, hits)
        })
        .filter(|(_, hits)| *hits >= 3)
        .max_by_key(|(_, hits)| *hits)
        .map(|(code, _)| code.to_string())
}

/// Picks the element most likely to hold the main content
fn find_main_content(document: &Html) -> Option<ElementRef<'_>> {
    let semantic = Selector::parse("article, main, [role='main']").ok()?;
    let semantic_best = document
        .select(&semantic)
        .map(|element| (text_len(element), element))
        .filter(|(len, _)| *len > 0)
        .max_by_key(|(len, _)| *len)
        .map(|(_, element)| element);
    if semantic_best.is_some() {
        return semantic_best;
    }

    let blocks = Selector::parse("div, section").ok()?;
    document
        .select(&blocks)
        .filter(|element| !inside_boilerplate(*element))
        .map(|element| (paragraph_score(element), element))
        .filter(|(score, _)| *score >= MIN_CANDIDATE_CHARS)
        .max_by_key(|(score, _)| *score)
        .map(|(_, element)| element)
}

fn text_len(element: ElementRef<'_>) -> usize {
    render_text(element).chars().filter(|c| !c.is_whitespace()).count()
}

/// Characters of text in the element's direct `<p>` children
fn paragraph_score(element: ElementRef<'_>) -> usize {
    element
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|child| child.value().name() == "p")
        .map(|p| p.text().map(str::trim).map(str::len).sum::<usize>())
        .sum()
}

fn inside_boilerplate(element: ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| BOILERPLATE.contains(&ancestor.value().name()))
}

/// Renders an element's text with one line per block element
fn render_text(root: ElementRef<'_>) -> String {
    let mut raw = String::new();
    walk(root, &mut raw);

    let mut lines: Vec<String> = Vec::new();
    for line in raw.lines() {
        let line = collapse_whitespace(line);
        if !line.is_empty() {
            lines.push(line);
        }
    }
    lines.join("\n")
}

fn walk(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    if BOILERPLATE.contains(&name) {
        return;
    }

    let block = BLOCKS.contains(&name);
    if block {
        out.push('\n');
    }

    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    walk(child, out);
                }
            }
            _ => {}
        }
    }

    if block {
        out.push('\n');
    } else if matches!(name, "td" | "th") {
        out.push('\t');
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
