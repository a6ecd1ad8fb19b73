//! Format-specific text extraction
//!
//! Each [`Extractor`] turns the bytes of one [`DownloadResult`] into an
//! [`ExtractionResult`]. The [`ExtractorSelector`] decides which extractor
//! applies from the declared content type, the URL suffix, and finally the
//! leading bytes of the content.

mod feed;
mod html;
mod legacy_doc;
mod ocr;
mod pdf;
mod selector;
mod sniff;
mod text;
mod word;

pub use feed::FeedExtractor;
pub use html::HtmlExtractor;
pub use ocr::{DisabledOcr, OcrEngine, PdfPage, TesseractCli};
pub use pdf::{PdfExtractor, PAGE_BREAK};
pub use selector::{ExtractorSelector, Selection};
pub use sniff::sniff;
pub use word::WordExtractor;

use crate::DownloadResult;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Document formats the pipeline can extract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Pdf,
    Docx,
    Doc,
    Html,
    Feed,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Doc => "doc",
            Self::Html => "html",
            Self::Feed => "feed",
        }
    }

    /// Maps a MIME type (no parameters, lowercase) to a format
    ///
    /// Generic XML and binary types are ambiguous and map to nothing.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "application/pdf" | "application/x-pdf" => Some(Self::Pdf),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(Self::Docx)
            }
            "application/msword" => Some(Self::Doc),
            "text/html" | "application/xhtml+xml" => Some(Self::Html),
            "application/rss+xml" | "application/atom+xml" => Some(Self::Feed),
            _ => None,
        }
    }

    /// Maps a lowercase file extension to a format
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "doc" => Some(Self::Doc),
            "htm" | "html" | "xhtml" => Some(Self::Html),
            "rss" | "atom" => Some(Self::Feed),
            _ => None,
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metadata value: a scalar or a list of integers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    IntegerList(Vec<i64>),
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[i64]> {
        match self {
            Self::IntegerList(list) => Some(list),
            _ => None,
        }
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<usize> for MetadataValue {
    fn from(value: usize) -> Self {
        Self::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<u16> for MetadataValue {
    fn from(value: u16) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<usize>> for MetadataValue {
    fn from(values: Vec<usize>) -> Self {
        Self::IntegerList(
            values
                .into_iter()
                .map(|v| i64::try_from(v).unwrap_or(i64::MAX))
                .collect(),
        )
    }
}

pub type Metadata = BTreeMap<String, MetadataValue>;

/// Normalized text and metadata extracted from one document
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractionResult {
    pub text: String,
    pub metadata: Metadata,
}

impl ExtractionResult {
    pub fn new(text: String) -> Self {
        Self {
            text,
            metadata: Metadata::new(),
        }
    }

    /// Adds a metadata entry, replacing any previous value
    pub fn with(mut self, key: &str, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<MetadataValue>) {
        self.metadata.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.metadata.get(key)
    }

    /// Zero-based indices of PDF pages whose text came from OCR
    pub fn ocr_pages(&self) -> &[i64] {
        self.get("ocr_pages")
            .and_then(MetadataValue::as_list)
            .unwrap_or_default()
    }
}

/// Content that could not be turned into text
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Malformed {format} content: {reason}")]
    Malformed { format: ContentKind, reason: String },

    #[error("OCR failed on page {page}: {reason}")]
    Ocr { page: usize, reason: String },

    #[error("IO error during extraction: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtractionError {
    pub(crate) fn malformed(format: ContentKind, reason: impl fmt::Display) -> Self {
        Self::Malformed {
            format,
            reason: reason.to_string(),
        }
    }
}

/// A format-specific text extractor
#[async_trait]
pub trait Extractor: Send + Sync + fmt::Debug {
    /// True if this extractor handles `kind`
    fn can_handle(&self, kind: ContentKind) -> bool;

    /// Extracts text and metadata; the result carries a `format` entry
    async fn extract(&self, download: &DownloadResult) -> Result<ExtractionResult, ExtractionError>;
}
