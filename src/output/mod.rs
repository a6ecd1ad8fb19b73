//! Rendering of extraction results for the command line
//!
//! Two formats are supported:
//! - `text`: the extracted text only, documents separated by a blank line
//! - `json`: `{url, text, metadata, length}` objects, an array for batches

use crate::{ExtractionResult, TidepoolError};
use serde::Serialize;
use serde_json::json;
use std::fmt;
use std::str::FromStr;

/// Output format selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown output format '{}' (expected text or json)", other)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Json => f.write_str("json"),
        }
    }
}

#[derive(Serialize)]
struct Document<'a> {
    url: &'a str,
    text: &'a str,
    metadata: &'a crate::extractor::Metadata,
    length: usize,
}

impl<'a> Document<'a> {
    fn new(url: &'a str, result: &'a ExtractionResult) -> Self {
        Self {
            url,
            text: &result.text,
            metadata: &result.metadata,
            length: result.text.chars().count(),
        }
    }
}

/// Renders one successful result
pub fn render(url: &str, result: &ExtractionResult, format: OutputFormat) -> serde_json::Result<String> {
    match format {
        OutputFormat::Text => Ok(result.text.clone()),
        OutputFormat::Json => serde_json::to_string_pretty(&Document::new(url, result)),
    }
}

/// Renders a batch of per-URL outcomes in input order
///
/// Failures appear in JSON as `{url, error, kind, remediation}`; in text
/// output they are left out, since the binary reports them on stderr.
pub fn render_batch(
    outcomes: &[(String, Result<ExtractionResult, TidepoolError>)],
    format: OutputFormat,
) -> serde_json::Result<String> {
    match format {
        OutputFormat::Text => Ok(outcomes
            .iter()
            .filter_map(|(_, outcome)| outcome.as_ref().ok())
            .map(|result| result.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")),
        OutputFormat::Json => {
            let entries = outcomes
                .iter()
                .map(|(url, outcome)| match outcome {
                    Ok(result) => serde_json::to_value(Document::new(url, result)),
                    Err(e) => Ok(json!({
                        "url": url,
                        "error": e.to_string(),
                        "kind": format!("{:?}", e.kind()),
                        "remediation": e.kind().remediation(),
                    })),
                })
                .collect::<serde_json::Result<Vec<_>>>()?;
            serde_json::to_string_pretty(&entries)
        }
    }
}
