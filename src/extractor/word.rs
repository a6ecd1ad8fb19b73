//! DOCX extraction, with legacy DOC routed through the compound-file reader

use super::legacy_doc::read_legacy_doc;
use super::sniff::{is_cfb, is_zip};
use super::text::WordText;
use super::{ContentKind, ExtractionError, ExtractionResult, Extractor};
use crate::DownloadResult;
use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};

const DOCUMENT_PART: &str = "word/document.xml";

/// Extracts paragraph and table text from Word documents
#[derive(Debug, Default, Clone)]
pub struct WordExtractor;

impl WordExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Extractor for WordExtractor {
    fn can_handle(&self, kind: ContentKind) -> bool {
        matches!(kind, ContentKind::Docx | ContentKind::Doc)
    }

    async fn extract(&self, download: &DownloadResult) -> Result<ExtractionResult, ExtractionError> {
        let content = download.content.clone();

        // The container, not the URL or header, decides the code path
        let (format, text) = tokio::task::spawn_blocking(move || {
            if is_zip(&content) {
                read_docx(&content).map(|text| (ContentKind::Docx, text))
            } else if is_cfb(&content) {
                read_legacy_doc(&content).map(|text| (ContentKind::Doc, text))
            } else {
                Err(ExtractionError::malformed(
                    ContentKind::Docx,
                    "neither a ZIP package nor an OLE2 compound file",
                ))
            }
        })
        .await
        .map_err(|e| ExtractionError::Io(std::io::Error::other(e)))??;

        let paragraphs = text.paragraphs;
        let tables = text.tables;

        Ok(ExtractionResult::new(text.into_text())
            .with("format", format.as_str())
            .with("paragraphs", paragraphs)
            .with("tables", tables))
    }
}

/// Reads the main document part of a DOCX package
pub(crate) fn read_docx(content: &[u8]) -> Result<WordText, ExtractionError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(content))
        .map_err(|e| ExtractionError::malformed(ContentKind::Docx, e))?;

    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| ExtractionError::malformed(ContentKind::Docx, format!("{}: {}", DOCUMENT_PART, e)))?
        .read_to_string(&mut xml)
        .map_err(|e| ExtractionError::malformed(ContentKind::Docx, e))?;

    parse_document_xml(&xml)
}

/// A table being read; nested tables are flattened into the enclosing cell
#[derive(Default)]
struct TableFrame {
    rows: Vec<Vec<String>>,
    row: Vec<String>,
    cell: String,
}

/// Walks WordprocessingML body content in document order
fn parse_document_xml(xml: &str) -> Result<WordText, ExtractionError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut out = WordText::default();
    let mut tables: Vec<TableFrame> = Vec::new();
    let mut paragraph = String::new();
    let mut in_text_run = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| ExtractionError::malformed(ContentKind::Docx, e))?;

        match event {
            Event::Start(e) => match e.local_name().as_ref() {
                b"p" => paragraph.clear(),
                b"t" => in_text_run = true,
                b"tbl" => tables.push(TableFrame::default()),
                b"tr" => {
                    if let Some(table) = tables.last_mut() {
                        table.row.clear();
                    }
                }
                b"tc" => {
                    if let Some(table) = tables.last_mut() {
                        table.cell.clear();
                    }
                }
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"tab" => paragraph.push('\t'),
                b"br" | b"cr" => paragraph.push('\n'),
                _ => {}
            },
            Event::Text(e) if in_text_run => {
                let text = e
                    .unescape()
                    .map_err(|e| ExtractionError::malformed(ContentKind::Docx, e))?;
                paragraph.push_str(&text);
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"p" => match tables.last_mut() {
                    Some(table) => {
                        if !table.cell.is_empty() {
                            table.cell.push('\n');
                        }
                        table.cell.push_str(&paragraph);
                    }
                    None => out.push_paragraph(&paragraph),
                },
                b"tc" => {
                    if let Some(table) = tables.last_mut() {
                        let cell = std::mem::take(&mut table.cell);
                        table.row.push(cell);
                    }
                }
                b"tr" => {
                    if let Some(table) = tables.last_mut() {
                        let row = std::mem::take(&mut table.row);
                        table.rows.push(row);
                    }
                }
                b"tbl" => {
                    if let Some(table) = tables.pop() {
                        out.tables += 1;
                        match tables.last_mut() {
                            Some(parent) => {
                                let nested: Vec<String> =
                                    table.rows.iter().map(|row| row.join(" ")).collect();
                                if !parent.cell.is_empty() {
                                    parent.cell.push('\n');
                                }
                                parent.cell.push_str(&nested.join("\n"));
                            }
                            None => {
                                for row in &table.rows {
                                    out.push_row(row);
                                }
                            }
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(out)
}
