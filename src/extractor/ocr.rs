//! OCR capability used for PDF pages without usable embedded text

use super::ExtractionError;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;

/// One PDF page handed to an OCR engine
#[derive(Debug, Clone, Copy)]
pub struct PdfPage<'a> {
    /// Zero-based page index
    pub index: usize,

    /// The whole PDF file
    pub document: &'a [u8],

    /// Page size in points
    pub width_pt: f64,
    pub height_pt: f64,
}

impl PdfPage<'_> {
    /// One-based page number as PDF tools count it
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

/// Turns a page image into text
#[async_trait]
pub trait OcrEngine: Send + Sync + std::fmt::Debug {
    /// Whether the engine can run at all; unavailable engines are never called
    fn is_available(&self) -> bool {
        true
    }

    async fn render_and_recognize(&self, page: &PdfPage<'_>) -> Result<String, ExtractionError>;
}

/// OCR turned off by configuration
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledOcr;

#[async_trait]
impl OcrEngine for DisabledOcr {
    fn is_available(&self) -> bool {
        false
    }

    async fn render_and_recognize(&self, page: &PdfPage<'_>) -> Result<String, ExtractionError> {
        Err(ExtractionError::Ocr {
            page: page.index,
            reason: "OCR is disabled".to_string(),
        })
    }
}

/// Renders with `pdftoppm` (poppler) and recognizes with `tesseract`
#[derive(Debug, Clone)]
pub struct TesseractCli {
    dpi: u32,
    pdftoppm: PathBuf,
    tesseract: PathBuf,
    language: String,
}

impl TesseractCli {
    pub fn new(dpi: u32) -> Self {
        Self {
            dpi,
            pdftoppm: PathBuf::from("pdftoppm"),
            tesseract: PathBuf::from("tesseract"),
            language: "eng".to_string(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    fn failure(page: &PdfPage<'_>, reason: impl std::fmt::Display) -> ExtractionError {
        ExtractionError::Ocr {
            page: page.index,
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractCli {
    async fn render_and_recognize(&self, page: &PdfPage<'_>) -> Result<String, ExtractionError> {
        let workdir = tempfile::tempdir()?;
        let pdf_path = workdir.path().join("input.pdf");
        let image_stem = workdir.path().join("page");
        tokio::fs::write(&pdf_path, page.document).await?;

        let number = page.number().to_string();
        let dpi = self.dpi.to_string();
        let render = Command::new(&self.pdftoppm)
            .args(["-f", number.as_str(), "-l", number.as_str(), "-r", dpi.as_str()])
            .args(["-png", "-singlefile"])
            .arg(&pdf_path)
            .arg(&image_stem)
            .output()
            .await
            .map_err(|e| Self::failure(page, format!("pdftoppm: {}", e)))?;

        if !render.status.success() {
            return Err(Self::failure(
                page,
                format!("pdftoppm: {}", String::from_utf8_lossy(&render.stderr).trim()),
            ));
        }

        let recognize = Command::new(&self.tesseract)
            .arg(image_stem.with_extension("png"))
            .arg("stdout")
            .args(["-l", self.language.as_str()])
            .output()
            .await
            .map_err(|e| Self::failure(page, format!("tesseract: {}", e)))?;

        if !recognize.status.success() {
            return Err(Self::failure(
                page,
                format!("tesseract: {}", String::from_utf8_lossy(&recognize.stderr).trim()),
            ));
        }

        Ok(String::from_utf8_lossy(&recognize.stdout).into_owned())
    }
}
