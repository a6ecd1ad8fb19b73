//! PDF text extraction with per-page OCR fallback

use super::ocr::{OcrEngine, PdfPage};
use super::{ContentKind, ExtractionError, ExtractionResult, Extractor};
use crate::DownloadResult;
use async_trait::async_trait;
use lopdf::{Document, Object, ObjectId};
use std::sync::Arc;

/// Separator placed between pages: a form feed on its own line
pub const PAGE_BREAK: &str = "\n\u{0c}\n";

/// US Letter, used when a page has no usable MediaBox
const DEFAULT_PAGE_SIZE: (f64, f64) = (612.0, 792.0);

const POINTS_PER_INCH: f64 = 72.0;

/// Inherited attributes are looked up at most this many levels up
const MAX_PARENT_DEPTH: usize = 32;

/// Embedded text of one page
#[derive(Debug, Clone, PartialEq)]
struct PageText {
    text: String,
    width_pt: f64,
    height_pt: f64,
}

impl PageText {
    /// Non-whitespace characters per square inch of page area
    fn density(&self) -> f64 {
        let area = (self.width_pt / POINTS_PER_INCH) * (self.height_pt / POINTS_PER_INCH);
        if area <= 0.0 {
            return 0.0;
        }
        let chars = self.text.chars().filter(|c| !c.is_whitespace()).count();
        chars as f64 / area
    }
}

/// Extracts embedded PDF text and OCRs pages that have too little of it
#[derive(Debug, Clone)]
pub struct PdfExtractor {
    ocr: Arc<dyn OcrEngine>,
    min_text_density: f64,
}

impl PdfExtractor {
    pub fn new(ocr: Arc<dyn OcrEngine>, min_text_density: f64) -> Self {
        Self {
            ocr,
            min_text_density,
        }
    }
}

#[async_trait]
impl Extractor for PdfExtractor {
    fn can_handle(&self, kind: ContentKind) -> bool {
        kind == ContentKind::Pdf
    }

    async fn extract(&self, download: &DownloadResult) -> Result<ExtractionResult, ExtractionError> {
        let content = download.content.clone();
        let mut pages = tokio::task::spawn_blocking(move || read_pages(&content))
            .await
            .map_err(|e| ExtractionError::Io(std::io::Error::other(e)))??;

        let mut ocr_pages = Vec::new();
        let mut ocr_failed_pages = Vec::new();

        for (index, page) in pages.iter_mut().enumerate() {
            let density = page.density();
            if density >= self.min_text_density || !self.ocr.is_available() {
                continue;
            }

            tracing::debug!(
                "Page {} has {:.2} chars/in², below {:.2}; running OCR",
                index,
                density,
                self.min_text_density
            );

            let request = PdfPage {
                index,
                document: &download.content,
                width_pt: page.width_pt,
                height_pt: page.height_pt,
            };

            match self.ocr.render_and_recognize(&request).await {
                Ok(recognized) => {
                    if recognized.trim().len() >= page.text.trim().len() {
                        page.text = recognized;
                    }
                    ocr_pages.push(index);
                }
                Err(e) => {
                    tracing::warn!("{}; keeping embedded text", e);
                    ocr_failed_pages.push(index);
                }
            }
        }

        let page_count = pages.len();
        let text = pages
            .into_iter()
            .map(|page| page.text.trim().to_string())
            .collect::<Vec<_>>()
            .join(PAGE_BREAK);

        let mut result = ExtractionResult::new(text)
            .with("format", ContentKind::Pdf.as_str())
            .with("pages_processed", page_count)
            .with("ocr_pages", ocr_pages);
        if !ocr_failed_pages.is_empty() {
            result.insert("ocr_failed_pages", ocr_failed_pages);
        }

        Ok(result)
    }
}

/// Loads a PDF and returns each page's embedded text in document order
fn read_pages(content: &[u8]) -> Result<Vec<PageText>, ExtractionError> {
    let document =
        Document::load_mem(content).map_err(|e| ExtractionError::malformed(ContentKind::Pdf, e))?;

    let pages = document.get_pages();
    if pages.is_empty() {
        return Err(ExtractionError::malformed(ContentKind::Pdf, "document has no pages"));
    }

    Ok(pages
        .iter()
        .map(|(&number, &page_id)| {
            // An unreadable page is treated as empty so OCR can still recover it
            let text = document.extract_text(&[number]).unwrap_or_else(|e| {
                tracing::debug!("No embedded text on page {}: {}", number, e);
                String::new()
            });
            let (width_pt, height_pt) = page_size(&document, page_id);
            PageText {
                text,
                width_pt,
                height_pt,
            }
        })
        .collect())
}

/// Page width and height in points, following inherited MediaBox entries
fn page_size(document: &Document, page_id: ObjectId) -> (f64, f64) {
    let mut current = Some(page_id);

    for _ in 0..MAX_PARENT_DEPTH {
        let Some(id) = current else { break };
        let Ok(node) = document.get_dictionary(id) else { break };

        if let Some(size) = node
            .get(b"MediaBox")
            .ok()
            .and_then(|obj| resolve(document, obj))
            .and_then(media_box_size)
        {
            return size;
        }

        current = node.get(b"Parent").and_then(Object::as_reference).ok();
    }

    DEFAULT_PAGE_SIZE
}

fn resolve<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => document.get_object(*id).ok(),
        other => Some(other),
    }
}

fn media_box_size(object: &Object) -> Option<(f64, f64)> {
    let values: Vec<f64> = object.as_array().ok()?.iter().filter_map(number).collect();
    if values.len() != 4 {
        return None;
    }
    let width = (values[2] - values[0]).abs();
    let height = (values[3] - values[1]).abs();
    (width > 0.0 && height > 0.0).then_some((width, height))
}

fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Stream};
    use std::sync::Mutex;

    /// Builds an A4 PDF with one text line per page
    pub(crate) fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 10.into()]),
                    Operation::new("Td", vec![40.into(), 800.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    /// Dense enough to stay above the default threshold on an A4 page
    pub(crate) fn dense_text(label: &str) -> String {
        format!("{} ", label).repeat(200 / (label.len() + 1) + 1)
    }

    #[derive(Debug, Default)]
    struct RecordingOcr {
        seen: Mutex<Vec<usize>>,
        fail: bool,
    }

    #[async_trait]
    impl OcrEngine for RecordingOcr {
        async fn render_and_recognize(&self, page: &PdfPage<'_>) -> Result<String, ExtractionError> {
            self.seen.lock().unwrap().push(page.index);
            if self.fail {
                return Err(ExtractionError::Ocr {
                    page: page.index,
                    reason: "engine crashed".to_string(),
                });
            }
            Ok(format!("recognized text of scanned page {}", page.index))
        }
    }

    fn download(content: Vec<u8>) -> DownloadResult {
        DownloadResult {
            content,
            content_type: Some("application/pdf".to_string()),
            source_url: "https://example.org/a.pdf".to_string(),
            final_url: "https://example.org/a.pdf".to_string(),
            status_code: 200,
        }
    }

    #[test]
    fn test_density() {
        let page = PageText {
            text: "x".repeat(94),
            width_pt: 612.0,
            height_pt: 792.0,
        };
        assert!(page.density() > 1.0);

        let sparse = PageText {
            text: "  a b  ".to_string(),
            ..page
        };
        assert!(sparse.density() < 0.1);
    }

    #[test]
    fn test_page_size_is_inherited() {
        let bytes = pdf_with_pages(&["one"]);
        let document = Document::load_mem(&bytes).unwrap();
        let (_, &page_id) = document.get_pages().iter().next().unwrap();
        assert_eq!(page_size(&document, page_id), (595.0, 842.0));
    }

    #[tokio::test]
    async fn test_native_text_pages_in_order() {
        let pages = [dense_text("alpha"), dense_text("bravo"), dense_text("charlie")];
        let refs: Vec<&str> = pages.iter().map(String::as_str).collect();
        let ocr = Arc::new(RecordingOcr::default());
        let extractor = PdfExtractor::new(ocr.clone(), 1.0);

        let result = extractor.extract(&download(pdf_with_pages(&refs))).await.unwrap();

        let a = result.text.find("alpha").unwrap();
        let b = result.text.find("bravo").unwrap();
        let c = result.text.find("charlie").unwrap();
        assert!(a < b && b < c);
        assert_eq!(result.text.matches(PAGE_BREAK).count(), 2);
        assert!(result.ocr_pages().is_empty());
        assert_eq!(result.get("pages_processed").and_then(|v| v.as_i64()), Some(3));
        assert!(ocr.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sparse_page_goes_to_ocr() {
        let dense = dense_text("inspection");
        let ocr = Arc::new(RecordingOcr::default());
        let extractor = PdfExtractor::new(ocr.clone(), 1.0);

        let result = extractor
            .extract(&download(pdf_with_pages(&[&dense, "Fig. 1"])))
            .await
            .unwrap();

        assert_eq!(result.ocr_pages(), &[1]);
        assert_eq!(*ocr.seen.lock().unwrap(), vec![1]);
        assert!(result.text.contains("recognized text of scanned page 1"));
        assert!(result.text.contains("inspection"));
    }

    #[tokio::test]
    async fn test_failed_ocr_keeps_embedded_text() {
        let ocr = Arc::new(RecordingOcr {
            fail: true,
            ..RecordingOcr::default()
        });
        let extractor = PdfExtractor::new(ocr, 1.0);

        let result = extractor
            .extract(&download(pdf_with_pages(&["Fig. 1"])))
            .await
            .unwrap();

        assert!(result.ocr_pages().is_empty());
        assert_eq!(
            result.get("ocr_failed_pages").and_then(|v| v.as_list()),
            Some(&[0][..])
        );
        assert!(result.text.contains("Fig. 1"));
    }

    #[tokio::test]
    async fn test_disabled_ocr_is_skipped() {
        let extractor = PdfExtractor::new(Arc::new(crate::extractor::DisabledOcr), 1.0);
        let result = extractor
            .extract(&download(pdf_with_pages(&["Fig. 1"])))
            .await
            .unwrap();

        assert!(result.ocr_pages().is_empty());
        assert!(result.get("ocr_failed_pages").is_none());
    }

    #[tokio::test]
    async fn test_not_a_pdf() {
        let extractor = PdfExtractor::new(Arc::new(RecordingOcr::default()), 1.0);
        let err = extractor
            .extract(&download(b"%PDF-1.4 but truncated".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::Malformed {
                format: ContentKind::Pdf,
                ..
            }
        ));
    }
}
