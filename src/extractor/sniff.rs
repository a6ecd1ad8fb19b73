use super::ContentKind;

const PDF_MAGIC: &[u8] = b"%PDF";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
pub(crate) const CFB_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// How much of the content is inspected for text signatures
const TEXT_WINDOW: usize = 1024;

/// Infers a format from the leading bytes of `content`
///
/// A ZIP container is assumed to be DOCX; that is the only ZIP-based format
/// the pipeline extracts.
///
/// ```
/// use tidepool::extractor::{sniff, ContentKind};
///
/// assert_eq!(sniff(b"%PDF-1.7\n..."), Some(ContentKind::Pdf));
/// assert_eq!(sniff(b"<!DOCTYPE html><html>"), Some(ContentKind::Html));
/// assert_eq!(sniff(b"\x00\x01\x02"), None);
/// ```
pub fn sniff(content: &[u8]) -> Option<ContentKind> {
    if content.starts_with(PDF_MAGIC) {
        return Some(ContentKind::Pdf);
    }
    if content.starts_with(ZIP_MAGIC) {
        return Some(ContentKind::Docx);
    }
    if content.starts_with(CFB_MAGIC) {
        return Some(ContentKind::Doc);
    }

    let window = &content[..content.len().min(TEXT_WINDOW)];
    let head = String::from_utf8_lossy(window).to_lowercase();
    let head = head.trim_start_matches('\u{feff}').trim_start();

    if head.starts_with("<!doctype html") || head.starts_with("<html") {
        return Some(ContentKind::Html);
    }

    if head.starts_with("<?xml") || head.starts_with("<rss") || head.starts_with("<feed") {
        if head.contains("<rss") || head.contains("<feed") {
            return Some(ContentKind::Feed);
        }
        if head.contains("<html") {
            return Some(ContentKind::Html);
        }
    }

    None
}

pub(crate) fn is_zip(content: &[u8]) -> bool {
    content.starts_with(ZIP_MAGIC)
}

pub(crate) fn is_cfb(content: &[u8]) -> bool {
    content.starts_with(CFB_MAGIC)
}
