use super::{sniff, ContentKind, Extractor};
use crate::url::{is_feed_url, path_extension};
use std::sync::Arc;
use url::Url;

/// Which signal decided the format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    DeclaredType,
    UrlSuffix,
    Signature,
}

/// The chosen extractor and the reason it was chosen
#[derive(Debug, Clone)]
pub struct Selection {
    pub extractor: Arc<dyn Extractor>,
    pub kind: ContentKind,
    pub signal: Signal,
}

/// Chooses an extractor by declared type, then URL suffix, then byte signature
#[derive(Debug, Clone, Default)]
pub struct ExtractorSelector {
    extractors: Vec<Arc<dyn Extractor>>,
}

impl ExtractorSelector {
    pub fn new(extractors: Vec<Arc<dyn Extractor>>) -> Self {
        Self { extractors }
    }

    /// Adds an extractor; earlier registrations win when two handle a format
    pub fn register(&mut self, extractor: Arc<dyn Extractor>) {
        self.extractors.push(extractor);
    }

    /// Returns the first registered extractor for `kind`
    pub fn extractor_for(&self, kind: ContentKind) -> Option<Arc<dyn Extractor>> {
        self.extractors
            .iter()
            .find(|extractor| extractor.can_handle(kind))
            .cloned()
    }

    /// Picks an extractor for a document
    ///
    /// Each signal is consulted only if the previous one named no format we
    /// have an extractor for. Returns `None` when nothing matches.
    pub fn select(
        &self,
        url: &Url,
        declared_content_type: Option<&str>,
        content: &[u8],
    ) -> Option<Selection> {
        let declared = declared_content_type
            .map(|raw| raw.split(';').next().unwrap_or_default().trim().to_lowercase())
            .and_then(|mime| ContentKind::from_mime(&mime))
            .map(|kind| (kind, Signal::DeclaredType));

        let suffix = || {
            path_extension(url)
                .and_then(|ext| ContentKind::from_extension(&ext))
                .or_else(|| is_feed_url(url).then_some(ContentKind::Feed))
                .map(|kind| (kind, Signal::UrlSuffix))
        };

        let signature = || sniff(content).map(|kind| (kind, Signal::Signature));

        let candidates = declared
            .into_iter()
            .chain(std::iter::once_with(suffix).flatten())
            .chain(std::iter::once_with(signature).flatten());

        for (kind, signal) in candidates {
            if let Some(extractor) = self.extractor_for(kind) {
                tracing::debug!("Selected {} extractor for {} by {:?}", kind, url, signal);
                return Some(Selection {
                    extractor,
                    kind,
                    signal,
                });
            }
        }

        None
    }
}
