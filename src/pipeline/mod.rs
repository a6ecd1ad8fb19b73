//! The end-to-end harvesting pipeline
//!
//! [`Pipeline::process`] runs one URL through every stage:
//! - compliance gate (robots.txt, then the domain throttle)
//! - downloader selection and download, with retries
//! - extractor selection and extraction
//!
//! The throttle permit taken by the gate is held until extraction finishes
//! and is released on every exit path, including cancellation.

use crate::compliance::ComplianceGate;
use crate::config::{validate, Config};
use crate::downloader::{
    build_http_client, BrowserDownloader, DownloaderSelector, HttpDownloader, RetryPolicy,
};
use crate::extractor::{
    DisabledOcr, ExtractorSelector, FeedExtractor, HtmlExtractor, OcrEngine, PdfExtractor,
    TesseractCli, WordExtractor,
};
use crate::robots::RobotsEvaluator;
use crate::throttle::DomainThrottle;
use crate::url::parse_target;
use crate::{ConfigError, ExtractionResult, Result, TidepoolError};
use futures::future::join_all;
use std::sync::Arc;

/// Compliance-aware fetch and extract for single URLs or batches
#[derive(Debug)]
pub struct Pipeline {
    gate: ComplianceGate,
    downloaders: DownloaderSelector,
    extractors: ExtractorSelector,
}

impl Pipeline {
    /// Builds a pipeline with the standard downloaders and extractors
    ///
    /// # Arguments
    ///
    /// * `config` - Validated or unvalidated configuration; it is validated here
    ///
    /// # Returns
    ///
    /// * `Ok(Pipeline)` - Ready to process URLs
    /// * `Err(TidepoolError::Config)` - Invalid configuration or HTTP client setup failure
    pub fn new(config: Config) -> Result<Self> {
        validate(&config)?;

        let user_agent = config.pipeline.user_agent.clone();
        let client = build_http_client(&user_agent, &config.http)
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        let retry = RetryPolicy::from_config(&config.retry);

        let robots = RobotsEvaluator::new(client.clone(), user_agent.clone(), config.robots.clone());
        let throttle = Arc::new(DomainThrottle::from_config(&config));
        let gate = ComplianceGate::new(robots, throttle)
            .respect_crawl_delay(config.pipeline.respect_crawl_delay)
            .with_global_limit(config.pipeline.global_concurrency as usize);

        let downloaders = DownloaderSelector::new(
            Arc::new(HttpDownloader::new(client, retry)),
            Arc::new(BrowserDownloader::new(
                config.browser.clone(),
                user_agent.clone(),
                retry,
            )),
            config.sites.clone(),
        );

        let ocr: Arc<dyn OcrEngine> = if config.pdf.ocr {
            Arc::new(TesseractCli::new(config.pdf.ocr_dpi))
        } else {
            Arc::new(DisabledOcr)
        };
        let extractors = ExtractorSelector::new(vec![
            Arc::new(PdfExtractor::new(ocr, config.pdf.min_text_density)),
            Arc::new(WordExtractor::new()),
            Arc::new(HtmlExtractor::new()),
            Arc::new(FeedExtractor::new()),
        ]);

        tracing::info!(
            "Pipeline ready (user agent: {}, {} site overrides)",
            user_agent,
            config.sites.len()
        );

        Ok(Self::from_parts(gate, downloaders, extractors))
    }

    /// Assembles a pipeline from caller-supplied components
    pub fn from_parts(
        gate: ComplianceGate,
        downloaders: DownloaderSelector,
        extractors: ExtractorSelector,
    ) -> Self {
        Self {
            gate,
            downloaders,
            extractors,
        }
    }

    pub fn gate(&self) -> &ComplianceGate {
        &self.gate
    }

    pub fn throttle(&self) -> &Arc<DomainThrottle> {
        self.gate.throttle()
    }

    /// Fetches one URL and extracts its text and metadata
    pub async fn process(&self, url: &str) -> Result<ExtractionResult> {
        let target = parse_target(url)?;

        let permit = self.gate.check_and_acquire(&target).await?;

        let downloader = self.downloaders.select(&target);
        tracing::debug!("Downloading {} via {}", target, downloader.name());
        let download = downloader.download(&target).await?;

        let selection = self
            .extractors
            .select(&target, download.content_type.as_deref(), &download.content)
            .ok_or_else(|| TidepoolError::UnsupportedFormat {
                url: target.to_string(),
                content_type: download.content_type.clone(),
            })?;

        let mut result = selection.extractor.extract(&download).await?;

        result.insert("source_url", download.source_url.as_str());
        result.insert("final_url", download.final_url.as_str());
        result.insert("status_code", download.status_code);
        if let Some(content_type) = &download.content_type {
            result.insert("content_type", content_type.as_str());
        }
        if result.get("format").is_none() {
            result.insert("format", selection.kind.as_str());
        }
        result.insert("downloader", downloader.name());
        result.insert("char_count", result.text.chars().count());

        drop(permit);

        tracing::info!(
            "Extracted {} chars from {} ({})",
            result.text.chars().count(),
            target,
            selection.kind
        );
        Ok(result)
    }

    /// Processes several URLs concurrently; results come back in input order
    ///
    /// Every URL is started at once; the compliance gate bounds how many
    /// requests are actually in flight, per domain and overall.
    pub async fn process_many<S: AsRef<str>>(&self, urls: &[S]) -> Vec<Result<ExtractionResult>> {
        join_all(urls.iter().map(|url| self.process(url.as_ref()))).await
    }
}
