use crate::config::types::{Config, PdfConfig, PipelineConfig, RetryConfig, SiteOverride};
use crate::ConfigError;

/// Upper bound on per-domain concurrency
const MAX_CONCURRENCY: u32 = 64;

/// Upper bound on requests in flight across all domains
const MAX_GLOBAL_CONCURRENCY: u32 = 256;

/// Upper bound on download attempts
const MAX_ATTEMPTS: u32 = 10;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_pipeline_config(&config.pipeline)?;
    validate_retry_config(&config.retry)?;
    validate_pdf_config(&config.pdf)?;
    validate_sites(&config.sites)?;

    if config.robots.timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "robots timeout-ms must be > 0".to_string(),
        ));
    }

    Ok(())
}

fn validate_pipeline_config(config: &PipelineConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    validate_concurrency(config.default_concurrency, "default-concurrency")?;

    if config.global_concurrency < 1 || config.global_concurrency > MAX_GLOBAL_CONCURRENCY {
        return Err(ConfigError::Validation(format!(
            "global-concurrency must be between 1 and {}, got {}",
            MAX_GLOBAL_CONCURRENCY, config.global_concurrency
        )));
    }

    Ok(())
}

fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 || config.max_attempts > MAX_ATTEMPTS {
        return Err(ConfigError::Validation(format!(
            "retry max-attempts must be between 1 and {}, got {}",
            MAX_ATTEMPTS, config.max_attempts
        )));
    }

    if config.base_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "retry base-delay-ms ({}) cannot exceed max-delay-ms ({})",
            config.base_delay_ms, config.max_delay_ms
        )));
    }

    Ok(())
}

fn validate_pdf_config(config: &PdfConfig) -> Result<(), ConfigError> {
    if !config.min_text_density.is_finite() || config.min_text_density < 0.0 {
        return Err(ConfigError::Validation(format!(
            "pdf min-text-density must be a non-negative number, got {}",
            config.min_text_density
        )));
    }

    if config.ocr_dpi < 72 || config.ocr_dpi > 1200 {
        return Err(ConfigError::Validation(format!(
            "pdf ocr-dpi must be between 72 and 1200, got {}",
            config.ocr_dpi
        )));
    }

    Ok(())
}

fn validate_sites(sites: &[SiteOverride]) -> Result<(), ConfigError> {
    for site in sites {
        validate_domain_pattern(&site.domain)?;

        if let Some(concurrency) = site.concurrency {
            validate_concurrency(concurrency, &format!("concurrency for '{}'", site.domain))?;
        }
    }

    Ok(())
}

fn validate_concurrency(value: u32, what: &str) -> Result<(), ConfigError> {
    if value < 1 || value > MAX_CONCURRENCY {
        return Err(ConfigError::Validation(format!(
            "{} must be between 1 and {}, got {}",
            what, MAX_CONCURRENCY, value
        )));
    }
    Ok(())
}

/// Checks a site-override key: `host`, `*.host`, `localhost`, or an IPv4 literal
///
/// Ports are not part of a key; lookups strip them before matching.
pub(crate) fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    let host = pattern.strip_prefix("*.").unwrap_or(pattern);
    let invalid = |why: &str| ConfigError::InvalidPattern(format!("'{}' {}", pattern, why));

    if host.is_empty() {
        return Err(invalid("has no host"));
    }
    if host == "localhost" {
        return Ok(());
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 {
        return Err(invalid("needs at least two labels (e.g. 'example.com')"));
    }

    for label in labels {
        if label.is_empty() {
            return Err(invalid("has an empty label"));
        }
        if !label.chars().all(|c| c.is_alphanumeric() || c == '-') {
            return Err(invalid("contains characters not allowed in a host name"));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(invalid("has a label starting or ending with '-'"));
        }
    }

    Ok(())
}
