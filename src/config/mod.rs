//! Configuration module for Tidepool
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every section has defaults, so a missing file section (or `Config::default()`)
//! yields a usable configuration.
//!
//! # Example
//!
//! ```no_run
//! use tidepool::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("tidepool.toml")).unwrap();
//! println!("Default spacing: {}ms", config.pipeline.default_delay_ms);
//! ```

mod parser;
mod types;
pub(crate) mod validation;

// Re-export types
pub use types::{
    BrowserConfig, Config, HttpConfig, PdfConfig, PipelineConfig, RenderingMode, RetryConfig,
    RobotsConfig, SiteOverride, UnreachablePolicy,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
