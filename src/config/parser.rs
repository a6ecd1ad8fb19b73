use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Reads, parses, and validates a TOML configuration file
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Parsed configuration with defaults filled in
/// * `Err(ConfigError)` - The file could not be read, parsed, or validated
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use tidepool::config::load_config;
///
/// let config = load_config(Path::new("tidepool.toml")).unwrap();
/// println!("Robots TTL: {}s", config.robots.ttl_secs);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    parse_config(&std::fs::read_to_string(path)?)
}

/// Parses and validates configuration from a TOML string
///
/// Missing sections and keys take their documented defaults, so `""` is a
/// valid configuration.
///
/// # Example
///
/// ```
/// use tidepool::config::parse_config;
///
/// let config = parse_config("[pipeline]\ndefault-delay-ms = 500").unwrap();
/// assert_eq!(config.pipeline.default_delay_ms, 500);
/// assert_eq!(config.pipeline.default_concurrency, 2);
///
/// assert!(parse_config("[retry]\nmax-attempts = 0").is_err());
/// ```
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Hex SHA-256 digest of a configuration file's bytes
///
/// Logged at startup so a run can be tied to the exact configuration it used.
///
/// # Arguments
///
/// * `path` - Path to the configuration file
///
/// # Returns
///
/// * `Ok(String)` - 64 lowercase hex characters
/// * `Err(ConfigError::Io)` - The file could not be read
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    Ok(digest(&std::fs::read(path)?))
}

/// Loads a configuration together with the digest of the text it was parsed from
///
/// The file is read once, so the hash always describes the configuration
/// that was returned.
///
/// # Returns
///
/// * `Ok((Config, String))` - The configuration and its hex SHA-256 digest
/// * `Err(ConfigError)` - As for [`load_config`]
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    Ok((config, digest(content.as_bytes())))
}

fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
