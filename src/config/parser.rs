use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use outreach_pipeline::config::load_config;
///
/// let config = load_config(Path::new("outreach.toml")).unwrap();
/// println!("Max pages per site: {}", config.crawler.max_pages);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so a run can be traced back to the config that drove it.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const MINIMAL: &str = r#"
[user-agent]
crawler-name = "OutreachBot"
crawler-version = "1.0"
contact-url = "https://example.com/bot"
contact-email = "bot@example.com"

[database]
path = "./outreach.db"
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let file = create_temp_config(MINIMAL);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.max_pages, 10);
        assert_eq!(config.crawler.max_depth, 2);
        assert_eq!(config.suppression.contact_cooldown_days, 90);
        assert_eq!(config.suppression.domain_max_sends, 2);
        assert_eq!(config.sending.window_start_hour, 8);
        assert_eq!(config.sending.window_end_hour, 17);
        assert_eq!(config.review.retention_days, 90);
        assert!(config.ai.is_none());
        assert!(config
            .validation
            .disposable_domains
            .contains(&"mailinator.com".to_string()));
    }

    #[test]
    fn test_load_full_config() {
        let content = format!(
            r#"{}
[crawler]
max-pages = 5
max-depth = 1

[suppression]
domain-max-sends = 4
exclude-self-from-domain-count = true

[sending]
window-start-hour = 9
window-end-hour = 18
utc-offset-hours = 2

[[rules]]
name = "small-wordpress"
criteria = {{ platforms = "WordPress, Wix", max_pages = "20" }}

[[senders]]
name = "primary"
from-address = "hello@agency.example"
daily-limit = 40
"#,
            MINIMAL
        );

        let file = create_temp_config(&content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.max_pages, 5);
        assert_eq!(config.crawler.max_depth, 1);
        assert_eq!(config.crawler.max_concurrent_fetches, 4);
        assert!(config.suppression.exclude_self_from_domain_count);
        assert_eq!(config.sending.utc_offset_hours, 2);
        assert_eq!(config.rules.len(), 1);
        assert_eq!(config.rules[0].criteria.len(), 2);
        assert_eq!(config.senders[0].daily_limit, 40);
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/outreach.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let content = format!("{}\n[crawler]\nmax-pages = 0\n", MINIMAL);
        let file = create_temp_config(&content);
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        let hash2 = compute_config_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }
}
