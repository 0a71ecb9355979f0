use crate::config::types::{
    AiConfig, Config, CrawlerConfig, ExtractionConfig, HostedCrawlerConfig, ReviewConfig,
    RuleEntry, SenderEntry, SendingConfig, SuppressionConfig, UserAgentConfig,
};
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;

    if config.database.path.is_empty() {
        return Err(ConfigError::Validation(
            "database path cannot be empty".to_string(),
        ));
    }

    validate_extraction_config(&config.extraction)?;

    for domain in config
        .validation
        .disposable_domains
        .iter()
        .chain(&config.validation.extra_disposable_domains)
    {
        validate_domain_string(domain)?;
    }

    validate_suppression_config(&config.suppression)?;
    validate_sending_config(&config.sending)?;
    validate_review_config(&config.review)?;

    if let Some(ai) = &config.ai {
        validate_ai_config(ai)?;
    }
    if let Some(hosted) = &config.hosted_crawler {
        validate_hosted_crawler_config(hosted)?;
    }

    validate_rules(&config.rules)?;
    validate_senders(&config.senders)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    // max_depth >= 0 is always true for u32, so no check needed

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.max_concurrent_fetches < 1 || config.max_concurrent_fetches > 64 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_fetches must be between 1 and 64, got {}",
            config.max_concurrent_fetches
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.crawl_timeout_secs < config.request_timeout_secs {
        return Err(ConfigError::Validation(format!(
            "crawl_timeout_secs ({}) must be >= request_timeout_secs ({})",
            config.crawl_timeout_secs, config.request_timeout_secs
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email("contact_email", &config.contact_email)?;

    Ok(())
}

/// Compiles every name pattern so a bad table fails at load time
fn validate_extraction_config(config: &ExtractionConfig) -> Result<(), ConfigError> {
    for pattern in &config.name_patterns {
        let regex = Regex::new(pattern).map_err(|e| ConfigError::Regex {
            pattern: pattern.clone(),
            message: e.to_string(),
        })?;

        if !regex.capture_names().any(|name| name == Some("name")) {
            return Err(ConfigError::Regex {
                pattern: pattern.clone(),
                message: "pattern must define a `name` capture group".to_string(),
            });
        }
    }

    if config.context_chars == 0 {
        return Err(ConfigError::Validation(
            "context_chars must be >= 1".to_string(),
        ));
    }

    if config.page_types.iter().any(|entry| entry.keywords.is_empty()) {
        return Err(ConfigError::Validation(
            "every page-type entry needs at least one keyword".to_string(),
        ));
    }

    Ok(())
}

fn validate_suppression_config(config: &SuppressionConfig) -> Result<(), ConfigError> {
    if config.contact_cooldown_days < 0 || config.site_window_days < 0 {
        return Err(ConfigError::Validation(
            "suppression windows cannot be negative".to_string(),
        ));
    }

    if config.site_max_sends < 1 || config.domain_max_sends < 1 {
        return Err(ConfigError::Validation(
            "site_max_sends and domain_max_sends must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_sending_config(config: &SendingConfig) -> Result<(), ConfigError> {
    if config.window_end_hour > 24 || config.window_start_hour >= config.window_end_hour {
        return Err(ConfigError::Validation(format!(
            "sending window must satisfy start < end <= 24, got {}..{}",
            config.window_start_hour, config.window_end_hour
        )));
    }

    if !(-12..=14).contains(&config.utc_offset_hours) {
        return Err(ConfigError::Validation(format!(
            "utc_offset_hours must be between -12 and 14, got {}",
            config.utc_offset_hours
        )));
    }

    if !(0.0..=1.0).contains(&config.health_threshold) {
        return Err(ConfigError::Validation(format!(
            "health_threshold must be between 0.0 and 1.0, got {}",
            config.health_threshold
        )));
    }

    if config.send_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "send_timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_review_config(config: &ReviewConfig) -> Result<(), ConfigError> {
    let priorities = [
        ("base_priority", config.base_priority),
        ("contact_priority_threshold", config.contact_priority_threshold),
        ("contact_priority_floor", config.contact_priority_floor),
        ("uncontacted_site_floor", config.uncontacted_site_floor),
        ("ai_assisted_floor", config.ai_assisted_floor),
    ];

    for (name, value) in priorities {
        if value > 100 {
            return Err(ConfigError::Validation(format!(
                "{} must be between 0 and 100, got {}",
                name, value
            )));
        }
    }

    if config.retention_days < 1 {
        return Err(ConfigError::Validation(
            "retention_days must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_ai_config(config: &AiConfig) -> Result<(), ConfigError> {
    Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid ai base-url: {}", e)))?;

    if config.model.is_empty() {
        return Err(ConfigError::Validation(
            "ai model cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_hosted_crawler_config(config: &HostedCrawlerConfig) -> Result<(), ConfigError> {
    Url::parse(&config.base_url).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid hosted-crawler base-url: {}", e))
    })?;

    if config.max_polls < 1 {
        return Err(ConfigError::Validation(
            "hosted-crawler max-polls must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Rule criteria are type-checked when rules are parsed; here only names
fn validate_rules(rules: &[RuleEntry]) -> Result<(), ConfigError> {
    for rule in rules {
        if rule.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "rule name cannot be empty".to_string(),
            ));
        }
    }

    for (i, rule) in rules.iter().enumerate() {
        if rules[..i].iter().any(|other| other.name == rule.name) {
            return Err(ConfigError::Validation(format!(
                "duplicate rule name '{}'",
                rule.name
            )));
        }
    }

    Ok(())
}

fn validate_senders(senders: &[SenderEntry]) -> Result<(), ConfigError> {
    for sender in senders {
        validate_email("sender from-address", &sender.from_address)?;

        if sender.daily_limit < 1 {
            return Err(ConfigError::Validation(format!(
                "sender '{}' must have daily-limit >= 1",
                sender.name
            )));
        }
    }
    Ok(())
}

/// Validates a domain string
fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    // Check for invalid characters
    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' must contain at least one dot (e.g., 'example.com')",
            domain
        )));
    }

    Ok(())
}

/// Basic email validation for addresses that appear in the config file
fn validate_email(field: &str, email: &str) -> Result<(), ConfigError> {
    if !crate::validation::is_valid_email(email) {
        return Err(ConfigError::Validation(format!(
            "Invalid {}: '{}'",
            field, email
        )));
    }
    Ok(())
}
