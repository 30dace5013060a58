use crate::config::types::{Config, CrawlerConfig, OutputConfig, SourceConfig};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_source_config(&config.source)?;
    validate_crawler_config(&config.crawler)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the source URL and the document selectors
fn validate_source_config(config: &SourceConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.url)
        .map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid source url '{}': {}", config.url, e))
        })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "Source url '{}' must use http or https",
            config.url
        )));
    }

    for (name, selector) in [
        ("quote-selector", &config.quote_selector),
        ("text-selector", &config.text_selector),
        ("author-selector", &config.author_selector),
        ("tag-selector", &config.tag_selector),
        ("next-selector", &config.next_selector),
    ] {
        validate_selector(name, selector)?;
    }

    Ok(())
}

/// Validates pagination bounds and timeouts
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.page_timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "page_timeout_ms must be >= 100ms, got {}ms",
            config.page_timeout_ms
        )));
    }

    if config.poll_interval_ms < 10 || config.poll_interval_ms >= config.page_timeout_ms {
        return Err(ConfigError::Validation(format!(
            "poll_interval_ms must be >= 10ms and below page_timeout_ms ({}ms), got {}ms",
            config.page_timeout_ms, config.poll_interval_ms
        )));
    }

    if config.settle_delay_ms >= config.page_timeout_ms {
        return Err(ConfigError::Validation(format!(
            "settle_delay_ms must be below page_timeout_ms ({}ms), got {}ms",
            config.page_timeout_ms, config.settle_delay_ms
        )));
    }

    if config.empty_page_grace_ms >= config.page_timeout_ms {
        return Err(ConfigError::Validation(format!(
            "empty_page_grace_ms must be below page_timeout_ms ({}ms), got {}ms",
            config.page_timeout_ms, config.empty_page_grace_ms
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Checks that a selector is non-empty and parses as CSS
fn validate_selector(name: &str, selector: &str) -> Result<(), ConfigError> {
    if selector.trim().is_empty() {
        return Err(ConfigError::InvalidSelector(format!("{} cannot be empty", name)));
    }

    Selector::parse(selector)
        .map_err(|e| ConfigError::InvalidSelector(format!("{} '{}': {:?}", name, selector, e)))?;

    Ok(())
}
