use crate::config::types::{Config, CrawlerConfig, HttpConfig, OutputConfig};
use crate::ConfigError;
use url::Url;

const MAX_WORKERS: usize = 256;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_http_config(&config.http)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the crawl target and worker pools
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    validate_host(&config.host)?;

    if !config.catalog_path.starts_with('/') {
        return Err(ConfigError::Validation(format!(
            "catalog-path must start with '/', got '{}'",
            config.catalog_path
        )));
    }

    for (name, value) in [
        ("max-qualification-workers", config.max_qualification_workers),
        ("max-module-workers", config.max_module_workers),
    ] {
        if value < 1 || value > MAX_WORKERS {
            return Err(ConfigError::Validation(format!(
                "{} must be between 1 and {}, got {}",
                name, MAX_WORKERS, value
            )));
        }
    }

    if config.cache_flush_interval < 1 {
        return Err(ConfigError::Validation(
            "cache-flush-interval must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates that the host is a bare http(s) origin
fn validate_host(host: &str) -> Result<(), ConfigError> {
    let url =
        Url::parse(host).map_err(|e| ConfigError::InvalidUrl(format!("Invalid host: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "host must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "host '{}' has no host name",
            host
        )));
    }

    if url.path() != "/" || url.query().is_some() {
        return Err(ConfigError::Validation(format!(
            "host '{}' must not carry a path or query; use catalog-path instead",
            host
        )));
    }

    Ok(())
}

fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs < 1 || config.connect_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeouts must be >= 1s, got timeout-secs={} connect-timeout-secs={}",
            config.timeout_secs, config.connect_timeout_secs
        )));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}
