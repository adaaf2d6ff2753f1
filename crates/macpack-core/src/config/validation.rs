//! Configuration validation

use tracing::debug;

use crate::error::{ConfigError, Result};

use super::defaults::DMG_FORMATS;
use super::types::{Config, MacOptions};

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    debug!("validating configuration");
    validate_product(config)?;
    validate_mac_options("mac", &config.mac)?;
    validate_mac_options("mas", &config.mas)?;
    debug!("configuration validation passed");
    Ok(())
}

fn validate_product(config: &Config) -> Result<()> {
    if config.product_name.trim().is_empty() {
        return Err(ConfigError::MissingField("product_name".to_string()));
    }

    if config.product_name.contains('/') {
        return Err(ConfigError::invalid(
            "product_name",
            "must not contain a path separator",
        ));
    }

    if config.version.is_empty() {
        return Err(ConfigError::MissingField("version".to_string()));
    }

    semver::Version::parse(&config.version).map_err(|e| {
        ConfigError::invalid("version", format!("'{}' is not valid semver: {}", config.version, e))
    })?;

    Ok(())
}

fn validate_mac_options(section: &str, options: &MacOptions) -> Result<()> {
    if let Some(size) = options.dmg.icon_size {
        if size == 0 {
            return Err(ConfigError::invalid(
                format!("{}.dmg.icon_size", section),
                "must be greater than zero",
            ));
        }
    }

    if let Some(format) = &options.dmg.format {
        if !DMG_FORMATS.contains(&format.as_str()) {
            return Err(ConfigError::invalid(
                format!("{}.dmg.format", section),
                format!("must be one of: {}", DMG_FORMATS.join(", ")),
            ));
        }
    }

    Ok(())
}
