//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::ConfigFile;
use debug_cache::Fingerprint;
use std::path::Path;

/// File name looked up by [`load_config`].
pub const CONFIG_FILE_NAME: &str = "debug_cache.toml";

/// Loads and validates `<dir>/debug_cache.toml`.
pub fn load_config(dir: &Path) -> Result<ConfigFile, ConfigError> {
    load_config_file(&dir.join(CONFIG_FILE_NAME))
}

/// Loads and validates a configuration file at an explicit path.
pub fn load_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    load_config_from_str(&content)
}

/// Parses and validates a configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<ConfigFile, ConfigError> {
    let config: ConfigFile =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Checks value ranges and substitution ids.
fn validate_config(config: &ConfigFile) -> Result<(), ConfigError> {
    let epsilon = config.cache.epsilon;
    if !epsilon.is_finite() || epsilon < 0.0 {
        return Err(ConfigError::InvalidSetting {
            key: "epsilon",
            reason: format!("must be a finite, non-negative number, got {epsilon}"),
        });
    }
    if let Some(ttl) = config.cache.ttl {
        if ttl.duration().is_zero() {
            return Err(ConfigError::InvalidSetting {
                key: "ttl",
                reason: "must be greater than zero".to_string(),
            });
        }
    }
    for (from, to) in &config.substitutions {
        for id in [from, to] {
            Fingerprint::parse_id(id).map_err(|e| ConfigError::InvalidSubstitution {
                from: from.clone(),
                to: to.clone(),
                source: e,
            })?;
        }
    }
    Ok(())
}
