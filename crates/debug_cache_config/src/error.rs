//! Error types for configuration loading and validation.

use std::path::PathBuf;

use debug_cache::CacheError;

/// Errors that can occur when loading or validating a `debug_cache.toml` file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration {path}: {source}")]
    Read {
        /// The file that was being read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// A `[cache]` setting is out of range.
    #[error("invalid value for `cache.{key}`: {reason}")]
    InvalidSetting {
        /// The setting name within `[cache]`.
        key: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// A `[substitutions]` entry is not a pair of `function/state` ids.
    #[error("invalid substitution '{from}' = '{to}': {source}")]
    InvalidSubstitution {
        /// The id being substituted.
        from: String,
        /// The id it is checked against.
        to: String,
        /// Why one of the ids failed to parse.
        source: CacheError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_error_names_the_file() {
        let err = ConfigError::Read {
            path: PathBuf::from("/work/debug_cache.toml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert_eq!(
            err.to_string(),
            "failed to read configuration /work/debug_cache.toml: not found"
        );
    }

    #[test]
    fn invalid_setting_names_the_key() {
        let err = ConfigError::InvalidSetting {
            key: "ttl",
            reason: "must be greater than zero".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid value for `cache.ttl`: must be greater than zero"
        );
    }

    #[test]
    fn invalid_substitution_keeps_the_parse_failure() {
        let err = ConfigError::InvalidSubstitution {
            from: "fast_load".to_string(),
            to: "load/x.0123".to_string(),
            source: CacheError::InvalidState {
                state: "fast_load".to_string(),
                reason: "expected 'function/state'".to_string(),
            },
        };
        let msg = err.to_string();
        assert!(msg.starts_with("invalid substitution 'fast_load' = 'load/x.0123'"));
        assert!(msg.ends_with("expected 'function/state'"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
