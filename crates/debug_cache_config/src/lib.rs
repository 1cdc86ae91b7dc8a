//! Parsing and validation of `debug_cache.toml` configuration files.
//!
//! This crate reads the configuration file into a strongly-typed
//! [`ConfigFile`] and converts it into the cache's
//! [`CacheOptions`](debug_cache::CacheOptions).

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_file, load_config_from_str, CONFIG_FILE_NAME};
pub use types::*;
