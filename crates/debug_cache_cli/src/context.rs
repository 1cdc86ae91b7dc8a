//! Opening the cache selected by the command line and configuration.

use std::error::Error;

use debug_cache::DebugCache;
use debug_cache_config::{load_config, load_config_file, ConfigFile, CONFIG_FILE_NAME};
use tracing::debug;

use crate::GlobalArgs;

/// Loads the configuration and opens the cache it describes.
///
/// An explicit `--config` must exist; otherwise `./debug_cache.toml` is used
/// when present, and built-in defaults when not. `--root` wins over both.
pub fn open_cache(global: &GlobalArgs) -> Result<DebugCache, Box<dyn Error>> {
    let config = match &global.config {
        Some(path) => load_config_file(path)?,
        None => {
            let cwd = std::env::current_dir()?;
            if cwd.join(CONFIG_FILE_NAME).is_file() {
                load_config(&cwd)?
            } else {
                ConfigFile::default()
            }
        }
    };

    let mut options = config.to_options();
    if let Some(root) = &global.root {
        options.root = root.clone();
    }
    debug!(root = %options.root.display(), "opening cache");
    Ok(DebugCache::new(options)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use debug_cache::Retention;
    use std::time::Duration;

    #[test]
    fn root_flag_overrides_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("custom.toml");
        std::fs::write(&config, "[cache]\nroot = \"/nowhere\"\nttl = \"1m\"\n").unwrap();

        let global = GlobalArgs {
            root: Some(dir.path().join("store")),
            config: Some(config),
        };
        let cache = open_cache(&global).unwrap();
        assert_eq!(cache.store().root(), dir.path().join("store"));
        assert_eq!(
            cache.store().retention(),
            Retention::Ttl(Duration::from_secs(60))
        );
    }

    #[test]
    fn missing_explicit_config_fails() {
        let dir = tempfile::tempdir().unwrap();
        let global = GlobalArgs {
            root: None,
            config: Some(dir.path().join("absent.toml")),
        };
        assert!(open_cache(&global).is_err());
    }
}
