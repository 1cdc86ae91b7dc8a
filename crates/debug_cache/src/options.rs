//! Construction options for a [`DebugCache`](crate::facade::DebugCache).

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::compare::DEFAULT_EPSILON;
use crate::store::Retention;

/// Settings for a cache instance.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheOptions {
    /// Root directory of the call store.
    pub root: PathBuf,
    /// How long stored results stay valid.
    pub retention: Retention,
    /// Absolute tolerance for float columns.
    pub epsilon: f64,
    /// Whether checked calls without a baseline are reported instead of
    /// silently recorded.
    pub strict: bool,
    /// List identical mapping items in diff explanations.
    pub verbose: bool,
    /// Maps the `function/state` id of a checked call to the `function/state`
    /// id of the record it is checked against instead. Both ids are parsed
    /// when the cache is built.
    pub substitutions: BTreeMap<String, String>,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            root: default_root(),
            retention: Retention::Permanent,
            epsilon: DEFAULT_EPSILON,
            strict: true,
            verbose: false,
            substitutions: BTreeMap::new(),
        }
    }
}

impl CacheOptions {
    /// Options with the default settings rooted at `root`.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Sets the retention policy.
    pub fn with_retention(mut self, retention: Retention) -> Self {
        self.retention = retention;
        self
    }

    /// Sets the float tolerance.
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Sets strict mode.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Sets verbose explanations.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Makes checked calls with id `from` run against the record with id
    /// `to`. Both are `function/state` ids.
    pub fn with_substitution(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.substitutions.insert(from.into(), to.into());
        self
    }
}

/// `<temp dir>/debug_cache`.
pub fn default_root() -> PathBuf {
    std::env::temp_dir().join("debug_cache")
}
