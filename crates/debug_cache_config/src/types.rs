//! Configuration data types deserialized from `debug_cache.toml`.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use debug_cache::{CacheOptions, Retention, DEFAULT_EPSILON};

/// The whole configuration file.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    /// Store and comparison settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Checked-call substitutions, `"function/state" = "function/state"`.
    #[serde(default)]
    pub substitutions: BTreeMap<String, String>,
}

impl ConfigFile {
    /// Converts the file into cache options. Unset values keep their defaults.
    pub fn to_options(&self) -> CacheOptions {
        let mut options = CacheOptions::default()
            .with_epsilon(self.cache.epsilon)
            .with_strict(self.cache.strict)
            .with_verbose(self.cache.verbose);
        if let Some(root) = &self.cache.root {
            options.root = root.clone();
        }
        if let Some(ttl) = self.cache.ttl {
            options.retention = Retention::Ttl(ttl.duration());
        }
        options.substitutions = self.substitutions.clone();
        options
    }
}

/// The `[cache]` table.
#[derive(Debug, Deserialize)]
pub struct CacheConfig {
    /// Root directory of the store; defaults to `<temp dir>/debug_cache`.
    #[serde(default)]
    pub root: Option<PathBuf>,
    /// How long results stay valid; absent means forever.
    #[serde(default, deserialize_with = "deserialize_ttl")]
    pub ttl: Option<Ttl>,
    /// Absolute tolerance for float columns.
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    /// Report missing baselines instead of recording them.
    #[serde(default = "default_strict")]
    pub strict: bool,
    /// List identical mapping items in explanations.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: None,
            ttl: None,
            epsilon: default_epsilon(),
            strict: default_strict(),
            verbose: false,
        }
    }
}

fn default_epsilon() -> f64 {
    DEFAULT_EPSILON
}

fn default_strict() -> bool {
    true
}

/// A time-to-live, written as `"30s"`, `"15m"`, `"2h"`, `"7d"` or a bare
/// number of seconds.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Ttl(Duration);

impl Ttl {
    /// Creates a TTL from a duration.
    pub fn new(duration: Duration) -> Self {
        Self(duration)
    }

    /// Returns the duration.
    pub fn duration(&self) -> Duration {
        self.0
    }
}

impl fmt::Debug for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ttl({self})")
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.0.as_secs();
        if secs != 0 && secs % 86_400 == 0 {
            write!(f, "{}d", secs / 86_400)
        } else if secs != 0 && secs % 3_600 == 0 {
            write!(f, "{}h", secs / 3_600)
        } else if secs != 0 && secs % 60 == 0 {
            write!(f, "{}m", secs / 60)
        } else {
            write!(f, "{secs}s")
        }
    }
}

/// Error type for parsing TTL strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTtlError {
    /// The input string that failed to parse.
    pub input: String,
}

impl fmt::Display for ParseTtlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid ttl: '{}'", self.input)
    }
}

impl std::error::Error for ParseTtlError {}

impl FromStr for Ttl {
    type Err = ParseTtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let err = || ParseTtlError {
            input: s.to_string(),
        };

        let lower = s.to_ascii_lowercase();
        let (num, unit) = match lower.char_indices().last() {
            Some((i, c)) if c.is_ascii_alphabetic() => (&lower[..i], c),
            _ => (lower.as_str(), 's'),
        };
        let scale = match unit {
            's' => 1,
            'm' => 60,
            'h' => 3_600,
            'd' => 86_400,
            _ => return Err(err()),
        };
        let count: u64 = num.trim().parse().map_err(|_| err())?;
        let secs = count.checked_mul(scale).ok_or_else(err)?;
        Ok(Ttl(Duration::from_secs(secs)))
    }
}

/// Accepts a TTL string or a non-negative integer number of seconds.
fn deserialize_ttl<'de, D>(deserializer: D) -> Result<Option<Ttl>, D::Error>
where
    D: Deserializer<'de>,
{
    struct TtlVisitor;

    impl<'de> Visitor<'de> for TtlVisitor {
        type Value = Option<Ttl>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration like \"2h\" or a number of seconds")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            v.parse().map(Some).map_err(E::custom)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(Ttl(Duration::from_secs(v))))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            u64::try_from(v)
                .map(|secs| Some(Ttl(Duration::from_secs(secs))))
                .map_err(|_| E::custom(format!("ttl must not be negative, got {v}")))
        }
    }

    deserializer.deserialize_any(TtlVisitor)
}
