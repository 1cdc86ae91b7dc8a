//! Deterministic call fingerprints.
//!
//! A fingerprint names a call record on disk as `<function>/<label>.<hash>`.
//! The label is a lossy, human-readable rendering of the arguments that keeps
//! cache directories browsable; the hash is an MD5 digest over the serialized
//! arguments and is what actually distinguishes calls.

use std::fmt;

use crate::codec::Codec;
use crate::error::CacheError;
use crate::hash::ContentHash;
use crate::value::{CallArgs, Value};

/// Maximum length, in characters, of one rendered argument in the label.
pub const FRAGMENT_MAX_LEN: usize = 20;

/// Maximum length, in bytes, of the whole label.
const LABEL_MAX_BYTES: usize = 200;

/// Appended to a fragment or label that was cut short.
const TRUNCATION_MARKER: char = '*';

/// Identifies one call of one function.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    function: String,
    label: String,
    hash: ContentHash,
}

impl Fingerprint {
    /// Assembles a fingerprint from already computed parts.
    ///
    /// The function name and label each become part of a single directory
    /// name, so neither may contain a path separator, and the function name
    /// may not be empty, `.` or `..`.
    pub fn from_parts(
        function: impl Into<String>,
        label: impl Into<String>,
        hash: ContentHash,
    ) -> Result<Self, CacheError> {
        let function = function.into();
        let label = label.into();
        validate_function_name(&function)?;
        if has_separator(&label) {
            return Err(CacheError::InvalidState {
                state: label,
                reason: "label contains a path separator".to_string(),
            });
        }
        Ok(Self {
            function,
            label,
            hash,
        })
    }

    /// Recovers a fingerprint from a state name as returned by
    /// [`CallStore::list_states`](crate::store::CallStore::list_states).
    ///
    /// The hash is the last `.`-separated fragment of the state.
    pub fn from_state(function: &str, state: &str) -> Result<Self, CacheError> {
        let (label, hex) = match state.rsplit_once('.') {
            Some((label, hex)) => (label, hex),
            None => ("", state),
        };
        let hash = ContentHash::from_hex(hex).ok_or_else(|| CacheError::InvalidState {
            state: state.to_string(),
            reason: "last fragment is not a content hash".to_string(),
        })?;
        Self::from_parts(function, label, hash)
    }

    /// Parses a full identifier of the form `function/state`.
    pub fn parse_id(id: &str) -> Result<Self, CacheError> {
        let (function, state) = id.split_once('/').ok_or_else(|| CacheError::InvalidState {
            state: id.to_string(),
            reason: "expected 'function/state'".to_string(),
        })?;
        Self::from_state(function, state)
    }

    /// The logical call site.
    pub fn function(&self) -> &str {
        &self.function
    }

    /// The human-readable label (may be empty for calls without arguments).
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The content hash over the serialized arguments.
    pub fn hash(&self) -> ContentHash {
        self.hash
    }

    /// The record directory name: `label.hash`, or just `hash` without a label.
    pub fn state(&self) -> String {
        if self.label.is_empty() {
            self.hash.to_string()
        } else {
            format!("{}.{}", self.label, self.hash)
        }
    }

    /// The full identifier: `function/state`.
    pub fn id(&self) -> String {
        format!("{}/{}", self.function, self.state())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.function, self.state())
    }
}

/// Serialized call arguments, in the order they are hashed and stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SerializedCall {
    /// Positional arguments in call order.
    pub positional: Vec<Vec<u8>>,
    /// Named arguments sorted by name.
    pub named: Vec<(String, Vec<u8>)>,
}

/// Fingerprints a call, returning the fingerprint and the serialized
/// arguments it was derived from.
///
/// Codec failures are propagated unchanged.
pub fn fingerprint(
    codec: &dyn Codec,
    function: &str,
    args: &CallArgs,
) -> Result<(Fingerprint, SerializedCall), CacheError> {
    let mut named: Vec<&(String, Value)> = args.named().iter().collect();
    named.sort_by(|a, b| a.0.cmp(&b.0));

    let positional = args
        .positional()
        .iter()
        .map(|v| codec.serialize(v))
        .collect::<Result<Vec<_>, _>>()?;
    let named = named
        .into_iter()
        .map(|(name, v)| Ok((name.clone(), codec.serialize(v)?)))
        .collect::<Result<Vec<_>, CacheError>>()?;
    let call = SerializedCall { positional, named };

    let label = label_for(args);
    let hash = hash_call(&call);
    Ok((Fingerprint::from_parts(function, label, hash)?, call))
}

/// Hashes positional bytes in order, then each named argument's name and
/// value bytes in name order.
pub fn hash_call(call: &SerializedCall) -> ContentHash {
    let mut buf = Vec::new();
    for bytes in &call.positional {
        buf.extend_from_slice(bytes);
    }
    for (name, bytes) in &call.named {
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(bytes);
    }
    ContentHash::from_bytes(&buf)
}

fn label_for(args: &CallArgs) -> String {
    let mut named: Vec<&(String, Value)> = args.named().iter().collect();
    named.sort_by(|a, b| a.0.cmp(&b.0));

    let fragments: Vec<String> = args
        .positional()
        .iter()
        .map(|v| bounded_str(&v.to_string(), FRAGMENT_MAX_LEN))
        .chain(
            named
                .into_iter()
                .map(|(name, v)| format!("{name}={}", bounded_str(&v.to_string(), FRAGMENT_MAX_LEN))),
        )
        .map(|fragment| path_safe(&fragment))
        .collect();

    let label = fragments.join(".");
    if label.len() <= LABEL_MAX_BYTES {
        return label;
    }
    let mut cut = LABEL_MAX_BYTES - TRUNCATION_MARKER.len_utf8();
    while !label.is_char_boundary(cut) {
        cut -= 1;
    }
    let mut short = label[..cut].to_string();
    short.push(TRUNCATION_MARKER);
    short
}

/// Collapses whitespace runs to single spaces, trims, and cuts the result to
/// `max_len` characters with a trailing marker.
pub fn bounded_str(text: &str, max_len: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if max_len == 0 || collapsed.chars().count() <= max_len {
        return collapsed;
    }
    let mut out: String = collapsed.chars().take(max_len - 1).collect();
    out.push(TRUNCATION_MARKER);
    out
}

/// Checks that `name` can be used as a function directory under the root.
pub fn validate_function_name(name: &str) -> Result<(), CacheError> {
    if name.is_empty() || name == "." || name == ".." || has_separator(name) {
        return Err(CacheError::InvalidFunctionName {
            name: name.to_string(),
        });
    }
    Ok(())
}

fn has_separator(text: &str) -> bool {
    text.contains(['/', '\\', '\0'])
}

fn path_safe(fragment: &str) -> String {
    fragment
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect()
}
