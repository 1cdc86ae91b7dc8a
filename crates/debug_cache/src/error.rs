//! Error types for cache operations.

use std::path::PathBuf;

/// Errors that can occur during cache operations.
///
/// Lookups never produce this type for a missing or unreadable result: those
/// are reported as [`CacheMiss`] and recovered locally by the facade.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while reading or writing cache files.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A value could not be serialized or deserialized.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A replayed or substituted call has no stored record.
    #[error("no recorded call {id}")]
    NoSuchRecord {
        /// The record identifier (`function/state`).
        id: String,
    },

    /// A state or record identifier could not be parsed.
    #[error("invalid state '{state}': {reason}")]
    InvalidState {
        /// The offending state string.
        state: String,
        /// Description of the problem.
        reason: String,
    },

    /// A function name cannot be used as a single directory name.
    #[error("invalid function name '{name}'")]
    InvalidFunctionName {
        /// The offending function name.
        name: String,
    },

    /// A named argument cannot be used as part of a file name.
    #[error("invalid argument name '{name}'")]
    InvalidArgName {
        /// The offending argument name.
        name: String,
    },
}

/// Reasons a stored result could not be returned.
///
/// Every variant is an ordinary cache miss: the caller recomputes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheMiss {
    /// No result file exists for the fingerprint.
    #[error("no stored result")]
    NotFound,

    /// The result file exists but could not be read or decoded.
    #[error("stored result is unreadable: {reason}")]
    Corrupt {
        /// Description of the read or decode failure.
        reason: String,
    },

    /// The result's expiry time has passed; the record was purged.
    #[error("stored result has expired")]
    Expired,
}

/// Errors produced by a [`Codec`](crate::codec::Codec).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// A value could not be encoded.
    #[error("failed to serialize value: {reason}")]
    Encode {
        /// Description of the encoding failure.
        reason: String,
    },

    /// Bytes could not be decoded into a value.
    #[error("failed to deserialize value: {reason}")]
    Decode {
        /// Description of the decoding failure.
        reason: String,
    },
}
