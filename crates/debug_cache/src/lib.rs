//! Development-time memoization and regression-detection cache.
//!
//! Function calls are fingerprinted from their serialized arguments and stored
//! on disk as call records. A [`DebugCache`] can then either return a stored
//! result without recomputing it ([`Memoized`]), or recompute and compare the
//! new result against the stored baseline ([`Checked`], [`DebugCache::replay`]),
//! reporting any drift through an [`InspectionHook`].

#![warn(missing_docs)]

pub mod codec;
pub mod compare;
pub mod error;
pub mod facade;
pub mod fingerprint;
pub mod hash;
pub mod hook;
pub mod options;
pub mod store;
pub mod value;

pub use codec::{BincodeCodec, Codec};
pub use compare::{Comparator, Verdict, DEFAULT_EPSILON};
pub use error::{CacheError, CacheMiss, CodecError};
pub use facade::{CheckReport, CheckStatus, Checked, DebugCache, Memoized};
pub use fingerprint::{Fingerprint, SerializedCall};
pub use hash::ContentHash;
pub use hook::{AcceptAllHook, FnHook, HookAction, InspectionHook, Mismatch, MismatchKind, NoopHook};
pub use options::CacheOptions;
pub use store::{CallStore, Retention};
pub use value::{CallArgs, Column, ColumnData, DType, Frame, Series, Shape, Value};
