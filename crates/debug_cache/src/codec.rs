//! Serialization of values to and from the bytes stored on disk.

use crate::error::CodecError;
use crate::value::Value;

/// Converts values to bytes and back.
///
/// Implementations must round-trip exactly: `deserialize(serialize(v))` is
/// structurally equal to `v`. The byte form is also what the comparator
/// falls back to for opaque values, so encoding should be deterministic.
pub trait Codec: Send + Sync {
    /// Encodes a value.
    fn serialize(&self, value: &Value) -> Result<Vec<u8>, CodecError>;

    /// Decodes a value previously produced by [`serialize`](Self::serialize).
    fn deserialize(&self, bytes: &[u8]) -> Result<Value, CodecError>;
}

/// Upper bound on the bytes a single decode may claim.
///
/// A corrupt length prefix would otherwise make bincode allocate whatever
/// size it encodes; with the limit it fails with a decode error instead.
pub const DECODE_LIMIT: usize = 1 << 30;

/// The default codec: bincode with the standard configuration, decoding
/// under [`DECODE_LIMIT`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl Codec for BincodeCodec {
    fn serialize(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        bincode::serde::encode_to_vec(value, bincode::config::standard()).map_err(|e| {
            CodecError::Encode {
                reason: e.to_string(),
            }
        })
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        let (value, read): (Value, usize) =
            bincode::serde::decode_from_slice(
                bytes,
                bincode::config::standard().with_limit::<DECODE_LIMIT>(),
            )
            .map_err(|e| CodecError::Decode {
                reason: e.to_string(),
            })?;
        if read != bytes.len() {
            return Err(CodecError::Decode {
                reason: format!("{} trailing bytes", bytes.len() - read),
            });
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{ColumnData, Frame, Series};
    use std::collections::BTreeMap;

    fn roundtrip(value: &Value) -> Value {
        let codec = BincodeCodec;
        let bytes = codec.serialize(value).unwrap();
        codec.deserialize(&bytes).unwrap()
    }

    #[test]
    fn frame_survives_roundtrip() {
        let frame = Frame::new()
            .with_column("x", ColumnData::Float(vec![1.0, 2.5]))
            .with_column("name", ColumnData::Str(vec!["a".into(), "b".into()]));
        let value = Value::Frame(frame);
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn nested_collections_survive_roundtrip() {
        let mut map = BTreeMap::new();
        map.insert("xs".to_string(), Value::from(vec![1i64, 2, 3]));
        map.insert("t".to_string(), Value::Tuple(vec![Value::Null, Value::Bool(true)]));
        let series = Series::new(ColumnData::Int(vec![7])).named("s");
        let value = Value::List(vec![Value::Map(map), Value::Series(series)]);
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn encoding_is_deterministic() {
        let codec = BincodeCodec;
        let value = Value::from(vec!["a", "b"]);
        assert_eq!(codec.serialize(&value).unwrap(), codec.serialize(&value).unwrap());
    }

    #[test]
    fn garbage_fails_to_decode() {
        let err = BincodeCodec.deserialize(&[0xff, 0xff, 0xff]).unwrap_err();
        assert!(matches!(err, CodecError::Decode { .. }));
    }

    #[test]
    fn huge_length_prefix_fails_without_allocating() {
        // Str variant, then a u64 length of 2^44.
        let mut bytes = vec![4, 253];
        bytes.extend_from_slice(&(1u64 << 44).to_le_bytes());
        let err = BincodeCodec.deserialize(&bytes).unwrap_err();
        assert!(matches!(err, CodecError::Decode { .. }));
    }

    #[test]
    fn trailing_bytes_rejected() {
        let codec = BincodeCodec;
        let mut bytes = codec.serialize(&Value::Int(1)).unwrap();
        bytes.push(0);
        assert!(codec.deserialize(&bytes).is_err());
    }
}
