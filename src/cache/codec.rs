//! Value encoding for the remote store.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CacheError, Result};

/// Explicit serialize/deserialize pair used by `RemoteCache`.
///
/// Implementations must satisfy `decode(encode(v)) == v` for every value
/// they accept.
pub trait Codec<V>: Send + Sync {
    fn encode(&self, value: &V) -> Result<Vec<u8>>;
    fn decode(&self, bytes: &[u8]) -> Result<V>;
}

/// JSON encoding through serde.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl<V> Codec<V> for JsonCodec
where
    V: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &V) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| CacheError::Serialization(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<V> {
        serde_json::from_slice(bytes).map_err(|e| CacheError::Serialization(e.to_string()))
    }
}
