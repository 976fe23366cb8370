use super::{RequestValue, Serializer, Shape};
use crate::error::{DecodingError, EncodingError};
use bytes::Bytes;
use serde_json::Value;

/// Schemaless JSON codec. Requests are encoded as a JSON object of their fields and
/// responses are decoded into whatever JSON value the peer sent.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize(&self, request: &RequestValue) -> Result<Bytes, EncodingError> {
        serde_json::to_vec(&request.fields)
            .map(Bytes::from)
            .map_err(EncodingError::Json)
    }

    // The shape is advisory for this codec.
    fn deserialize(&self, data: &[u8], _shape: &Shape) -> Result<Value, DecodingError> {
        serde_json::from_slice(data).map_err(DecodingError::Malformed)
    }
}
