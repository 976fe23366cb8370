//! # JSON <-> Protobuf Codec
//!
//! The schema codec validates values against Protobuf message descriptors.
//!
//! 1. **Encoder (JSON -> Proto)**:
//!    - Looks up the request's schema in the `DescriptorPool`.
//!    - Uses `prost_reflect::DynamicMessage` to validate the fields against it.
//!    - Serializes the valid message into Protobuf binary.
//!
//! 2. **Decoder (Proto -> JSON)**:
//!    - Decodes the bytes into a `DynamicMessage` of the requested response schema.
//!    - Rejects payloads carrying field numbers the schema does not declare, and payloads
//!      that set none of the declared fields.
//!    - Converts the message back into a `serde_json::Value` using proto field names and
//!      numeric 64-bit integers. Only fields present on the wire are rendered, so a value
//!      decodes to what was encoded. Proto3 cannot tell a default-valued field (`0`, `""`,
//!      `[]`) from an absent one, both come back absent.
use super::{RequestValue, Serializer, Shape};
use crate::error::{DecodingError, EncodingError};
use bytes::Bytes;
use prost::Message;
use prost_reflect::{
    DescriptorError, DescriptorPool, DynamicMessage, MessageDescriptor, ReflectMessage,
    SerializeOptions,
};
use serde_json::Value;

/// Protobuf codec driven by a runtime descriptor pool.
#[derive(Debug, Clone)]
pub struct SchemaSerializer {
    pool: DescriptorPool,
    options: SerializeOptions,
}

impl SchemaSerializer {
    pub fn new(pool: DescriptorPool) -> Self {
        let options = SerializeOptions::new()
            .use_proto_field_name(true)
            .skip_default_fields(true)
            .stringify_64_bit_integers(false);

        Self { pool, options }
    }

    /// Builds the codec from the bytes of an encoded `FileDescriptorSet`.
    pub fn from_file_descriptor_set(bytes: &[u8]) -> Result<Self, DescriptorError> {
        Ok(Self::new(DescriptorPool::decode(bytes)?))
    }

    pub fn pool(&self) -> &DescriptorPool {
        &self.pool
    }

    fn message(&self, name: &str) -> Option<MessageDescriptor> {
        self.pool.get_message_by_name(name)
    }
}

impl Serializer for SchemaSerializer {
    fn serialize(&self, request: &RequestValue) -> Result<Bytes, EncodingError> {
        let Shape::Schema(name) = &request.shape else {
            return Err(EncodingError::MissingSchema);
        };

        let descriptor = self
            .message(name)
            .ok_or_else(|| EncodingError::UnknownSchema(name.clone()))?;

        // serde_json::Value implements IntoDeserializer, so the fields can be fed directly.
        let message = DynamicMessage::deserialize(descriptor, Value::Object(request.fields.clone()))
            .map_err(|source| EncodingError::SchemaMismatch {
                schema: name.clone(),
                source,
            })?;

        Ok(Bytes::from(message.encode_to_vec()))
    }

    fn deserialize(&self, data: &[u8], shape: &Shape) -> Result<Value, DecodingError> {
        let Shape::Schema(name) = shape else {
            return Err(DecodingError::MissingSchema);
        };

        let invalid = |reason: String| DecodingError::SchemaValidation {
            schema: name.clone(),
            reason,
        };

        let descriptor = self
            .message(name)
            .ok_or_else(|| invalid("schema not found in the descriptor pool".to_string()))?;

        let message = DynamicMessage::decode(descriptor, data).map_err(|e| invalid(e.to_string()))?;

        if let Some(field) = message.unknown_fields().next() {
            return Err(invalid(format!(
                "field number {} is not declared by the schema",
                field.number()
            )));
        }

        if message.descriptor().fields().next().is_some() && message.fields().next().is_none() {
            return Err(invalid("payload sets none of the schema's fields".to_string()));
        }

        message
            .serialize_with_options(serde_json::value::Serializer, &self.options)
            .map_err(DecodingError::Malformed)
    }
}
