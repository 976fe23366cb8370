//! # Serializers
//!
//! A [`Serializer`] turns a [`RequestValue`] into the bytes handed to a transport and turns
//! the bytes coming back into a `serde_json::Value` of the requested [`Shape`].
//!
//! * [`JsonSerializer`]: schemaless JSON. The response shape is ignored.
//! * [`SchemaSerializer`]: Protobuf binary, validated against the messages of a
//!   `prost_reflect::DescriptorPool`. Both the request and the response must name a schema.
pub mod json;
pub mod schema;

pub use json::JsonSerializer;
pub use schema::SchemaSerializer;

use crate::error::{DecodingError, EncodingError};
use bytes::Bytes;
use serde_json::{Map, Value};

/// Describes how a payload should be interpreted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Shape {
    /// Decode into a generic structured value.
    #[default]
    Untyped,
    /// A fully qualified message name (e.g. `echo.EchoRequest`).
    Schema(String),
}

impl Shape {
    pub fn schema(name: impl Into<String>) -> Self {
        Shape::Schema(name.into())
    }
}

/// The named fields of one outgoing call, together with the shape they claim to satisfy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestValue {
    pub shape: Shape,
    pub fields: Map<String, Value>,
}

impl RequestValue {
    pub fn untyped(fields: Map<String, Value>) -> Self {
        Self {
            shape: Shape::Untyped,
            fields,
        }
    }

    pub fn typed(schema: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            shape: Shape::Schema(schema.into()),
            fields,
        }
    }

    /// Builds a request from a JSON object. Any other JSON value yields `None`.
    pub fn from_json(shape: Shape, value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self { shape, fields }),
            _ => None,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn into_json(self) -> Value {
        Value::Object(self.fields)
    }
}

/// Converts request values to bytes and response bytes to values.
///
/// Implementations are shared across concurrent calls and must not keep per-call state.
pub trait Serializer: Send + Sync {
    fn serialize(&self, request: &RequestValue) -> Result<Bytes, EncodingError>;

    fn deserialize(&self, data: &[u8], shape: &Shape) -> Result<Value, DecodingError>;
}
