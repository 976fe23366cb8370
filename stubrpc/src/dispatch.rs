//! # Dispatch
//!
//! The transport and codec of a call are picked from the command line at runtime, while
//! [`stubrpc_core::Rpc`] is generic over both. These enums close that gap by forwarding to
//! whichever implementation was selected.
use bytes::Bytes;
use serde_json::Value;
use std::{path::Path, time::Duration};
use stubrpc_core::{
    DecodingError, EncodingError, GrpcTransport, HttpTransport, HttpTransportConfig,
    JsonSerializer, RequestValue, SchemaSerializer, Serializer, Shape, Transport, TransportError,
    prost_reflect::DescriptorPool,
};

use crate::{cli::TransportKind, formatter::FormattedString};

pub enum AnyTransport {
    Http(HttpTransport),
    Grpc(GrpcTransport),
}

impl AnyTransport {
    pub async fn connect(
        kind: TransportKind,
        url: &str,
        insecure: bool,
        timeout: Option<Duration>,
    ) -> Result<Self, TransportError> {
        match kind {
            TransportKind::Http => {
                let mut config =
                    HttpTransportConfig::from_url(url)?.verify_peer_certificate(!insecure);

                if let Some(timeout) = timeout {
                    config = config.timeout(timeout);
                }

                HttpTransport::new(config).map(AnyTransport::Http)
            }
            TransportKind::Grpc => {
                if insecure {
                    tracing::warn!("--insecure has no effect on the gRPC transport");
                }

                GrpcTransport::connect(url, timeout)
                    .await
                    .map(AnyTransport::Grpc)
            }
        }
    }
}

impl Transport for AnyTransport {
    async fn exchange(&self, endpoint: &str, payload: Bytes) -> Result<Bytes, TransportError> {
        match self {
            AnyTransport::Http(transport) => transport.exchange(endpoint, payload).await,
            AnyTransport::Grpc(transport) => transport.exchange(endpoint, payload).await,
        }
    }

    fn close(&self) {
        match self {
            AnyTransport::Http(transport) => transport.close(),
            AnyTransport::Grpc(transport) => transport.close(),
        }
    }
}

pub enum Codec {
    Json(JsonSerializer),
    Schema(SchemaSerializer),
}

impl Codec {
    /// The schema codec when a descriptor set is given, the JSON codec otherwise.
    pub fn load(file_descriptor_set: Option<&Path>) -> Result<Self, FormattedString> {
        let Some(path) = file_descriptor_set else {
            return Ok(Codec::Json(JsonSerializer));
        };

        let bytes = std::fs::read(path)?;
        let serializer = SchemaSerializer::from_file_descriptor_set(&bytes)?;

        Ok(Codec::Schema(serializer))
    }

    /// The shape responses from `endpoint` decode into.
    ///
    /// An explicit type wins. Otherwise the schema codec looks the endpoint up as a
    /// `/package.Service/Method` path and uses the method's output message.
    pub fn response_shape(&self, endpoint: &str, explicit: Option<String>) -> Shape {
        match (explicit, self) {
            (Some(name), _) => Shape::Schema(name),
            (None, Codec::Schema(serializer)) => {
                method_output(serializer.pool(), endpoint).unwrap_or_default()
            }
            (None, Codec::Json(_)) => Shape::Untyped,
        }
    }
}

impl Serializer for Codec {
    fn serialize(&self, request: &RequestValue) -> Result<Bytes, EncodingError> {
        match self {
            Codec::Json(codec) => codec.serialize(request),
            Codec::Schema(codec) => codec.serialize(request),
        }
    }

    fn deserialize(&self, bytes: &[u8], shape: &Shape) -> Result<Value, DecodingError> {
        match self {
            Codec::Json(codec) => codec.deserialize(bytes, shape),
            Codec::Schema(codec) => codec.deserialize(bytes, shape),
        }
    }
}

fn method_output(pool: &DescriptorPool, endpoint: &str) -> Option<Shape> {
    let (service, method) = endpoint.trim_start_matches('/').rsplit_once('/')?;
    let service = service.rsplit('/').next()?;

    let method = pool
        .get_service_by_name(service)?
        .methods()
        .find(|m| m.name() == method)?;

    Some(Shape::schema(method.output().full_name()))
}
