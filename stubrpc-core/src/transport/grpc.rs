//! # gRPC Transport
//!
//! This module wraps a standard `tonic` client to carry opaque payloads as unary gRPC
//! calls. It is agnostic to the messages being exchanged.
//!
//! ## How it works
//!
//! The [`GrpcTransport`] uses [`BytesCodec`], a pass-through `tonic::codec::Codec`, so the
//! message body on the wire is exactly the payload produced by the serializer (typically
//! Protobuf bytes from [`crate::SchemaSerializer`]). The endpoint is the HTTP/2 path of
//! the method (e.g. `/package.Service/Method`), prefixed with an optional base path.
//!
//! gRPC statuses other than `OK` are reported as [`TransportError::Status`], except
//! `DEADLINE_EXCEEDED` (a [`TransportError::Timeout`]) and `UNAVAILABLE`
//! (a [`TransportError::Unreachable`]).
use super::Transport;
use crate::{BoxError, error::TransportError};
use bytes::{Buf, BufMut, Bytes};
use http_body::Body as HttpBody;
use std::{str::FromStr, sync::RwLock, time::Duration};
use tonic::{
    Code, Status,
    client::GrpcService,
    codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder},
    transport::{Channel, Endpoint},
};

/// A `tonic` codec that sends and receives message bodies untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesCodec;

impl Codec for BytesCodec {
    type Encode = Bytes;
    type Decode = Bytes;

    type Encoder = BytesCodec;
    type Decoder = BytesCodec;

    fn encoder(&mut self) -> Self::Encoder {
        BytesCodec
    }

    fn decoder(&mut self) -> Self::Decoder {
        BytesCodec
    }
}

impl Encoder for BytesCodec {
    type Item = Bytes;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, dst: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        dst.put_slice(&item);
        Ok(())
    }
}

impl Decoder for BytesCodec {
    type Item = Bytes;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        Ok(Some(src.copy_to_bytes(src.remaining())))
    }
}

/// A transport performing one unary gRPC call per exchange.
pub struct GrpcTransport<S = Channel> {
    client: RwLock<Option<tonic::client::Grpc<S>>>,
    base_path: String,
    timeout: Option<Duration>,
}

impl GrpcTransport<Channel> {
    /// Connects to a gRPC server (e.g. `http://localhost:50051`).
    ///
    /// The timeout, when given, bounds both connection establishment and every exchange.
    pub async fn connect(addr: &str, timeout: Option<Duration>) -> Result<Self, TransportError> {
        let mut endpoint =
            Endpoint::new(addr.to_string()).map_err(|e| TransportError::InvalidTarget {
                target: addr.to_string(),
                cause: e.to_string(),
            })?;

        if let Some(timeout) = timeout {
            endpoint = endpoint.connect_timeout(timeout);
        }

        let channel = endpoint
            .connect()
            .await
            .map_err(|e| TransportError::Unreachable {
                target: addr.to_string(),
                cause: e.to_string(),
            })?;

        let transport = Self::from_service(channel);

        Ok(match timeout {
            Some(timeout) => transport.with_timeout(timeout),
            None => transport,
        })
    }
}

impl<S> GrpcTransport<S>
where
    S: GrpcService<tonic::body::Body> + Clone + Send + Sync + 'static,
    S::Future: Send,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    /// Creates a transport from an existing Tonic service/channel.
    pub fn from_service(service: S) -> Self {
        Self {
            client: RwLock::new(Some(tonic::client::Grpc::new(service))),
            base_path: String::new(),
            timeout: None,
        }
    }

    /// Prefix prepended to every endpoint, without a trailing slash.
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    // `tonic::client::Grpc` needs `&mut self` to call, so every exchange works on its own
    // clone. Clones share the underlying channel.
    fn client(&self) -> Result<tonic::client::Grpc<S>, TransportError> {
        self.client
            .read()
            .ok()
            .and_then(|guard| guard.clone())
            .ok_or(TransportError::Closed)
    }
}

impl<S> Transport for GrpcTransport<S>
where
    S: GrpcService<tonic::body::Body> + Clone + Send + Sync + 'static,
    S::Future: Send,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    async fn exchange(&self, endpoint: &str, payload: Bytes) -> Result<Bytes, TransportError> {
        let mut client = self.client()?;
        let target = format!("{}{}", self.base_path, endpoint);

        let path = http::uri::PathAndQuery::from_str(&target).map_err(|e| {
            TransportError::InvalidTarget {
                target: target.clone(),
                cause: e.to_string(),
            }
        })?;

        client.ready().await.map_err(|e| {
            let e: BoxError = e.into();
            TransportError::Unreachable {
                target: target.clone(),
                cause: e.to_string(),
            }
        })?;

        let call = client.unary(tonic::Request::new(payload), path, BytesCodec);

        let response = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, call)
                .await
                .map_err(|_| TransportError::Timeout {
                    target: target.clone(),
                })?,
            None => call.await,
        };

        response
            .map(tonic::Response::into_inner)
            .map_err(|status| map_status(&target, status))
    }

    fn close(&self) {
        if let Ok(mut client) = self.client.write() {
            client.take();
        }
    }
}

fn map_status(target: &str, status: Status) -> TransportError {
    let target = target.to_string();

    match status.code() {
        Code::DeadlineExceeded => TransportError::Timeout { target },
        Code::Unavailable => TransportError::Unreachable {
            target,
            cause: status.message().to_string(),
        },
        code => TransportError::Status {
            target,
            code: code as i32,
            message: status.message().to_string(),
        },
    }
}
