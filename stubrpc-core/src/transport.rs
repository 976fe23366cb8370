//! # Transports
//!
//! A [`Transport`] moves opaque byte payloads to and from a named endpoint on a remote
//! peer. It knows nothing about the payload format: encoding and decoding belong to the
//! [`crate::Serializer`].
//!
//! Implementations own their connection resources and must accept concurrent exchanges
//! through a shared reference. Any locking they need is internal.
//!
//! * [`HttpTransport`]: one `POST` per exchange, body is exactly the payload.
//! * [`GrpcTransport`]: one unary gRPC call per exchange, message is exactly the payload.
pub mod grpc;
pub mod http;

pub use self::grpc::GrpcTransport;
pub use self::http::{HttpTransport, HttpTransportConfig, Scheme};

use crate::error::TransportError;
use bytes::Bytes;
use std::future::Future;

pub trait Transport: Send + Sync {
    /// Sends `payload` to `endpoint` and resolves to the complete response payload.
    ///
    /// Dropping the returned future cancels this exchange only.
    fn exchange(
        &self,
        endpoint: &str,
        payload: Bytes,
    ) -> impl Future<Output = Result<Bytes, TransportError>> + Send;

    /// Releases the underlying connection resources. Calling it more than once is a no-op,
    /// and exchanges started afterwards fail with [`TransportError::Closed`].
    fn close(&self);
}

impl<T: Transport> Transport for std::sync::Arc<T> {
    fn exchange(
        &self,
        endpoint: &str,
        payload: Bytes,
    ) -> impl Future<Output = Result<Bytes, TransportError>> + Send {
        (**self).exchange(endpoint, payload)
    }

    fn close(&self) {
        (**self).close()
    }
}
