//! # Stubrpc Core
//!
//! `stubrpc-core` is a transport-agnostic RPC client. It lets a caller invoke a remote
//! endpoint as if it were a local function: the library builds the request from the call
//! arguments, encodes it, exchanges the bytes with the peer and decodes the answer.
//!
//! ## Key Components
//!
//! * **[`Serializer`]:** Converts a [`RequestValue`] into bytes and bytes back into a
//!   `serde_json::Value`. Two codecs are provided: [`JsonSerializer`] (schemaless) and
//!   [`SchemaSerializer`] (Protobuf, validated against a `prost_reflect::DescriptorPool`).
//! * **[`Transport`]:** Moves opaque payloads to and from a named endpoint.
//!   [`HttpTransport`] performs one `POST` per call, [`GrpcTransport`] one unary gRPC call.
//! * **[`Rpc`]:** The call pipeline. Runs the pre-hook, encodes, exchanges, decodes and runs
//!   the post-hook, logging failures on the way out.
//! * **[`Stub`] & [`Signature`]:** Turn a declared parameter list into a reusable callable
//!   that maps positional and keyword arguments onto a named request.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stubrpc_core::{HttpTransport, HttpTransportConfig, Rpc, RpcOptions, signature};
//! use stubrpc_core::hooks::{StatusCodeHook, status_code_hook};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = HttpTransport::new(HttpTransportConfig::new("127.0.0.1", 3212))?;
//! let options = RpcOptions::default().post_hook(status_code_hook(StatusCodeHook::default()));
//! let rpc = Arc::new(Rpc::json(transport, options));
//!
//! let run_command = rpc.stub("/", signature!(name, args = serde_json::json!([])))?;
//! let output = run_command.call(["ls".into(), serde_json::json!(["/"])]).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports `prost-reflect`, `serde_json` and `tonic` so that consumers
//! build descriptor pools and values with compatible versions.
pub mod error;
pub mod hooks;
pub mod rpc;
pub mod serializer;
pub mod stub;
pub mod transport;

pub use error::{
    ApplicationError, ArityError, DecodingError, EncodingError, RpcError, SignatureError,
    TransportError,
};
pub use rpc::{Rpc, RpcOptions};
pub use serializer::{JsonSerializer, RequestValue, SchemaSerializer, Serializer, Shape};
pub use stub::{ArityPolicy, Param, Signature, Stub};
pub use transport::{GrpcTransport, HttpTransport, HttpTransportConfig, Transport};

// Re-exports
pub use prost_reflect;
pub use serde_json;
pub use tonic;

/// Type alias for the standard boxed error used by hooks and generic bounds.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
