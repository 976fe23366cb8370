//! # Call Pipeline
//!
//! [`Rpc`] executes one logical call as a fixed sequence of steps:
//!
//! 1. **Pre-hook**: transforms the outgoing [`RequestValue`]. Its result always replaces
//!    the request.
//! 2. **Encode**: the [`Serializer`] turns the request into bytes.
//! 3. **Exchange**: the [`Transport`] sends the bytes to the endpoint and waits for the
//!    answer. This is the only step that suspends.
//! 4. **Decode**: the serializer turns the answer into a value of the response [`Shape`].
//! 5. **Post-hook**: transforms (or rejects) the decoded value.
//!
//! Every failure is returned unchanged. When error logging is enabled it is also logged
//! together with the endpoint and whatever response bytes had been received.
//!
//! An `Rpc` holds no per-call state, so a single instance (usually behind an `Arc`) can
//! serve any number of concurrent calls and [`Stub`]s.
use crate::{
    BoxError,
    error::{DecodingError, RpcError, SignatureError},
    serializer::{JsonSerializer, RequestValue, SchemaSerializer, Serializer, Shape},
    stub::{Signature, Stub},
    transport::Transport,
};
use bytes::Bytes;
use prost_reflect::DescriptorPool;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::{fmt, sync::Arc};

pub type PreHook = Arc<dyn Fn(RequestValue) -> Result<RequestValue, BoxError> + Send + Sync>;
pub type PostHook = Arc<dyn Fn(Value) -> Result<Value, BoxError> + Send + Sync>;

/// Construction-time settings of an [`Rpc`]. They never change afterwards.
#[derive(Clone)]
pub struct RpcOptions {
    pub pre_hook: Option<PreHook>,
    pub post_hook: Option<PostHook>,
    /// Log failed calls at `error` level. Enabled by default.
    pub error_logging: bool,
    /// Log every outgoing request at `debug` level. Disabled by default.
    pub debug_requests: bool,
}

impl Default for RpcOptions {
    fn default() -> Self {
        Self {
            pre_hook: None,
            post_hook: None,
            error_logging: true,
            debug_requests: false,
        }
    }
}

impl fmt::Debug for RpcOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcOptions")
            .field("pre_hook", &self.pre_hook.is_some())
            .field("post_hook", &self.post_hook.is_some())
            .field("error_logging", &self.error_logging)
            .field("debug_requests", &self.debug_requests)
            .finish()
    }
}

impl RpcOptions {
    pub fn pre_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(RequestValue) -> Result<RequestValue, BoxError> + Send + Sync + 'static,
    {
        self.pre_hook = Some(Arc::new(hook));
        self
    }

    pub fn post_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(Value) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        self.post_hook = Some(Arc::new(hook));
        self
    }

    pub fn error_logging(mut self, enabled: bool) -> Self {
        self.error_logging = enabled;
        self
    }

    pub fn debug_requests(mut self, enabled: bool) -> Self {
        self.debug_requests = enabled;
        self
    }
}

/// The call pipeline: a serializer and a transport plus optional hooks.
pub struct Rpc<T, S = JsonSerializer> {
    transport: T,
    serializer: S,
    options: RpcOptions,
}

impl<T: Transport> Rpc<T, JsonSerializer> {
    /// A pipeline speaking schemaless JSON.
    pub fn json(transport: T, options: RpcOptions) -> Self {
        Self::new(transport, JsonSerializer, options)
    }
}

impl<T: Transport> Rpc<T, SchemaSerializer> {
    /// A pipeline speaking Protobuf, validated against the messages in `pool`.
    pub fn with_schema(transport: T, pool: DescriptorPool, options: RpcOptions) -> Self {
        Self::new(transport, SchemaSerializer::new(pool), options)
    }
}

impl<T, S> Rpc<T, S>
where
    T: Transport,
    S: Serializer,
{
    pub fn new(transport: T, serializer: S, options: RpcOptions) -> Self {
        Self {
            transport,
            serializer,
            options,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn serializer(&self) -> &S {
        &self.serializer
    }

    pub fn options(&self) -> &RpcOptions {
        &self.options
    }

    /// Performs one call against `endpoint` and decodes the answer as `response_shape`.
    pub async fn request(
        &self,
        endpoint: &str,
        request: RequestValue,
        response_shape: &Shape,
    ) -> Result<Value, RpcError> {
        if self.options.debug_requests {
            tracing::debug!(endpoint, request = ?request.fields, shape = ?request.shape, "outgoing request");
        }

        let mut response = Bytes::new();
        let result = self
            .run(endpoint, request, response_shape, &mut response)
            .await;

        if let Err(err) = &result {
            self.log_failure(endpoint, err, &response);
        }

        result
    }

    /// Like [`Rpc::request`], converting the final value into `R`.
    pub async fn request_as<R: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: RequestValue,
        response_shape: &Shape,
    ) -> Result<R, RpcError> {
        let value = self.request(endpoint, request, response_shape).await?;

        serde_json::from_value(value).map_err(|e| DecodingError::Conversion(e).into())
    }

    /// Sends an already serialized payload and returns the raw answer.
    ///
    /// Serializer and hooks are bypassed. This is the entry point for collaborators that
    /// produce their own wire format and only need the transport.
    pub async fn exchange_raw(&self, endpoint: &str, payload: Bytes) -> Result<Bytes, RpcError> {
        let result = if endpoint.is_empty() {
            Err(RpcError::InvalidEndpoint)
        } else {
            self.transport
                .exchange(endpoint, payload)
                .await
                .map_err(RpcError::from)
        };

        if let Err(err) = &result {
            self.log_failure(endpoint, err, &[]);
        }

        result
    }

    /// Releases the transport's resources.
    pub fn close(&self) {
        self.transport.close();
    }

    async fn run(
        &self,
        endpoint: &str,
        request: RequestValue,
        response_shape: &Shape,
        response: &mut Bytes,
    ) -> Result<Value, RpcError> {
        if endpoint.is_empty() {
            return Err(RpcError::InvalidEndpoint);
        }

        let request = match &self.options.pre_hook {
            Some(hook) => hook(request).map_err(RpcError::PreHook)?,
            None => request,
        };

        let payload = self.serializer.serialize(&request)?;

        *response = self.transport.exchange(endpoint, payload).await?;

        let value = self.serializer.deserialize(&response[..], response_shape)?;

        match &self.options.post_hook {
            Some(hook) => hook(value).map_err(RpcError::Application),
            None => Ok(value),
        }
    }

    fn log_failure(&self, endpoint: &str, err: &RpcError, response: &[u8]) {
        if self.options.error_logging {
            tracing::error!(
                endpoint,
                error = %err,
                response = %String::from_utf8_lossy(response),
                "rpc call failed"
            );
        }
    }
}

impl<T, S> Rpc<T, S>
where
    T: Transport + 'static,
    S: Serializer + 'static,
{
    /// Builds a [`Stub`] calling `endpoint` with arguments laid out by `signature`.
    pub fn stub(
        self: &Arc<Self>,
        endpoint: impl Into<String>,
        signature: Signature,
    ) -> Result<Stub<T, S>, SignatureError> {
        Stub::new(Arc::clone(self), endpoint, signature)
    }
}

impl<T, S> fmt::Debug for Rpc<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rpc")
            .field("transport", &std::any::type_name::<T>())
            .field("serializer", &std::any::type_name::<S>())
            .field("options", &self.options)
            .finish()
    }
}
