//! # Errors
//!
//! Every stage of a call has its own error type so that callers can tell, without
//! inspecting messages, whether a call failed before any I/O happened (encoding, stub
//! binding), on the wire (transport), or after a response came back (decoding, hooks).
//!
//! [`RpcError`] aggregates all of them and is what [`crate::Rpc::request`] returns.
use crate::BoxError;

/// The request value could not be turned into bytes.
#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    #[error("Failed to encode request as JSON: '{0}'")]
    Json(#[source] serde_json::Error),
    #[error("The schema codec requires a request bound to a schema, got an untyped request")]
    MissingSchema,
    #[error("Schema '{0}' not found in the descriptor pool")]
    UnknownSchema(String),
    #[error("Request does not match schema '{schema}': '{source}'")]
    SchemaMismatch {
        schema: String,
        source: serde_json::Error,
    },
}

/// The response bytes could not be turned into a value of the requested shape.
#[derive(Debug, thiserror::Error)]
pub enum DecodingError {
    #[error("Malformed response payload: '{0}'")]
    Malformed(#[source] serde_json::Error),
    #[error("The schema codec requires a response schema, got an untyped shape")]
    MissingSchema,
    #[error("Response does not conform to schema '{schema}': {reason}")]
    SchemaValidation { schema: String, reason: String },
    #[error("Failed to convert the response into the requested type: '{0}'")]
    Conversion(#[source] serde_json::Error),
}

impl DecodingError {
    /// Whether this failure is a schema conformance failure rather than a generic parse error.
    pub fn is_schema_validation(&self) -> bool {
        matches!(self, DecodingError::SchemaValidation { .. })
    }
}

/// A failure moving bytes to or from the peer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Invalid target '{target}': {cause}")]
    InvalidTarget { target: String, cause: String },
    #[error("Failed to reach '{target}': {cause}")]
    Unreachable { target: String, cause: String },
    #[error("Request to '{target}' timed out")]
    Timeout { target: String },
    #[error("Malformed response from '{target}': {cause}")]
    MalformedResponse { target: String, cause: String },
    #[error("Call to '{target}' failed with status {code}: {message}")]
    Status {
        target: String,
        code: i32,
        message: String,
    },
    #[error("The transport has been closed")]
    Closed,
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout { .. })
    }
}

/// The signature handed to the stub generator cannot be mapped onto named fields.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Variadic parameter '{0}' cannot be mapped to a named request field")]
    Variadic(String),
    #[error("Parameter '{0}' is declared more than once")]
    DuplicateParameter(String),
    #[error("Endpoint must not be empty")]
    InvalidEndpoint,
}

/// The arguments given to a stub do not fit its signature.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ArityError {
    #[error("Expected at most {expected} positional arguments, got {given}")]
    TooManyArguments { expected: usize, given: usize },
    #[error("Missing argument for parameter '{0}'")]
    MissingArgument(String),
    #[error("Unknown parameter '{0}'")]
    UnknownParameter(String),
    #[error("Parameter '{0}' was given both positionally and by keyword")]
    DuplicateArgument(String),
}

/// A failure reported inside an otherwise well-formed response, e.g. a non-success
/// status code in a `{code, msg, data}` envelope.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("Remote returned code {code}: {message}")]
pub struct ApplicationError {
    pub code: i64,
    pub message: String,
}

/// Any failure of a call made through [`crate::Rpc`] or a [`crate::Stub`].
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("Endpoint must not be empty")]
    InvalidEndpoint,
    #[error(transparent)]
    PreHook(BoxError),
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Decoding(#[from] DecodingError),
    #[error(transparent)]
    Application(BoxError),
    #[error(transparent)]
    Signature(#[from] SignatureError),
    #[error(transparent)]
    Arity(#[from] ArityError),
}

impl RpcError {
    /// Returns the application error raised by a post-hook, if that is what this is.
    pub fn as_application_error(&self) -> Option<&ApplicationError> {
        match self {
            RpcError::Application(err) => err.downcast_ref::<ApplicationError>(),
            _ => None,
        }
    }
}
