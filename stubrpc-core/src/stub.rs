//! # Call Stubs
//!
//! A [`Stub`] makes a remote endpoint callable like a local function. It is built once
//! from a [`Signature`] (the ordered parameter list of the remote operation, with optional
//! defaults) and reused for every call: the arguments of each call are laid out into a
//! named [`RequestValue`] and handed to the shared [`Rpc`].
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use stubrpc_core::{HttpTransport, HttpTransportConfig, Rpc, RpcOptions, signature};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = HttpTransport::new(HttpTransportConfig::new("127.0.0.1", 3212))?;
//! let rpc = Arc::new(Rpc::json(transport, RpcOptions::default()));
//!
//! // fn add(a, b, c = 100)
//! let add = rpc.stub("/add", signature!(a, b, c = 100))?;
//!
//! // Sends {"a": 1, "b": 2, "c": 100}
//! let sum = add.call([json!(1), json!(2)]).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Binding rules
//!
//! * Positional arguments bind to parameters in declaration order, keyword arguments by
//!   name. Parameters left unbound take their default.
//! * Variadic parameters are rejected when the stub is built, since they have no stable
//!   field name.
//! * Names on the signature's exclusion list (`client` and `task` by default) keep their
//!   position but never reach the request.
//! * Under [`ArityPolicy::Strict`] (the default) extra positional arguments and unbound
//!   required parameters are errors. [`ArityPolicy::Compatible`] keeps the legacy
//!   behaviour: without defaults, extra arguments are dropped and missing ones omitted.
use crate::{
    error::{ArityError, RpcError, SignatureError},
    rpc::Rpc,
    serializer::{JsonSerializer, RequestValue, Serializer, Shape},
    transport::Transport,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::{collections::HashSet, fmt, sync::Arc};

/// Parameter names never forwarded to the peer unless the signature says otherwise.
pub const DEFAULT_EXCLUDED_PARAMS: &[&str] = &["client", "task"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArityPolicy {
    #[default]
    Strict,
    Compatible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Named,
    /// A catch-all parameter. Accepted in a [`Signature`], rejected by [`Stub::new`].
    Variadic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub default: Option<Value>,
    pub kind: ParamKind,
}

impl Param {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
            kind: ParamKind::Named,
        }
    }

    pub fn with_default(name: impl Into<String>, default: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            default: Some(default.into()),
            kind: ParamKind::Named,
        }
    }

    pub fn variadic(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
            kind: ParamKind::Variadic,
        }
    }
}

/// The parameter list of a remote operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    params: Vec<Param>,
    excluded: Vec<String>,
    policy: ArityPolicy,
}

impl Default for Signature {
    fn default() -> Self {
        Self {
            params: Vec::new(),
            excluded: DEFAULT_EXCLUDED_PARAMS
                .iter()
                .map(|name| name.to_string())
                .collect(),
            policy: ArityPolicy::default(),
        }
    }
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_params(params: impl IntoIterator<Item = Param>) -> Self {
        Self {
            params: params.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn param(mut self, name: impl Into<String>) -> Self {
        self.params.push(Param::required(name));
        self
    }

    pub fn param_with_default(mut self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.params.push(Param::with_default(name, default));
        self
    }

    pub fn variadic(mut self, name: impl Into<String>) -> Self {
        self.params.push(Param::variadic(name));
        self
    }

    /// Adds a name to the exclusion list.
    pub fn exclude(mut self, name: impl Into<String>) -> Self {
        self.excluded.push(name.into());
        self
    }

    /// Clears the exclusion list, including the default entries.
    pub fn without_exclusions(mut self) -> Self {
        self.excluded.clear();
        self
    }

    pub fn arity_policy(mut self, policy: ArityPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }
}

/// Declares a [`Signature`] with the look of a function parameter list.
///
/// ```rust
/// use serde_json::json;
/// use stubrpc_core::signature;
///
/// // fn run_command(name, args = [])
/// let signature = signature!(name, args = json!([]));
///
/// assert_eq!(signature.params().len(), 2);
/// assert_eq!(signature.params()[1].default, Some(json!([])));
/// ```
#[macro_export]
macro_rules! signature {
    () => {
        $crate::Signature::new()
    };
    (@param $signature:ident, $name:ident = $default:expr) => {
        $signature.param_with_default(stringify!($name), $default)
    };
    (@param $signature:ident, $name:ident) => {
        $signature.param(stringify!($name))
    };
    ($($name:ident $(= $default:expr)?),+ $(,)?) => {{
        let signature = $crate::Signature::new();
        $(
            let signature = $crate::signature!(@param signature, $name $(= $default)?);
        )+
        signature
    }};
}

/// The part of a signature a stub keeps: names, defaults and binding rules.
#[derive(Debug, Clone)]
pub(crate) struct ArgumentLayout {
    names: Vec<String>,
    defaults: Map<String, Value>,
    excluded: HashSet<String>,
    policy: ArityPolicy,
}

impl TryFrom<Signature> for ArgumentLayout {
    type Error = SignatureError;

    fn try_from(signature: Signature) -> Result<Self, Self::Error> {
        let mut names = Vec::with_capacity(signature.params.len());
        let mut defaults = Map::new();

        for param in signature.params {
            if param.kind == ParamKind::Variadic {
                return Err(SignatureError::Variadic(param.name));
            }
            if names.contains(&param.name) {
                return Err(SignatureError::DuplicateParameter(param.name));
            }
            if let Some(default) = param.default {
                defaults.insert(param.name.clone(), default);
            }
            names.push(param.name);
        }

        Ok(Self {
            names,
            defaults,
            excluded: signature.excluded.into_iter().collect(),
            policy: signature.policy,
        })
    }
}

impl ArgumentLayout {
    pub(crate) fn bind(
        &self,
        positional: Vec<Value>,
        mut keyword: Map<String, Value>,
    ) -> Result<Map<String, Value>, ArityError> {
        let expected = self.names.len();
        let given = positional.len();

        let drops_extra = self.policy == ArityPolicy::Compatible && self.defaults.is_empty();
        if given > expected && !drops_extra {
            return Err(ArityError::TooManyArguments { expected, given });
        }

        let mut positional = positional.into_iter();
        let mut fields = Map::new();

        for name in &self.names {
            let value = match positional.next() {
                Some(_) if keyword.contains_key(name) => {
                    return Err(ArityError::DuplicateArgument(name.clone()));
                }
                Some(value) => Some(value),
                None => keyword
                    .remove(name)
                    .or_else(|| self.defaults.get(name).cloned()),
            };

            let excluded = self.excluded.contains(name);

            match value {
                Some(_) if excluded => {}
                Some(value) => {
                    fields.insert(name.clone(), value);
                }
                None if excluded || self.policy == ArityPolicy::Compatible => {}
                None => return Err(ArityError::MissingArgument(name.clone())),
            }
        }

        if let Some(name) = keyword.keys().next() {
            return Err(ArityError::UnknownParameter(name.clone()));
        }

        Ok(fields)
    }
}

/// A callable bound to one endpoint of an [`Rpc`].
pub struct Stub<T, S = JsonSerializer> {
    rpc: Arc<Rpc<T, S>>,
    endpoint: Arc<str>,
    layout: Arc<ArgumentLayout>,
    request_shape: Shape,
    response_shape: Shape,
}

impl<T, S> Clone for Stub<T, S> {
    fn clone(&self) -> Self {
        Self {
            rpc: Arc::clone(&self.rpc),
            endpoint: Arc::clone(&self.endpoint),
            layout: Arc::clone(&self.layout),
            request_shape: self.request_shape.clone(),
            response_shape: self.response_shape.clone(),
        }
    }
}

impl<T, S> fmt::Debug for Stub<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stub")
            .field("endpoint", &self.endpoint)
            .field("params", &self.layout.names)
            .field("request_shape", &self.request_shape)
            .field("response_shape", &self.response_shape)
            .finish()
    }
}

impl<T, S> Stub<T, S>
where
    T: Transport,
    S: Serializer,
{
    pub fn new(
        rpc: Arc<Rpc<T, S>>,
        endpoint: impl Into<String>,
        signature: Signature,
    ) -> Result<Self, SignatureError> {
        let endpoint: String = endpoint.into();
        if endpoint.is_empty() {
            return Err(SignatureError::InvalidEndpoint);
        }

        Ok(Self {
            rpc,
            endpoint: endpoint.into(),
            layout: Arc::new(ArgumentLayout::try_from(signature)?),
            request_shape: Shape::Untyped,
            response_shape: Shape::Untyped,
        })
    }

    /// The schema requests built by this stub claim to satisfy.
    pub fn with_request_shape(mut self, shape: Shape) -> Self {
        self.request_shape = shape;
        self
    }

    pub fn with_response_shape(mut self, shape: Shape) -> Self {
        self.response_shape = shape;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Lays out positional arguments into the request that a call would send.
    pub fn build_request<I>(&self, positional: I) -> Result<RequestValue, ArityError>
    where
        I: IntoIterator<Item = Value>,
    {
        self.build_request_with(positional, Map::new())
    }

    /// Lays out positional and keyword arguments into the request that a call would send.
    pub fn build_request_with<I>(
        &self,
        positional: I,
        keyword: Map<String, Value>,
    ) -> Result<RequestValue, ArityError>
    where
        I: IntoIterator<Item = Value>,
    {
        let fields = self
            .layout
            .bind(positional.into_iter().collect(), keyword)?;

        Ok(RequestValue {
            shape: self.request_shape.clone(),
            fields,
        })
    }

    pub async fn call<I>(&self, positional: I) -> Result<Value, RpcError>
    where
        I: IntoIterator<Item = Value>,
    {
        self.call_with(positional, Map::new()).await
    }

    pub async fn call_with<I>(
        &self,
        positional: I,
        keyword: Map<String, Value>,
    ) -> Result<Value, RpcError>
    where
        I: IntoIterator<Item = Value>,
    {
        let request = self.build_request_with(positional, keyword)?;

        self.rpc
            .request(&self.endpoint, request, &self.response_shape)
            .await
    }

    pub async fn call_as<R, I>(&self, positional: I) -> Result<R, RpcError>
    where
        R: DeserializeOwned,
        I: IntoIterator<Item = Value>,
    {
        self.call_with_as(positional, Map::new()).await
    }

    /// Like [`Stub::call_with`], converting the response into `R`.
    pub async fn call_with_as<R, I>(
        &self,
        positional: I,
        keyword: Map<String, Value>,
    ) -> Result<R, RpcError>
    where
        R: DeserializeOwned,
        I: IntoIterator<Item = Value>,
    {
        let request = self.build_request_with(positional, keyword)?;

        self.rpc
            .request_as(&self.endpoint, request, &self.response_shape)
            .await
    }
}
