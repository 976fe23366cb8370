//! Ready-made hooks for [`crate::RpcOptions`].
use crate::{BoxError, error::ApplicationError};
use serde_json::Value;

/// Describes a `{code, msg, data}` response envelope.
///
/// A response whose code differs from `success_code` is an application failure. On
/// success the hook unwraps the envelope and returns its data field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCodeHook {
    pub code_field: String,
    pub message_field: String,
    pub data_field: String,
    pub success_code: i64,
}

impl Default for StatusCodeHook {
    fn default() -> Self {
        Self {
            code_field: "code".to_string(),
            message_field: "msg".to_string(),
            data_field: "data".to_string(),
            success_code: 200,
        }
    }
}

impl StatusCodeHook {
    pub fn success_code(mut self, code: i64) -> Self {
        self.success_code = code;
        self
    }

    pub fn fields(
        mut self,
        code: impl Into<String>,
        message: impl Into<String>,
        data: impl Into<String>,
    ) -> Self {
        self.code_field = code.into();
        self.message_field = message.into();
        self.data_field = data.into();
        self
    }

    pub fn check(&self, mut value: Value) -> Result<Value, BoxError> {
        let code = value
            .get(&self.code_field)
            .and_then(Value::as_i64)
            .ok_or_else(|| format!("response has no integer '{}' field", self.code_field))?;

        if code != self.success_code {
            let message = match value.get(&self.message_field) {
                Some(Value::String(message)) => message.clone(),
                Some(other) => other.to_string(),
                None => String::new(),
            };

            return Err(ApplicationError { code, message }.into());
        }

        tracing::debug!(response = %value, "call succeeded");

        Ok(value
            .get_mut(&self.data_field)
            .map(Value::take)
            .unwrap_or(Value::Null))
    }
}

/// Builds a post-hook from a [`StatusCodeHook`] description.
pub fn status_code_hook(
    hook: StatusCodeHook,
) -> impl Fn(Value) -> Result<Value, BoxError> + Send + Sync + 'static {
    move |value| hook.check(value)
}
