use colored::*;
use std::fmt::Display;
use stubrpc_core::{RpcError, TransportError, prost_reflect};

/// A wrapper struct for a formatted, colored string.
///
/// Implements `Display` so it can be printed directly.
pub struct FormattedString(pub String);

impl FormattedString {
    /// A red title followed by the quoted error.
    fn titled(title: &str, err: impl Display) -> Self {
        FormattedString(format!("{}\n\n'{}'", title.red().bold(), err))
    }
}

impl Display for FormattedString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f)?;
        writeln!(f, "{}", self.0)
    }
}

impl From<serde_json::Value> for FormattedString {
    fn from(value: serde_json::Value) -> Self {
        FormattedString(serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()))
    }
}

impl From<RpcError> for FormattedString {
    fn from(err: RpcError) -> Self {
        if let Some(app) = err.as_application_error() {
            return FormattedString(format!(
                "{} code={} message={:?}",
                "Application Error:".red().bold(),
                app.code,
                app.message
            ));
        }

        let title = match &err {
            RpcError::Transport(_) => "Transport Error:",
            RpcError::Encoding(_) => "Failed to encode request:",
            RpcError::Decoding(_) => "Failed to decode response:",
            RpcError::PreHook(_) => "Request rejected:",
            _ => "Call Failed:",
        };

        Self::titled(title, err)
    }
}

impl From<TransportError> for FormattedString {
    fn from(err: TransportError) -> Self {
        Self::titled("Connection Error:", err)
    }
}

impl From<prost_reflect::DescriptorError> for FormattedString {
    fn from(err: prost_reflect::DescriptorError) -> Self {
        Self::titled("Failed to parse file descriptor:", err)
    }
}

impl From<std::io::Error> for FormattedString {
    fn from(err: std::io::Error) -> Self {
        Self::titled("Failed to read file:", err)
    }
}

/// An ad-hoc error: a title and whatever went wrong.
pub struct GenericError<T: Display>(pub &'static str, pub T);

impl<T: Display> From<GenericError<T>> for FormattedString {
    fn from(GenericError(title, err): GenericError<T>) -> Self {
        Self::titled(&format!("{title}:"), err)
    }
}
