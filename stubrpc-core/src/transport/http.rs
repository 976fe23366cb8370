//! # HTTP Transport
//!
//! Performs one `POST` per exchange against `scheme://host:port{base_path}{endpoint}`.
//! The request body is exactly the serialized payload and the response body is read to
//! completion before being handed back.
//!
//! The response body is returned whatever the HTTP status is. Peers in this protocol
//! report failures inside the payload (e.g. `{"code": 500, "msg": "..."}`), which is the
//! post-hook's job to interpret.
use super::Transport;
use crate::error::TransportError;
use bytes::Bytes;
use std::{str::FromStr, sync::RwLock, time::Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scheme {
    #[default]
    Http,
    Https,
}

impl Scheme {
    fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    fn default_port(&self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

/// Connection settings of an [`HttpTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpTransportConfig {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    /// Prefix prepended to every endpoint, without a trailing slash (e.g. `/api`).
    pub base_path: String,
    /// Disable only for self-signed or test peers.
    pub verify_peer_certificate: bool,
    pub timeout: Option<Duration>,
}

impl HttpTransportConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme: Scheme::Http,
            host: host.into(),
            port,
            base_path: String::new(),
            verify_peer_certificate: true,
            timeout: None,
        }
    }

    /// Parses a base URL such as `https://example.com:8443/api`.
    pub fn from_url(url: &str) -> Result<Self, TransportError> {
        let invalid = |cause: &str| TransportError::InvalidTarget {
            target: url.to_string(),
            cause: cause.to_string(),
        };

        let uri = http::Uri::from_str(url).map_err(|e| invalid(&e.to_string()))?;

        let scheme = match uri.scheme_str() {
            Some("http") => Scheme::Http,
            Some("https") => Scheme::Https,
            Some(other) => return Err(invalid(&format!("unsupported scheme '{other}'"))),
            None => return Err(invalid("missing scheme")),
        };
        let host = uri.host().ok_or_else(|| invalid("missing host"))?;
        let port = uri.port_u16().unwrap_or_else(|| scheme.default_port());

        Ok(Self {
            scheme,
            host: host.to_string(),
            port,
            base_path: uri.path().trim_end_matches('/').to_string(),
            verify_peer_certificate: true,
            timeout: None,
        })
    }

    pub fn scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into().trim_end_matches('/').to_string();
        self
    }

    pub fn verify_peer_certificate(mut self, verify: bool) -> Self {
        self.verify_peer_certificate = verify;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The full URL an endpoint is sent to. The endpoint is appended verbatim.
    pub fn target(&self, endpoint: &str) -> String {
        format!(
            "{}://{}:{}{}{}",
            self.scheme.as_str(),
            self.host,
            self.port,
            self.base_path,
            endpoint
        )
    }
}

/// An HTTP transport backed by a `reqwest` client.
///
/// The client keeps its own connection pool, which tolerates concurrent exchanges.
/// [`Transport::close`] drops it.
#[derive(Debug)]
pub struct HttpTransport {
    config: HttpTransportConfig,
    client: RwLock<Option<reqwest::Client>>,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        if !config.verify_peer_certificate {
            tracing::warn!(
                host = %config.host,
                "peer certificate verification is disabled"
            );
        }

        let mut builder =
            reqwest::Client::builder().danger_accept_invalid_certs(!config.verify_peer_certificate);

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder
            .build()
            .map_err(|e| TransportError::InvalidTarget {
                target: config.target(""),
                cause: e.to_string(),
            })?;

        Ok(Self {
            config,
            client: RwLock::new(Some(client)),
        })
    }

    pub fn config(&self) -> &HttpTransportConfig {
        &self.config
    }

    // The client is reference counted internally, cloning it is cheap and keeps the lock
    // out of the exchange.
    fn client(&self) -> Result<reqwest::Client, TransportError> {
        self.client
            .read()
            .ok()
            .and_then(|guard| guard.clone())
            .ok_or(TransportError::Closed)
    }
}

impl Transport for HttpTransport {
    async fn exchange(&self, endpoint: &str, payload: Bytes) -> Result<Bytes, TransportError> {
        let client = self.client()?;
        let target = self.config.target(endpoint);

        let response = client
            .post(target.as_str())
            .body(payload)
            .send()
            .await
            .map_err(|e| map_reqwest_error(&target, e))?;

        tracing::debug!(url = %target, status = %response.status(), "received response");

        response
            .bytes()
            .await
            .map_err(|e| map_reqwest_error(&target, e))
    }

    fn close(&self) {
        if let Ok(mut client) = self.client.write() {
            client.take();
        }
    }
}

fn map_reqwest_error(target: &str, err: reqwest::Error) -> TransportError {
    let target = target.to_string();

    if err.is_timeout() {
        TransportError::Timeout { target }
    } else if err.is_builder() {
        TransportError::InvalidTarget {
            target,
            cause: err.to_string(),
        }
    } else if err.is_body() || err.is_decode() {
        TransportError::MalformedResponse {
            target,
            cause: err.to_string(),
        }
    } else {
        TransportError::Unreachable {
            target,
            cause: err.to_string(),
        }
    }
}
