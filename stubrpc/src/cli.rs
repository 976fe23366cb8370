//! # CLI
//!
//! This module defines the command-line interface of `stubrpc` using `clap`.
//!
//! It is responsible for parsing user input and validating it early (e.g. the body must be a
//! JSON object, endpoints must start with `/`).
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "stubrpc", version, about = "Call RPC endpoints over HTTP or gRPC")]
pub struct Cli {
    /// The peer base URL (e.g. http://192.168.50.76:3212/api)
    pub url: String,

    /// Log every outgoing request and the transport activity
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Perform a single call against an endpoint
    ///
    /// The JSON body becomes the named fields of the request. Without a descriptor set the
    /// body is sent as JSON, with one it is validated and encoded as Protobuf.
    ///
    /// ## Examples:
    ///
    /// ```bash
    /// stubrpc http://localhost:3212 call / --body '{"name": "ls", "args": ["/"]}' --expect-code 200
    /// stubrpc http://localhost:50051 call /cmd.CmdService/Run --transport grpc \
    ///     --body '{"name": "ls"}' --file-descriptor-set cmd.bin \
    ///     --request-type cmd.CmdRequest --response-type cmd.CmdResponse
    /// ```
    Call(CallArgs),
}

#[derive(Args)]
pub struct CallArgs {
    /// Endpoint path, appended to the URL (e.g. /run or /package.Service/Method)
    #[arg(value_parser = parse_endpoint)]
    pub endpoint: String,

    /// JSON object holding the request fields
    #[arg(long, value_parser = parse_body)]
    pub body: serde_json::Value,

    #[arg(long, value_enum, default_value_t = TransportKind::Http)]
    pub transport: TransportKind,

    /// Accept invalid TLS certificates (HTTP transport only)
    #[arg(long)]
    pub insecure: bool,

    /// Per-call timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Path to the descriptor set (.bin) used to encode requests as Protobuf
    #[arg(long, requires = "request_type")]
    pub file_descriptor_set: Option<PathBuf>,

    /// Fully qualified request message name (e.g. cmd.CmdRequest)
    #[arg(long, requires = "file_descriptor_set")]
    pub request_type: Option<String>,

    /// Fully qualified response message name (e.g. cmd.CmdResponse)
    #[arg(long, requires = "file_descriptor_set")]
    pub response_type: Option<String>,

    /// Treat the response as a {code, msg, data} envelope and fail unless code matches
    #[arg(long)]
    pub expect_code: Option<i64>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportKind {
    Http,
    Grpc,
}

fn parse_endpoint(value: &str) -> Result<String, String> {
    if !value.starts_with('/') {
        return Err(format!(
            "Invalid endpoint: '{value}'. Expected a path such as '/run'"
        ));
    }

    Ok(value.to_string())
}

fn parse_body(value: &str) -> Result<serde_json::Value, String> {
    let body: serde_json::Value =
        serde_json::from_str(value).map_err(|e| format!("Invalid JSON: {e}"))?;

    if !body.is_object() {
        return Err("The body must be a JSON object".to_string());
    }

    Ok(body)
}
