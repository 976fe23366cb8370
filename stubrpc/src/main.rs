//! # Stubrpc CLI Entry Point
//!
//! The main executable for the Stubrpc tool. This file drives the application lifecycle:
//!
//! 1. **Initialization**: Parses command-line arguments using [`cli::Cli`] and installs the
//!    log subscriber.
//! 2. **Connection**: Builds the selected transport and codec via `stubrpc_core`.
//! 3. **Execution**: Runs the call through an [`stubrpc_core::Rpc`] pipeline.
//! 4. **Presentation**: Prints the resulting value to standard output, or the error to
//!    standard error with exit status 1.

mod cli;
mod dispatch;
mod formatter;

use clap::Parser;
use cli::{CallArgs, Cli, Commands};
use dispatch::{AnyTransport, Codec};
use formatter::{FormattedString, GenericError};
use std::{process, time::Duration};
use stubrpc_core::{
    RequestValue, Rpc, RpcOptions, Shape,
    hooks::{StatusCodeHook, status_code_hook},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let args = Cli::parse();
    init_tracing(args.debug);

    match args.command {
        Commands::Call(call) => run_call(&args.url, call, args.debug).await,
    }
}

/// Logs go to stderr so that stdout only ever carries the call result.
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("warn,stubrpc=debug,stubrpc_core=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn exit_with(err: impl Into<FormattedString>) -> ! {
    eprintln!("{}", err.into());
    process::exit(1);
}

async fn run_call(url: &str, args: CallArgs, debug: bool) {
    let codec = Codec::load(args.file_descriptor_set.as_deref()).unwrap_or_else(|e| exit_with(e));

    let request_shape = args.request_type.map(Shape::Schema).unwrap_or_default();
    let response_shape = codec.response_shape(&args.endpoint, args.response_type);

    let Some(request) = RequestValue::from_json(request_shape, args.body) else {
        exit_with(GenericError("Invalid body", "expected a JSON object"));
    };

    let timeout = args.timeout_ms.map(Duration::from_millis);
    let transport = AnyTransport::connect(args.transport, url, args.insecure, timeout)
        .await
        .unwrap_or_else(|e| exit_with(e));

    // Failures are printed below; the pipeline only logs them in debug mode.
    let mut options = RpcOptions::default()
        .error_logging(debug)
        .debug_requests(debug);

    if let Some(code) = args.expect_code {
        options = options.post_hook(status_code_hook(StatusCodeHook::default().success_code(code)));
    }

    let rpc = Rpc::new(transport, codec, options);
    let result = rpc.request(&args.endpoint, request, &response_shape).await;
    rpc.close();

    match result {
        Ok(value) => println!("{}", FormattedString::from(value)),
        Err(err) => exit_with(err),
    }
}
