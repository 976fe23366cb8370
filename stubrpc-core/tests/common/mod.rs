#![allow(dead_code)]

use bytes::Bytes;
use prost_types::{
    DescriptorProto, FieldDescriptorProto, FileDescriptorProto, FileDescriptorSet,
    MethodDescriptorProto, ServiceDescriptorProto,
    field_descriptor_proto::{Label, Type},
};
use serde_json::Value;
use std::{
    io,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use stubrpc_core::{Transport, TransportError, prost_reflect::DescriptorPool};

type Responder = Box<dyn Fn(&str, &[u8]) -> Result<Bytes, TransportError> + Send + Sync>;

/// An in-memory transport answering with a fixed function and recording every exchange.
///
/// JSON payloads carrying a `delay_ms` field are answered after that many milliseconds.
pub struct ScriptedTransport {
    responder: Responder,
    exchanges: Mutex<Vec<(String, Bytes)>>,
    closed: AtomicBool,
}

impl ScriptedTransport {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str, &[u8]) -> Result<Bytes, TransportError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            exchanges: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn replying(response: Value) -> Self {
        let body = Bytes::from(serde_json::to_vec(&response).unwrap());
        Self::new(move |_, _| Ok(body.clone()))
    }

    pub fn echo() -> Self {
        Self::new(|_, payload| Ok(Bytes::copy_from_slice(payload)))
    }

    pub fn refusing() -> Self {
        Self::new(|endpoint, _| {
            Err(TransportError::Unreachable {
                target: endpoint.to_string(),
                cause: "connection refused".to_string(),
            })
        })
    }

    pub fn exchanges(&self) -> Vec<(String, Bytes)> {
        self.exchanges.lock().unwrap().clone()
    }

    pub fn exchange_count(&self) -> usize {
        self.exchanges.lock().unwrap().len()
    }

    /// The JSON body of the `index`-th exchange.
    pub fn sent_json(&self, index: usize) -> Value {
        let (_, payload) = &self.exchanges()[index];
        serde_json::from_slice(payload).unwrap()
    }
}

impl Transport for ScriptedTransport {
    async fn exchange(&self, endpoint: &str, payload: Bytes) -> Result<Bytes, TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }

        self.exchanges
            .lock()
            .unwrap()
            .push((endpoint.to_string(), payload.clone()));

        let delay = serde_json::from_slice::<Value>(&payload)
            .ok()
            .and_then(|body| body.get("delay_ms").and_then(Value::as_u64));

        if let Some(millis) = delay {
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }

        (self.responder)(endpoint, &payload)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Everything the `fmt` subscriber writes on this thread while the returned guard lives.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn install() -> (Self, tracing::subscriber::DefaultGuard) {
        let logs = Self::default();
        let writer = logs.clone();

        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(move || writer.clone())
            .finish();

        (logs, tracing::subscriber::set_default(subscriber))
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    /// The lines carrying `message`.
    pub fn lines_with(&self, message: &str) -> Vec<String> {
        self.contents()
            .lines()
            .filter(|line| line.contains(message))
            .map(str::to_string)
            .collect()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn field(name: &str, number: i32, kind: Type, label: Label) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(label as i32),
        r#type: Some(kind as i32),
        ..Default::default()
    }
}

/// Descriptor pool for:
///
/// ```proto
/// package cmd;
///
/// message CmdRequest { string name = 1; repeated string args = 2; }
/// message CmdResponse { int32 code = 1; string msg = 2; string data = 3; }
///
/// service CmdService {
///   rpc Run(CmdRequest) returns (CmdResponse);
///   rpc Echo(CmdRequest) returns (CmdRequest);
/// }
/// ```
pub fn cmd_descriptor_pool() -> DescriptorPool {
    let method = |name: &str, input: &str, output: &str| MethodDescriptorProto {
        name: Some(name.to_string()),
        input_type: Some(input.to_string()),
        output_type: Some(output.to_string()),
        ..Default::default()
    };

    let file = FileDescriptorProto {
        name: Some("cmd.proto".to_string()),
        package: Some("cmd".to_string()),
        syntax: Some("proto3".to_string()),
        message_type: vec![
            DescriptorProto {
                name: Some("CmdRequest".to_string()),
                field: vec![
                    field("name", 1, Type::String, Label::Optional),
                    field("args", 2, Type::String, Label::Repeated),
                ],
                ..Default::default()
            },
            DescriptorProto {
                name: Some("CmdResponse".to_string()),
                field: vec![
                    field("code", 1, Type::Int32, Label::Optional),
                    field("msg", 2, Type::String, Label::Optional),
                    field("data", 3, Type::String, Label::Optional),
                ],
                ..Default::default()
            },
        ],
        service: vec![ServiceDescriptorProto {
            name: Some("CmdService".to_string()),
            method: vec![
                method("Run", ".cmd.CmdRequest", ".cmd.CmdResponse"),
                method("Echo", ".cmd.CmdRequest", ".cmd.CmdRequest"),
            ],
            ..Default::default()
        }],
        ..Default::default()
    };

    DescriptorPool::from_file_descriptor_set(FileDescriptorSet { file: vec![file] }).unwrap()
}
