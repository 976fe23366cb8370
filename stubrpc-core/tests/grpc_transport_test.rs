use bytes::Bytes;
use common::cmd_descriptor_pool;
use http_body::Body as HttpBody;
use serde_json::{Map, Value, json};
use std::{
    convert::Infallible,
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};
use stubrpc_core::{
    BoxError, GrpcTransport, RequestValue, Rpc, RpcError, RpcOptions, SchemaSerializer,
    Serializer, Shape, Transport, TransportError,
    hooks::{StatusCodeHook, status_code_hook},
    signature,
    transport::grpc::BytesCodec,
};
use tonic::{Code, Status, codegen::Service, server::UnaryService};

mod common;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// The methods of `cmd.CmdService`, served from raw message bytes.
#[derive(Clone)]
enum Handler {
    Echo,
    Run(Arc<SchemaSerializer>),
    Slow,
    Deny,
}

impl Handler {
    async fn handle(self, payload: Bytes) -> Result<Bytes, Status> {
        match self {
            Handler::Echo => Ok(payload),
            Handler::Run(serializer) => run_command(&serializer, &payload),
            Handler::Slow => {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok(payload)
            }
            Handler::Deny => Err(Status::permission_denied("nope")),
        }
    }
}

fn run_command(serializer: &SchemaSerializer, payload: &[u8]) -> Result<Bytes, Status> {
    let request = serializer
        .deserialize(payload, &Shape::schema("cmd.CmdRequest"))
        .map_err(|e| Status::invalid_argument(e.to_string()))?;

    let name = request["name"].as_str().unwrap_or_default();
    let args: Vec<&str> = request["args"]
        .as_array()
        .map(|args| args.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let response = if name == "fail" {
        json!({ "code": 500, "msg": "boom" })
    } else {
        let output = format!("{name} {}", args.join(" "));
        json!({ "code": 200, "msg": "ok", "data": output.trim_end() })
    };

    let response = RequestValue::from_json(Shape::schema("cmd.CmdResponse"), response)
        .ok_or_else(|| Status::internal("response is not an object"))?;

    serializer
        .serialize(&response)
        .map_err(|e| Status::internal(e.to_string()))
}

impl UnaryService<Bytes> for Handler {
    type Response = Bytes;
    type Future = BoxFuture<Result<tonic::Response<Bytes>, Status>>;

    fn call(&mut self, request: tonic::Request<Bytes>) -> Self::Future {
        let handler = self.clone();

        Box::pin(async move {
            handler
                .handle(request.into_inner())
                .await
                .map(tonic::Response::new)
        })
    }
}

/// An in-process `cmd.CmdService` server.
#[derive(Clone)]
struct CmdService {
    serializer: Arc<SchemaSerializer>,
}

impl CmdService {
    fn new() -> Self {
        Self {
            serializer: Arc::new(SchemaSerializer::new(cmd_descriptor_pool())),
        }
    }
}

impl<B> Service<http::Request<B>> for CmdService
where
    B: HttpBody + Send + 'static,
    B::Error: Into<BoxError> + Send + 'static,
{
    type Response = http::Response<tonic::body::Body>;
    type Error = Infallible;
    type Future = BoxFuture<Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: http::Request<B>) -> Self::Future {
        let handler = match request.uri().path() {
            "/cmd.CmdService/Echo" => Handler::Echo,
            "/cmd.CmdService/Run" => Handler::Run(Arc::clone(&self.serializer)),
            "/cmd.CmdService/Slow" => Handler::Slow,
            "/cmd.CmdService/Deny" => Handler::Deny,
            _ => return Box::pin(async { Ok(Status::unimplemented("unknown method").into_http()) }),
        };

        Box::pin(async move {
            let mut grpc = tonic::server::Grpc::new(BytesCodec);
            Ok(grpc.unary(handler, request).await)
        })
    }
}

type CmdRpc = Rpc<GrpcTransport<CmdService>, SchemaSerializer>;

fn schema_rpc(transport: GrpcTransport<CmdService>, options: RpcOptions) -> Arc<CmdRpc> {
    Arc::new(Rpc::with_schema(transport, cmd_descriptor_pool(), options))
}

#[tokio::test]
async fn test_schema_stub_over_grpc() {
    let options = RpcOptions::default().post_hook(status_code_hook(StatusCodeHook::default()));
    let rpc = schema_rpc(GrpcTransport::from_service(CmdService::new()), options);

    let run = rpc
        .stub("/cmd.CmdService/Run", signature!(name, args = json!([])))
        .unwrap()
        .with_request_shape(Shape::schema("cmd.CmdRequest"))
        .with_response_shape(Shape::schema("cmd.CmdResponse"));

    assert_eq!(run.call([json!("ls"), json!(["/", "-l"])]).await.unwrap(), "ls / -l");

    let err = run.call([json!("fail")]).await.unwrap_err();
    let app = err.as_application_error().unwrap();
    assert_eq!(app.code, 500);
    assert_eq!(app.message, "boom");
}

#[tokio::test]
async fn test_decoded_responses_carry_only_sent_fields() {
    let rpc = schema_rpc(
        GrpcTransport::from_service(CmdService::new()),
        RpcOptions::default(),
    );

    let echo = rpc
        .stub("/cmd.CmdService/Echo", signature!(name))
        .unwrap()
        .with_request_shape(Shape::schema("cmd.CmdRequest"))
        .with_response_shape(Shape::schema("cmd.CmdRequest"));

    let response = echo.call([json!("hello")]).await.unwrap();
    let err = echo.call([json!("")]).await.unwrap_err();

    assert_eq!(response, json!({ "name": "hello" }));
    assert!(
        matches!(&err, RpcError::Decoding(e) if e.is_schema_validation()),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn test_base_path_prefixes_endpoints() {
    let transport =
        GrpcTransport::from_service(CmdService::new()).with_base_path("/cmd.CmdService/");

    let response = transport
        .exchange("/Echo", Bytes::from_static(b"\x0a\x02hi"))
        .await
        .unwrap();

    assert_eq!(&response[..], b"\x0a\x02hi");
}

#[tokio::test]
async fn test_grpc_statuses_are_transport_errors() {
    let rpc = schema_rpc(
        GrpcTransport::from_service(CmdService::new()),
        RpcOptions::default(),
    );

    let denied = rpc
        .exchange_raw("/cmd.CmdService/Deny", Bytes::new())
        .await
        .unwrap_err();
    let unknown = rpc
        .exchange_raw("/cmd.CmdService/Missing", Bytes::new())
        .await
        .unwrap_err();

    match denied {
        RpcError::Transport(TransportError::Status { code, message, .. }) => {
            assert_eq!(code, Code::PermissionDenied as i32);
            assert_eq!(message, "nope");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(matches!(
        unknown,
        RpcError::Transport(TransportError::Status { code, .. }) if code == Code::Unimplemented as i32
    ));
}

#[tokio::test]
async fn test_slow_calls_time_out() {
    let transport = GrpcTransport::from_service(CmdService::new())
        .with_timeout(Duration::from_millis(50));

    let err = transport
        .exchange("/cmd.CmdService/Slow", Bytes::new())
        .await
        .unwrap_err();

    assert!(err.is_timeout());
}

#[tokio::test]
async fn test_closed_transport_refuses_calls() {
    let transport = GrpcTransport::from_service(CmdService::new());

    transport
        .exchange("/cmd.CmdService/Echo", Bytes::new())
        .await
        .unwrap();
    transport.close();
    transport.close();

    let err = transport
        .exchange("/cmd.CmdService/Echo", Bytes::new())
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::Closed));
}

#[tokio::test]
async fn test_concurrent_calls_share_one_channel() {
    let rpc = schema_rpc(
        GrpcTransport::from_service(CmdService::new()),
        RpcOptions::default(),
    );
    let echo = rpc
        .stub("/cmd.CmdService/Echo", signature!(name, args = json!([])))
        .unwrap()
        .with_request_shape(Shape::schema("cmd.CmdRequest"))
        .with_response_shape(Shape::schema("cmd.CmdRequest"));

    let calls = (0..16).map(|i| {
        let echo = echo.clone();
        let mut keyword = Map::new();
        keyword.insert("args".to_string(), json!([i.to_string()]));

        async move {
            let name = format!("call-{i}");
            let response = echo.call_with([json!(name)], keyword).await.unwrap();
            (name, i, response)
        }
    });

    for (name, i, response) in futures_util::future::join_all(calls).await {
        assert_eq!(response, json!({ "name": name, "args": [i.to_string()] }));
    }
}

#[tokio::test]
async fn test_connect_to_missing_server() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let result = GrpcTransport::connect(
        &format!("http://127.0.0.1:{port}"),
        Some(Duration::from_millis(500)),
    )
    .await;

    assert!(matches!(result, Err(TransportError::Unreachable { .. })));
}

#[tokio::test]
async fn test_connect_rejects_invalid_addresses() {
    let result = GrpcTransport::connect("not a uri", None).await;

    assert!(matches!(result, Err(TransportError::InvalidTarget { .. })));
}
