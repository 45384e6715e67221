use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use tokio::net::TcpListener;

use crate::{
    client::{Call, GatewayConnection, InvocationResult, Scalar, render},
    companion::{GatewayServerBuilder, MethodResult, RemoteObject},
    config::{Endpoint, GatewayConfig},
    error::GatewayError,
    rpc::{Argument, CallId, ReturnValue, RpcResponse, read_packet, write_packet},
    scenario,
};

const GREETING: &str = "Hello from the model companion";
const SEQUENCE_LEN: usize = 12;

/// Entry-point object; counts how often the print-only method ran.
struct Greeter {
    printed: Arc<AtomicUsize>,
}

#[async_trait]
impl RemoteObject for Greeter {
    async fn call(&self, method: &str, args: &[Argument]) -> MethodResult {
        match (method, args) {
            ("sayHello", []) => Ok(ReturnValue::Text(GREETING.into())),
            ("printHello", []) => {
                self.printed.fetch_add(1, Ordering::SeqCst);
                Ok(ReturnValue::Void)
            }
            _ => Err(format!("Method {method} with {} argument(s) does not exist", args.len())),
        }
    }
}

/// Deterministic stand-in for `housing.Model`.
struct StubModel;

#[async_trait]
impl RemoteObject for StubModel {
    async fn call(&self, method: &str, args: &[Argument]) -> MethodResult {
        match (method, args) {
            ("exec", []) => Ok(ReturnValue::Void),
            ("exec", [param]) => {
                let scale = param
                    .as_f64()
                    .ok_or_else(|| format!("exec expects a number, got {param:?}"))?;
                let values = (0..SEQUENCE_LEN as i32)
                    .map(|t| scale * 0.5f64.powi(t))
                    .collect();
                Ok(ReturnValue::Floats(values))
            }
            ("exec", _) => Err("java.lang.IllegalArgumentException: wrong number of arguments".into()),
            _ => Err(format!("Method {method} does not exist")),
        }
    }
}

struct Companion {
    config: GatewayConfig,
    printed: Arc<AtomicUsize>,
}

async fn start_companion_on(endpoint: Endpoint) -> Companion {
    let printed = Arc::new(AtomicUsize::new(0));
    let server = GatewayServerBuilder::new(Greeter {
        printed: printed.clone(),
    })
    .add_static(scenario::MODEL_PATH, StubModel)
    .bind(&endpoint)
    .await
    .unwrap();

    let config = GatewayConfig::new(server.endpoint().unwrap());
    tokio::spawn(server.serve());
    Companion { config, printed }
}

async fn start_companion() -> Companion {
    start_companion_on(Endpoint::Tcp("127.0.0.1:0".into())).await
}

/// An address nothing listens on.
async fn dead_endpoint() -> GatewayConfig {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    GatewayConfig::new(Endpoint::Tcp(addr.to_string()))
}

fn expected_sequence(scale: f64) -> Vec<f64> {
    (0..SEQUENCE_LEN as i32).map(|t| scale * 0.5f64.powi(t)).collect()
}

#[tokio::test]
async fn greeting_is_stable_and_non_empty() {
    let companion = start_companion().await;
    let mut conn = GatewayConnection::connect(&companion.config).await.unwrap();

    let first = conn.invoke(Call::bound("sayHello", vec![])).await.unwrap();
    let second = conn.invoke(Call::bound("sayHello", vec![])).await.unwrap();

    assert_eq!(first, InvocationResult::Scalar(Scalar::Text(GREETING.into())));
    assert_eq!(first, second);
}

#[tokio::test]
async fn print_only_call_returns_unit_and_acts_remotely() {
    let companion = start_companion().await;
    let mut conn = GatewayConnection::connect(&companion.config).await.unwrap();

    let result = conn.invoke(Call::bound("printHello", vec![])).await.unwrap();
    assert_eq!(result, InvocationResult::Scalar(Scalar::Unit));
    assert_eq!(companion.printed.load(Ordering::SeqCst), 1);

    let mut out = Vec::new();
    render(&result, &mut out).unwrap();
    assert!(out.is_empty());
}

#[tokio::test]
async fn exec_with_parameter_returns_a_stable_sequence() {
    let companion = start_companion().await;
    let mut conn = GatewayConnection::connect(&companion.config).await.unwrap();
    let call = Call::on_static("housing.Model", "exec", vec![1.5.into()]);

    let first = conn.invoke(call.clone()).await.unwrap();
    let second = conn.invoke(call).await.unwrap();

    assert_eq!(first, InvocationResult::NumericSequence(expected_sequence(1.5)));
    assert_eq!(first, second);
}

#[tokio::test]
async fn exec_without_arguments_does_not_fail() {
    let companion = start_companion().await;
    let mut conn = GatewayConnection::connect(&companion.config).await.unwrap();

    scenario::run_default_exec(&mut conn).await.unwrap();
    conn.close().await.unwrap();
}

#[tokio::test]
async fn full_scenario_prints_greeting_then_sequence() {
    let companion = start_companion().await;
    let mut conn = GatewayConnection::connect(&companion.config).await.unwrap();

    let mut out = Vec::new();
    scenario::run_full(&mut conn, &mut out).await.unwrap();

    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 1 + SEQUENCE_LEN);
    assert_eq!(lines[0], GREETING);

    let values: Vec<f64> = lines[1..].iter().map(|l| l.parse().unwrap()).collect();
    assert_eq!(values, expected_sequence(scenario::EXEC_PARAMETER));
    assert_eq!(companion.printed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unreachable_companion_is_a_connection_error() {
    let config = dead_endpoint().await;

    let err = match GatewayConnection::connect(&config).await {
        Ok(_) => panic!("connect should fail without a companion"),
        Err(e) => e,
    };
    assert!(err.is_connection(), "{err}");
    assert!(!err.is_remote_invocation());
}

#[tokio::test]
async fn unreachable_companion_prints_nothing() {
    let config = dead_endpoint().await;
    let mut out = Vec::new();

    // Same sequence as the binary: connect first, then run the calls.
    let res: crate::error::Result<()> = async {
        let mut conn = GatewayConnection::connect(&config).await?;
        scenario::run_full(&mut conn, &mut out).await
    }
    .await;

    let err = res.unwrap_err();
    assert!(err.is_connection(), "{err}");
    assert!(out.is_empty());
}

#[tokio::test]
async fn unknown_method_surfaces_the_remote_diagnostic() {
    let companion = start_companion().await;
    let mut conn = GatewayConnection::connect(&companion.config).await.unwrap();

    let err = conn
        .invoke(Call::bound("sayGoodbye", vec![]))
        .await
        .unwrap_err();
    match &err {
        GatewayError::RemoteInvocation { method, message, .. } => {
            assert_eq!(method, "sayGoodbye");
            assert!(message.contains("does not exist"), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.is_remote_invocation());

    // The connection stays usable after a remote failure.
    let result = conn.invoke(Call::bound("sayHello", vec![])).await.unwrap();
    assert_eq!(result, InvocationResult::Scalar(Scalar::Text(GREETING.into())));
}

#[tokio::test]
async fn arity_mismatch_and_unknown_path_are_remote_errors() {
    let companion = start_companion().await;
    let mut conn = GatewayConnection::connect(&companion.config).await.unwrap();

    let err = conn
        .invoke(Call::on_static(
            "housing.Model",
            "exec",
            vec![1.5.into(), 2.5.into()],
        ))
        .await
        .unwrap_err();
    assert!(
        matches!(&err, GatewayError::RemoteInvocation { message, .. } if message.contains("wrong number of arguments")),
        "{err}"
    );

    let err = conn
        .invoke(Call::on_static("housing.Missing", "exec", vec![]))
        .await
        .unwrap_err();
    assert!(
        matches!(&err, GatewayError::RemoteInvocation { message, .. } if message == "No such static path: housing.Missing"),
        "{err}"
    );
}

#[tokio::test]
async fn companion_hanging_up_mid_call_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = GatewayConfig::new(Endpoint::Tcp(listener.local_addr().unwrap().to_string()));

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let _ = read_packet(&mut stream).await;
        // dropping the stream closes the connection without answering
    });

    let mut conn = GatewayConnection::connect(&config).await.unwrap();
    let err = conn
        .invoke(Call::bound("sayHello", vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Transport(_)), "{err}");
    assert!(err.is_remote_invocation());
}

/// A companion that answers the first request with `frame` as-is.
async fn answer_first_call_with(frame: Vec<u8>) -> GatewayConfig {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = GatewayConfig::new(Endpoint::Tcp(listener.local_addr().unwrap().to_string()));

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let _ = read_packet(&mut stream).await;
        let _ = write_packet(&mut stream, &frame).await;
        let _ = read_packet(&mut stream).await;
    });

    config
}

#[tokio::test]
async fn response_for_another_call_is_a_transport_error() {
    let foreign = RpcResponse::Result {
        call_id: CallId("other".into()),
        value: ReturnValue::Text(GREETING.into()),
    };
    let config = answer_first_call_with(serde_json::to_vec(&foreign).unwrap()).await;

    let mut conn = GatewayConnection::connect(&config).await.unwrap();
    let err = conn
        .invoke(Call::bound("sayHello", vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Transport(_)), "{err}");
    assert!(err.is_remote_invocation());
}

#[tokio::test]
async fn undecodable_response_is_a_codec_error() {
    let config = answer_first_call_with(b"not json".to_vec()).await;

    let mut conn = GatewayConnection::connect(&config).await.unwrap();
    let err = conn
        .invoke(Call::bound("sayHello", vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Codec(_)), "{err}");
    assert!(err.is_remote_invocation());
}

#[tokio::test]
async fn scenario_stops_at_the_first_failed_call() {
    let companion = start_companion().await;
    let mut conn = GatewayConnection::connect(&companion.config).await.unwrap();

    // This companion exposes no housing.Model, so exec fails after the greeting.
    let bare = GatewayServerBuilder::new(Greeter {
        printed: Arc::new(AtomicUsize::new(0)),
    })
    .bind(&Endpoint::Tcp("127.0.0.1:0".into()))
    .await
    .unwrap();
    let bare_config = GatewayConfig::new(bare.endpoint().unwrap());
    tokio::spawn(bare.serve());

    let mut bare_conn = GatewayConnection::connect(&bare_config).await.unwrap();
    let mut out = Vec::new();
    let err = scenario::run_full(&mut bare_conn, &mut out).await.unwrap_err();

    assert!(err.is_remote_invocation(), "{err}");
    assert_eq!(String::from_utf8(out).unwrap(), format!("{GREETING}\n"));

    // The healthy companion is unaffected.
    scenario::run_default_exec(&mut conn).await.unwrap();
}

/// Removes a socket file when the test ends, pass or fail.
#[cfg(unix)]
struct SocketFile(std::path::PathBuf);

#[cfg(unix)]
impl Drop for SocketFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

#[cfg(unix)]
#[tokio::test]
async fn unix_socket_endpoint_works_end_to_end() {
    let socket = SocketFile(
        std::env::temp_dir().join(format!("model_gateway_{}.sock", uuid::Uuid::new_v4())),
    );
    let companion = start_companion_on(Endpoint::Unix(socket.0.clone())).await;
    assert_eq!(companion.config.endpoint, Endpoint::Unix(socket.0.clone()));

    let mut conn = GatewayConnection::connect(&companion.config).await.unwrap();
    let mut out = Vec::new();
    scenario::run_full(&mut conn, &mut out).await.unwrap();
    assert_eq!(String::from_utf8(out).unwrap().lines().count(), 1 + SEQUENCE_LEN);
}
