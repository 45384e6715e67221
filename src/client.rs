use std::io::Write;

#[cfg(unix)]
use tokio::net::UnixStream;
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
};

use crate::{
    config::{Endpoint, GatewayConfig},
    error::{GatewayError, Result},
    rpc::{Argument, CallId, ReturnValue, RpcRequest, RpcResponse, Target, read_packet, write_packet},
};

pub trait AsyncStream: AsyncRead + AsyncWrite {}
impl<T: AsyncRead + AsyncWrite + Unpin> AsyncStream for T {}

/// A remote entry point together with its arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    /// Method on the object the gateway exposes as its entry point.
    Bound { method: String, args: Vec<Argument> },
    /// Method reached through a fully-qualified static path.
    Static {
        path: String,
        method: String,
        args: Vec<Argument>,
    },
}

impl Call {
    pub fn bound(method: &str, args: Vec<Argument>) -> Self {
        Call::Bound {
            method: method.into(),
            args,
        }
    }

    pub fn on_static(path: &str, method: &str, args: Vec<Argument>) -> Self {
        Call::Static {
            path: path.into(),
            method: method.into(),
            args,
        }
    }

    fn into_request(self, call_id: CallId) -> RpcRequest {
        match self {
            Call::Bound { method, args } => RpcRequest::Call {
                call_id,
                target: Target::EntryPoint,
                method,
                args,
            },
            Call::Static { path, method, args } => RpcRequest::Call {
                call_id,
                target: Target::Static { path },
                method,
                args,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Unit,
    Text(String),
    Number(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum InvocationResult {
    Scalar(Scalar),
    NumericSequence(Vec<f64>),
}

impl InvocationResult {
    /// Short description of the result shape, used for diagnostics.
    pub fn kind(&self) -> String {
        match self {
            InvocationResult::Scalar(Scalar::Unit) => "unit".into(),
            InvocationResult::Scalar(Scalar::Text(_)) => "text".into(),
            InvocationResult::Scalar(Scalar::Number(_)) => "number".into(),
            InvocationResult::NumericSequence(values) => format!("sequence<f64>[{}]", values.len()),
        }
    }
}

impl From<ReturnValue> for InvocationResult {
    fn from(value: ReturnValue) -> Self {
        match value {
            ReturnValue::Void => InvocationResult::Scalar(Scalar::Unit),
            ReturnValue::Text(s) => InvocationResult::Scalar(Scalar::Text(s)),
            ReturnValue::Number(n) => InvocationResult::Scalar(Scalar::Number(n)),
            ReturnValue::Floats(v) => InvocationResult::NumericSequence(v),
        }
    }
}

/// The single connection to a companion gateway.
///
/// Calls are strictly sequential: each [`invoke`](Self::invoke) writes one
/// request and waits for its response before returning. There is no retry or
/// timeout; any failure is handed back to the caller.
pub struct GatewayConnection {
    endpoint: Endpoint,
    stream: Box<dyn AsyncStream + Send + Unpin>,
}

impl GatewayConnection {
    /// Opens the connection described by `config`.
    ///
    /// # Errors
    ///
    /// [`GatewayError::Connection`] if nothing is listening on the endpoint.
    pub async fn connect(config: &GatewayConfig) -> Result<Self> {
        let endpoint = config.endpoint.clone();
        let connect_err = |source| GatewayError::Connection {
            endpoint: endpoint.to_string(),
            source,
        };

        let stream: Box<dyn AsyncStream + Send + Unpin> = match &endpoint {
            Endpoint::Tcp(addr) => {
                let tcp = TcpStream::connect(addr.as_str()).await.map_err(connect_err)?;
                tcp.set_nodelay(true).map_err(connect_err)?;
                log::debug!("Client connected via TCP: {addr}");
                Box::new(tcp)
            }
            #[cfg(unix)]
            Endpoint::Unix(path) => {
                let unix = UnixStream::connect(path).await.map_err(connect_err)?;
                log::debug!("Client connected via Unix socket: {}", path.display());
                Box::new(unix)
            }
        };

        Ok(Self { endpoint, stream })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Invokes one remote entry point and waits for the result.
    ///
    /// # Errors
    ///
    /// * [`GatewayError::RemoteInvocation`] when the companion reports a failure
    ///   (unknown method, wrong arity, exception in the method).
    /// * [`GatewayError::Transport`] / [`GatewayError::Codec`] when the stream
    ///   breaks or carries something that is not a matching response.
    pub async fn invoke(&mut self, call: Call) -> Result<InvocationResult> {
        let call_id = CallId::new();
        let req = call.into_request(call_id.clone());
        let RpcRequest::Call { target, method, .. } = &req;
        let (target, method) = (target.clone(), method.clone());

        log::debug!("Invoking {target}.{method} ({call_id:?})");
        let data = serde_json::to_vec(&req)?;
        write_packet(&mut self.stream, &data).await?;

        let buf = read_packet(&mut self.stream).await?;
        match serde_json::from_slice::<RpcResponse>(&buf)? {
            RpcResponse::Result { call_id: id, value } if id == call_id => Ok(value.into()),
            RpcResponse::Error { call_id: id, message }
                if id.as_ref().is_none_or(|id| *id == call_id) =>
            {
                Err(GatewayError::RemoteInvocation {
                    target,
                    method,
                    message,
                })
            }
            other => Err(GatewayError::Transport(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("response does not match call {call_id:?}: {other:?}"),
            ))),
        }
    }

    /// Ends the session. Dropping the connection has the same effect.
    pub async fn close(mut self) -> Result<()> {
        self.stream.shutdown().await?;
        log::debug!("Connection to {} closed", self.endpoint);
        Ok(())
    }
}

/// Writes a result the way the call scenarios print it: text and numbers on
/// one line, nothing for unit, one line per element for sequences.
pub fn render<W: Write>(result: &InvocationResult, out: &mut W) -> std::io::Result<()> {
    match result {
        InvocationResult::Scalar(Scalar::Unit) => {}
        InvocationResult::Scalar(Scalar::Text(s)) => writeln!(out, "{s}")?,
        InvocationResult::Scalar(Scalar::Number(n)) => writeln!(out, "{n}")?,
        InvocationResult::NumericSequence(values) => {
            for x in values {
                writeln!(out, "{x}")?;
            }
        }
    }
    out.flush()
}
