use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
#[cfg(unix)]
use tokio::net::UnixListener;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpListener,
};

use crate::{
    config::Endpoint,
    rpc::{Argument, ReturnValue, RpcRequest, RpcResponse, Target, read_packet, write_packet},
};

/// Result of a method on a [`RemoteObject`]; the error text is relayed to the
/// caller unchanged.
pub type MethodResult = Result<ReturnValue, String>;

/// An object whose methods can be invoked through the gateway.
///
/// Implementations are responsible for their own method lookup and arity
/// checks; whatever they return as `Err` becomes the caller's
/// `RemoteInvocation` diagnostic.
///
/// # Example
/// ```ignore
/// struct Greeter;
///
/// #[async_trait]
/// impl RemoteObject for Greeter {
///     async fn call(&self, method: &str, args: &[Argument]) -> MethodResult {
///         match (method, args) {
///             ("sayHello", []) => Ok(ReturnValue::Text("Hello".into())),
///             _ => Err(format!("No method {method}/{}", args.len())),
///         }
///     }
/// }
///
/// GatewayServerBuilder::new(Greeter)
///     .bind(&Endpoint::default())
///     .await?
///     .serve()
///     .await?;
/// ```
#[async_trait]
pub trait RemoteObject: Send + Sync {
    async fn call(&self, method: &str, args: &[Argument]) -> MethodResult;
}

type Objects = Arc<ObjectTable>;

struct ObjectTable {
    entry_point: Arc<dyn RemoteObject>,
    statics: HashMap<String, Arc<dyn RemoteObject>>,
}

impl ObjectTable {
    async fn dispatch(&self, target: &Target, method: &str, args: &[Argument]) -> MethodResult {
        let obj = match target {
            Target::EntryPoint => &self.entry_point,
            Target::Static { path } => self
                .statics
                .get(path)
                .ok_or_else(|| format!("No such static path: {path}"))?,
        };
        obj.call(method, args).await
    }
}

/// Builder for a gateway that exposes one entry-point object and any number
/// of static paths.
pub struct GatewayServerBuilder {
    entry_point: Arc<dyn RemoteObject>,
    statics: HashMap<String, Arc<dyn RemoteObject>>,
}

impl GatewayServerBuilder {
    pub fn new<T>(entry_point: T) -> Self
    where
        T: RemoteObject + 'static,
    {
        Self {
            entry_point: Arc::new(entry_point),
            statics: HashMap::new(),
        }
    }

    /// Exposes `obj` under a fully-qualified static path such as `housing.Model`.
    pub fn add_static<T>(mut self, path: &str, obj: T) -> Self
    where
        T: RemoteObject + 'static,
    {
        self.statics.insert(path.to_string(), Arc::new(obj));
        self
    }

    /// Binds the listener. Binding happens here so callers learn the actual
    /// address (useful with port 0) before serving starts.
    pub async fn bind(self, endpoint: &Endpoint) -> std::io::Result<GatewayServer> {
        let listener = match endpoint {
            Endpoint::Tcp(addr) => Listener::Tcp(TcpListener::bind(addr.as_str()).await?),
            #[cfg(unix)]
            Endpoint::Unix(path) => {
                let _ = std::fs::remove_file(path);
                Listener::Unix(UnixListener::bind(path)?)
            }
        };

        Ok(GatewayServer {
            listener,
            objects: Arc::new(ObjectTable {
                entry_point: self.entry_point,
                statics: self.statics,
            }),
        })
    }
}

enum Listener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

pub struct GatewayServer {
    listener: Listener,
    objects: Objects,
}

impl GatewayServer {
    /// The bound endpoint.
    pub fn endpoint(&self) -> std::io::Result<Endpoint> {
        match &self.listener {
            Listener::Tcp(l) => Ok(Endpoint::Tcp(l.local_addr()?.to_string())),
            #[cfg(unix)]
            Listener::Unix(l) => {
                let addr = l.local_addr()?;
                let path = addr.as_pathname().ok_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::InvalidInput, "unnamed unix socket")
                })?;
                Ok(Endpoint::Unix(path.to_path_buf()))
            }
        }
    }

    /// Accepts connections forever, one task per connection.
    pub async fn serve(self) -> std::io::Result<()> {
        loop {
            match &self.listener {
                Listener::Tcp(l) => match l.accept().await {
                    Ok((stream, peer)) => {
                        log::debug!("Gateway accepted TCP connection from {peer}");
                        spawn_session(stream, self.objects.clone());
                    }
                    Err(e) => log::error!("TCP accept error: {e:?}"),
                },
                #[cfg(unix)]
                Listener::Unix(l) => match l.accept().await {
                    Ok((stream, _)) => {
                        log::debug!("Gateway accepted Unix connection");
                        spawn_session(stream, self.objects.clone());
                    }
                    Err(e) => log::error!("Unix accept error: {e:?}"),
                },
            }
        }
    }
}

fn spawn_session<S>(stream: S, objects: Objects)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = run_session(stream, objects).await {
            log::warn!("Gateway session ended with error: {e}");
        }
    });
}

/// Serves one caller: read a request, dispatch it, write the response, repeat
/// until the caller hangs up.
async fn run_session<S>(mut stream: S, objects: Objects) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let buf = match read_packet(&mut stream).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                log::debug!("Caller disconnected");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let resp = match serde_json::from_slice::<RpcRequest>(&buf) {
            Ok(RpcRequest::Call {
                call_id,
                target,
                method,
                args,
            }) => {
                log::debug!("Gateway handling {target}.{method}({args:?})");
                match objects.dispatch(&target, &method, &args).await {
                    Ok(value) => RpcResponse::Result { call_id, value },
                    Err(message) => RpcResponse::Error {
                        call_id: Some(call_id),
                        message,
                    },
                }
            }
            Err(e) => RpcResponse::Error {
                call_id: None,
                message: format!("Invalid request: {e}"),
            },
        };

        let data = serde_json::to_vec(&resp)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        write_packet(&mut stream, &data).await?;
    }
}
