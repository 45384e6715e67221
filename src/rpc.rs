use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Conventional address of the gateway server on the companion side.
pub const DEFAULT_ADDR: &str = "127.0.0.1:25333";

/// Upper bound for a single frame. Simulation results are a few thousand
/// floats, so anything near this is a corrupted length prefix.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(pub String);

impl CallId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

/// Which object on the companion side receives a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Target {
    /// The object registered as the gateway entry point.
    EntryPoint,
    /// A static method container addressed by its fully-qualified path.
    Static { path: String },
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::EntryPoint => f.write_str("entry_point"),
            Target::Static { path } => f.write_str(path),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Argument {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

impl Argument {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Argument::Int(i) => Some(*i as f64),
            Argument::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl From<f64> for Argument {
    fn from(value: f64) -> Self {
        Argument::Float(value)
    }
}

impl From<i64> for Argument {
    fn from(value: i64) -> Self {
        Argument::Int(value)
    }
}

impl From<&str> for Argument {
    fn from(value: &str) -> Self {
        Argument::Text(value.to_string())
    }
}

impl From<bool> for Argument {
    fn from(value: bool) -> Self {
        Argument::Bool(value)
    }
}

/// Return shapes a remote method can produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReturnValue {
    Void,
    Text(String),
    Number(f64),
    Floats(Vec<f64>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RpcRequest {
    Call {
        call_id: CallId,
        target: Target,
        method: String,
        args: Vec<Argument>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RpcResponse {
    Result {
        call_id: CallId,
        value: ReturnValue,
    },
    Error {
        call_id: Option<CallId>,
        message: String,
    },
}

/// Writes one length-prefixed frame.
pub async fn write_packet<W>(writer: &mut W, data: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    if data.len() > MAX_FRAME_LEN {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("frame of {} bytes exceeds limit", data.len()),
        ));
    }
    writer.write_u32(data.len() as u32).await?;
    writer.write_all(data).await?;
    writer.flush().await
}

/// Reads one length-prefixed frame. A clean EOF before the header surfaces as
/// `UnexpectedEof`.
pub async fn read_packet<R>(reader: &mut R) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let len = reader.read_u32().await? as usize;
    if len > MAX_FRAME_LEN {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("frame of {len} bytes exceeds limit"),
        ));
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}
