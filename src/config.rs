#[cfg(unix)]
use std::path::PathBuf;

use crate::error::{GatewayError, Result};
use crate::rpc::DEFAULT_ADDR;

pub const ADDR_ENV: &str = "GATEWAY_ADDR";
const UNIX_PREFIX: &str = "unix:";

/// Where the companion gateway listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Tcp(String),
    #[cfg(unix)]
    Unix(PathBuf),
}

impl Endpoint {
    /// Parses `host:port` or `unix:/path/to/socket`.
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(GatewayError::Config("empty gateway address".into()));
        }

        if let Some(path) = value.strip_prefix(UNIX_PREFIX) {
            if path.is_empty() {
                return Err(GatewayError::Config("empty unix socket path".into()));
            }
            #[cfg(unix)]
            return Ok(Endpoint::Unix(PathBuf::from(path)));
            #[cfg(not(unix))]
            return Err(GatewayError::Config(format!(
                "unix sockets are not supported on this platform: {path}"
            )));
        }

        match value.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
                Ok(Endpoint::Tcp(value.to_string()))
            }
            _ => Err(GatewayError::Config(format!(
                "expected host:port or unix:<path>, got {value:?}"
            ))),
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Tcp(addr) => f.write_str(addr),
            #[cfg(unix)]
            Endpoint::Unix(path) => write!(f, "{UNIX_PREFIX}{}", path.display()),
        }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Endpoint::Tcp(DEFAULT_ADDR.to_string())
    }
}

#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    pub endpoint: Endpoint,
}

impl GatewayConfig {
    pub fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }

    /// Reads `GATEWAY_ADDR`, falling back to the default endpoint when unset.
    pub fn from_env() -> Result<Self> {
        Self::from_value(std::env::var(ADDR_ENV).ok().as_deref())
    }

    fn from_value(value: Option<&str>) -> Result<Self> {
        let endpoint = match value {
            Some(v) => Endpoint::parse(v)?,
            None => Endpoint::default(),
        };
        Ok(Self { endpoint })
    }
}
