use thiserror::Error;

use crate::rpc::Target;

#[derive(Error, Debug)]
pub enum GatewayError {
    /// The companion process could not be reached at startup.
    #[error("Cannot connect to gateway at {endpoint}: {source}")]
    Connection {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    /// The companion rejected or failed the call.
    #[error("Remote call {target}.{method} failed: {message}")]
    RemoteInvocation {
        target: Target,
        method: String,
        message: String,
    },

    #[error("Gateway transport failed: {0}")]
    Transport(#[from] std::io::Error),

    #[error("Malformed gateway message: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("Cannot write result: {0}")]
    Output(std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    pub fn is_connection(&self) -> bool {
        matches!(self, GatewayError::Connection { .. })
    }

    /// True for every failure that happens once a call is in flight.
    pub fn is_remote_invocation(&self) -> bool {
        matches!(
            self,
            GatewayError::RemoteInvocation { .. }
                | GatewayError::Transport(_)
                | GatewayError::Codec(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
