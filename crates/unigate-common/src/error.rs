#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("config error: {0}")]
    Config(String),
    /// The token endpoint rejected the client-credentials grant.
    #[error("oauth failed: {status} {body}")]
    Auth { status: u16, body: String },
    /// A provider answered outside 2xx where the body is not relayed verbatim.
    #[error("upstream error: {status}")]
    Upstream { status: u16 },
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    /// Connect/read failure before any upstream status was received.
    #[error("transport error: {0}")]
    Transport(String),
}

impl GatewayError {
    /// HTTP status the error maps to at the gateway boundary.
    pub fn status(&self) -> u16 {
        match self {
            GatewayError::Config(_) => 500,
            GatewayError::Auth { .. } => 502,
            GatewayError::Upstream { .. } => 502,
            GatewayError::NotFound(_) => 404,
            GatewayError::Validation(_) => 400,
            GatewayError::Transport(_) => 502,
        }
    }
}
