/// Transport-level failure talking to an external system.
///
/// Business rejections never surface here; they come back inside the
/// planning or ERP response and are handled by the caller.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{gateway} unavailable: {message}")]
    Unavailable {
        gateway: &'static str,
        message: String,
    },

    #[error("{gateway} timed out after {timeout_secs}s")]
    Timeout {
        gateway: &'static str,
        timeout_secs: u64,
    },

    #[error("{gateway} returned HTTP {status}: {body}")]
    Status {
        gateway: &'static str,
        status: u16,
        body: String,
    },

    #[error("{gateway} response could not be decoded: {message}")]
    Decode {
        gateway: &'static str,
        message: String,
    },
}

impl GatewayError {
    pub fn gateway(&self) -> &'static str {
        match self {
            GatewayError::Unavailable { gateway, .. }
            | GatewayError::Timeout { gateway, .. }
            | GatewayError::Status { gateway, .. }
            | GatewayError::Decode { gateway, .. } => gateway,
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
