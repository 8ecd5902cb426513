use crate::ConnectionStatus;

/// Configuration errors, the only failures surfaced as `Err` to the caller.
///
/// Anything that goes wrong while talking to a server is reported through
/// [ConnectionStatus] on the returned record instead.
#[derive(Debug, thiserror::Error)]
pub enum StatErr {
    /// Port 0 can not be probed.
    #[error("Invalid port: {0}")]
    InvalidPort(String),
    /// Address could not be split into host and port.
    #[error("Invalid socket address syntax: {0}")]
    InvalidAddr(String),
    /// A zero timeout would turn every probe into an instant timeout.
    #[error("Invalid timeout: {0}")]
    InvalidTimeout(String),
    /// Name given for the protocol variant is not one we speak.
    #[error("Unknown request type: {0}")]
    UnknownRequestType(String),
}

/// Failure of a single codec attempt.
#[derive(Debug, thiserror::Error)]
pub enum ProbeErr {
    /// Host unresolvable, connection refused or unreachable.
    #[error("connection failed: {0}")]
    ConnectionFailed(std::io::Error),
    /// Nothing arrived within the time budget.
    #[error("timed out waiting for the server")]
    Timeout,
    /// Socket error after the connection was established.
    #[error("socket error: {0}")]
    Io(std::io::Error),
    /// Response did not match the framing the codec expects.
    #[error("{0}")]
    DataErr(String),
    /// Json status payload could not be decoded.
    #[error("invalid status json: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProbeErr {
    /// Status value the failure is reported as.
    pub fn status(&self) -> ConnectionStatus {
        match self {
            ProbeErr::ConnectionFailed(_) => ConnectionStatus::ConnectionFailed,
            ProbeErr::Timeout => ConnectionStatus::Timeout,
            ProbeErr::Io(_) | ProbeErr::DataErr(_) | ProbeErr::Json(_) => {
                ConnectionStatus::Unknown
            }
        }
    }
}
