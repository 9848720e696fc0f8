use std::io::ErrorKind;

use tokio_tungstenite::tungstenite;

/// Every way a relay session can fail.
///
/// Only [`RelayError::is_reset`] errors are swallowed by the relay; everything
/// else tears the session down and is returned to the caller.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("upstream websocket error: {0}")]
    Upstream(#[from] tungstenite::Error),

    #[error("client websocket error: {0}")]
    ClientSocket(#[from] axum::Error),

    #[error("failed to decode frame: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("malformed {message_type} message: {reason}")]
    MalformedMessage {
        message_type: &'static str,
        reason: &'static str,
    },

    #[error("upstream requested unregistered tool '{0}'")]
    UnknownTool(String),

    #[error("function call '{0}' completed without being created first")]
    UnknownCall(String),

    #[error("tool '{0}' is registered twice")]
    DuplicateTool(String),

    #[error("failed to acquire credentials: {0}")]
    Credential(String),

    #[error("invalid header value for {0}")]
    InvalidHeader(&'static str),

    #[error("token fetch task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl RelayError {
    /// Whether the error means the peer went away without a clean close.
    pub fn is_reset(&self) -> bool {
        match self {
            RelayError::Upstream(e) => match e {
                tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => true,
                // SendAfterClosing: we already sent our close frame.
                tungstenite::Error::Protocol(
                    tungstenite::error::ProtocolError::ResetWithoutClosingHandshake
                    | tungstenite::error::ProtocolError::SendAfterClosing,
                ) => true,
                tungstenite::Error::Io(io) => is_reset_kind(io.kind()),
                _ => false,
            },
            // The client socket only surfaces transport failures, all of
            // which mean the browser side is gone.
            RelayError::ClientSocket(_) => true,
            _ => false,
        }
    }
}

fn is_reset_kind(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_reset_is_swallowed() {
        let err = RelayError::from(tungstenite::Error::Io(std::io::Error::from(
            ErrorKind::ConnectionReset,
        )));
        assert!(err.is_reset());

        let err = RelayError::from(tungstenite::Error::Protocol(
            tungstenite::error::ProtocolError::ResetWithoutClosingHandshake,
        ));
        assert!(err.is_reset());

        let err = RelayError::from(tungstenite::Error::Protocol(
            tungstenite::error::ProtocolError::SendAfterClosing,
        ));
        assert!(err.is_reset());
    }

    #[test]
    fn test_other_faults_are_not_resets() {
        assert!(!RelayError::UnknownTool("Search".to_string()).is_reset());

        let err = RelayError::from(tungstenite::Error::Io(std::io::Error::from(
            ErrorKind::PermissionDenied,
        )));
        assert!(!err.is_reset());

        let decode = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(!RelayError::from(decode).is_reset());
    }
}
