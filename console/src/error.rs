//! Error type shared by the HTTP client, session channels and state feeds.
//!
//! Every failure crossing the backend boundary falls into one of two buckets:
//!
//! - **business**: the backend answered with a well-formed reply whose
//!   `Error` field is non-empty ([`ClientError::Backend`]);
//! - **transport**: anything else: refused/dropped connections, timeouts,
//!   WebSocket failures, or a reply that could not be decoded.
//!
//! The split decides which notification the user sees: business messages are
//! shown verbatim, transport failures get a generic connectivity message.

/// Errors returned by [`BackendClient`](crate::client::BackendClient) methods
/// and by feed decoding.
#[derive(Debug)]
pub enum ClientError {
    /// HTTP transport error (connection refused, timeout, DNS failure, etc.).
    Request(reqwest::Error),
    /// WebSocket handshake or stream failure.
    WebSocket(tokio_tungstenite::tungstenite::Error),
    /// The reply or frame could not be decoded.
    Protocol(String),
    /// The backend reported an error in the `Error` field.
    Backend(String),
}

impl ClientError {
    /// Returns `true` for every variant except [`ClientError::Backend`].
    pub fn is_transport(&self) -> bool {
        !matches!(self, ClientError::Backend(_))
    }
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Request(e) => write!(f, "HTTP request failed: {e}"),
            ClientError::WebSocket(e) => write!(f, "WebSocket failed: {e}"),
            ClientError::Protocol(msg) => write!(f, "Protocol error: {msg}"),
            ClientError::Backend(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClientError::Request(e) => Some(e),
            ClientError::WebSocket(e) => Some(e),
            ClientError::Protocol(_) | ClientError::Backend(_) => None,
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        ClientError::WebSocket(e)
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::Protocol(format!("Invalid JSON from backend: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_displays_verbatim() {
        let err = ClientError::Backend("no such container".into());
        assert_eq!(err.to_string(), "no such container");
        assert!(!err.is_transport());
    }

    #[test]
    fn protocol_error_is_transport() {
        let err: ClientError = serde_json::from_str::<serde_json::Value>("{oops")
            .unwrap_err()
            .into();
        assert!(err.is_transport());
        assert!(err.to_string().starts_with("Protocol error"));
    }
}
