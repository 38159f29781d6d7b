use thiserror::Error;

/// Top-level error type for the `circlescope-api` crate.
///
/// Covers every failure mode of the live stream and the REST surface.
/// `circlescope-core` maps these into user-facing diagnostics; the
/// dashboard itself only ever logs them.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup error (unreadable or invalid CA certificate).
    #[error("TLS error: {0}")]
    Tls(String),

    /// WebSocket connection failed (handshake, network, protocol).
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed by the peer with a close frame.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    /// Writing a frame to an open WebSocket failed.
    #[error("WebSocket send failed: {0}")]
    Send(String),

    // ── Resource ────────────────────────────────────────────────────
    /// The server answered with a non-2xx status.
    #[error("HTTP {status} from {path}")]
    Status { status: u16, path: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON decoding failed, with the raw body for debugging.
    #[error("Decode error: {message}")]
    Decode { message: String, body: String },
}

/// Coarse classification used by the recovery policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connect/send/close failures on either channel.
    Transport,
    /// Malformed stream message or HTTP body.
    Decode,
    /// Non-2xx HTTP status.
    Resource,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Decode { .. } => ErrorKind::Decode,
            Self::Status { .. } => ErrorKind::Resource,
            Self::Transport(_)
            | Self::InvalidUrl(_)
            | Self::Tls(_)
            | Self::WebSocketConnect(_)
            | Self::WebSocketClosed { .. }
            | Self::Send(_) => ErrorKind::Transport,
        }
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::WebSocketConnect(_) | Self::WebSocketClosed { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if the server reported the resource as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn classifies_taxonomy() {
        let status = Error::Status {
            status: 404,
            path: "/api/recipes/missing".into(),
        };
        assert_eq!(status.kind(), ErrorKind::Resource);
        assert!(status.is_not_found());
        assert!(!status.is_transient());
        assert_eq!(status.status(), Some(404));

        let decode = Error::Decode {
            message: "expected value".into(),
            body: "<html>".into(),
        };
        assert_eq!(decode.kind(), ErrorKind::Decode);

        let ws = Error::WebSocketConnect("refused".into());
        assert_eq!(ws.kind(), ErrorKind::Transport);
        assert!(ws.is_transient());
    }

    #[test]
    fn server_errors_are_transient() {
        let err = Error::Status {
            status: 503,
            path: "/api/io/status".into(),
        };
        assert!(err.is_transient());
        assert_eq!(err.to_string(), "HTTP 503 from /api/io/status");
    }
}
