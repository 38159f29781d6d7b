// ── Core error types ──
//
// User-facing errors from circlescope-core. Consumers never see raw
// reqwest or serde failures: the `From<circlescope_api::Error>` impl
// translates transport-layer errors into domain-appropriate variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach dashboard server at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Dashboard server timed out")]
    Timeout,

    #[error("Live stream unavailable: {reason}")]
    StreamUnavailable { reason: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Not found: {path}")]
    NotFound { path: String },

    #[error("Server error {status} from {path}")]
    Server { status: u16, path: String },

    #[error("Unexpected response: {message}")]
    InvalidResponse { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("Sync controller already started")]
    AlreadyStarted,
}

impl CoreError {
    /// HTTP status behind this error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::NotFound { .. } => Some(404),
            Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<circlescope_api::Error> for CoreError {
    fn from(err: circlescope_api::Error) -> Self {
        use circlescope_api::Error as Api;

        match err {
            Api::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                }
            }
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            Api::Tls(msg) => CoreError::Config {
                message: format!("TLS: {msg}"),
            },
            Api::WebSocketConnect(reason) | Api::Send(reason) => {
                CoreError::StreamUnavailable { reason }
            }
            Api::WebSocketClosed { code, reason } => CoreError::StreamUnavailable {
                reason: format!("closed (code {code}): {reason}"),
            },
            Api::Status { status: 404, path } => CoreError::NotFound { path },
            Api::Status { status, path } => CoreError::Server { status, path },
            Api::Decode { message, body: _ } => CoreError::InvalidResponse { message },
        }
    }
}
