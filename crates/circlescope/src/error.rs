//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use circlescope_config::ConfigError;
use circlescope_core::CoreError;
use miette::Diagnostic;
use thiserror::Error;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not connect to dashboard server at {url}")]
    #[diagnostic(
        code(circlescope::connection_failed),
        help(
            "Check that the inspection PC is running and reachable.\n\
             URL: {url}\n\
             Try: circlescope snapshot status --server {url}"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Live stream unavailable: {reason}")]
    #[diagnostic(
        code(circlescope::stream_unavailable),
        help("The server must expose /ws/live. REST commands may still work.")
    )]
    StreamUnavailable { reason: String },

    #[error("Request timed out")]
    #[diagnostic(
        code(circlescope::timeout),
        help("Increase the timeout with --timeout or check server responsiveness.")
    )]
    Timeout,

    // ── Resources ────────────────────────────────────────────────────

    #[error("Not found: {path}")]
    #[diagnostic(
        code(circlescope::not_found),
        help("Run: circlescope snapshot recipes to list recipe names.")
    )]
    NotFound { path: String },

    #[error("Server returned HTTP {status} for {path}")]
    #[diagnostic(code(circlescope::server_error))]
    Server { status: u16, path: String },

    #[error("Unexpected response: {message}")]
    #[diagnostic(code(circlescope::invalid_response))]
    InvalidResponse { message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(circlescope::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(circlescope::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: circlescope config init --server URL --name {name}"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No dashboard server configured")]
    #[diagnostic(
        code(circlescope::no_config),
        help(
            "Pass --server URL, set CIRCLESCOPE_SERVER, or create a profile with:\n\
             circlescope config init --server URL\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(circlescope::config))]
    Config(ConfigError),

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    #[diagnostic(code(circlescope::io))]
    Io(#[from] std::io::Error),

    #[error("Could not render output: {message}")]
    #[diagnostic(code(circlescope::render))]
    Render { message: String },
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::StreamUnavailable { .. } => {
                exit_code::CONNECTION
            }
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::ProfileNotFound { .. } | Self::NoConfig { .. } => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed { url, reason },
            CoreError::Timeout => CliError::Timeout,
            CoreError::StreamUnavailable { reason } => CliError::StreamUnavailable { reason },
            CoreError::NotFound { path } => CliError::NotFound { path },
            CoreError::Server { status, path } => CliError::Server { status, path },
            CoreError::InvalidResponse { message } => CliError::InvalidResponse { message },
            CoreError::Config { message } => CliError::Validation {
                field: "server".into(),
                reason: message,
            },
            CoreError::AlreadyStarted => CliError::Validation {
                field: "watch".into(),
                reason: "dashboard already running".into(),
            },
        }
    }
}

impl From<circlescope_api::Error> for CliError {
    fn from(err: circlescope_api::Error) -> Self {
        CoreError::from(err).into()
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(other),
        }
    }
}
