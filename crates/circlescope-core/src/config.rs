// ── Runtime dashboard configuration ──
//
// These types describe *how* to reach one dashboard server and how
// aggressively to keep in sync with it. They never touch disk: the CLI
// (via circlescope-config) constructs a `DashboardConfig` and hands it in.

use std::time::Duration;

use circlescope_api::{ApiClient, ReconnectConfig};
use circlescope_api::transport::{TlsMode, TransportConfig};
use url::Url;

use crate::error::CoreError;

/// Capacity of the recent-results history.
pub const HISTORY_CAPACITY: usize = 50;

/// History items requested by the startup load.
pub const DEFAULT_HISTORY_LIMIT: u32 = 50;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification (self-signed line PCs).
    DangerAcceptInvalid,
}

/// Configuration for syncing with a single dashboard server.
///
/// Built by the CLI, passed to `SyncController` -- core never reads config files.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Server origin (e.g., `http://line-3.local:8000`). Stream, REST,
    /// export and video URLs are all derived from it.
    pub origin: Url,
    /// TLS verification strategy.
    pub tls: TlsVerification,
    /// REST request timeout.
    pub timeout: Duration,
    /// Live stream reconnect policy.
    pub reconnect: ReconnectConfig,
    /// Statistics poll period. Zero disables the schedule.
    pub statistics_interval: Duration,
    /// IO status poll period. Zero disables the schedule.
    pub io_interval: Duration,
    /// How many history items the startup load requests.
    pub history_limit: u32,
}

impl DashboardConfig {
    /// Defaults for `origin`.
    pub fn new(origin: Url) -> Self {
        Self {
            origin,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(10),
            reconnect: ReconnectConfig::default(),
            statistics_interval: Duration::from_millis(5000),
            io_interval: Duration::from_millis(500),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Parse `origin` and apply defaults.
    pub fn from_origin(origin: &str) -> Result<Self, CoreError> {
        let url = Url::parse(origin).map_err(|e| CoreError::Config {
            message: format!("invalid server URL '{origin}': {e}"),
        })?;
        match url.scheme() {
            "http" | "https" => Ok(Self::new(url)),
            other => Err(CoreError::Config {
                message: format!("server URL must be http or https, got '{other}'"),
            }),
        }
    }

    /// HTTP transport settings for the REST client.
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: tls_to_transport(&self.tls),
            timeout: self.timeout,
        }
    }

    /// REST client for this server.
    pub fn api_client(&self) -> Result<ApiClient, CoreError> {
        Ok(ApiClient::new(self.origin.clone(), &self.transport())?)
    }
}

fn tls_to_transport(tls: &TlsVerification) -> TlsMode {
    match tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_dashboard_cadence() {
        let config = DashboardConfig::from_origin("http://line-3.local:8000").unwrap();
        assert_eq!(config.statistics_interval, Duration::from_millis(5000));
        assert_eq!(config.io_interval, Duration::from_millis(500));
        assert_eq!(config.reconnect.delay, Duration::from_millis(3000));
        assert_eq!(config.reconnect.max_attempts, 10);
        assert_eq!(config.history_limit, 50);
        assert_eq!(config.tls, TlsVerification::SystemDefaults);
    }

    #[test]
    fn rejects_non_http_origins() {
        assert!(DashboardConfig::from_origin("ws://line-3.local/ws/live").is_err());
        assert!(DashboardConfig::from_origin("not a url").is_err());
    }

    #[test]
    fn transport_mirrors_tls_choice() {
        let mut config = DashboardConfig::from_origin("https://line-3.local").unwrap();
        config.tls = TlsVerification::DangerAcceptInvalid;
        config.timeout = Duration::from_secs(3);

        let transport = config.transport();
        assert!(matches!(transport.tls, TlsMode::DangerAcceptInvalid));
        assert_eq!(transport.timeout, Duration::from_secs(3));
    }
}
