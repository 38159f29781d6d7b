// REST client for the dashboard server's snapshot endpoints
//
// Wraps `reqwest::Client` with origin-relative URL construction and
// status/body checking. Every snapshot goes through `fetch`, which returns
// the raw decoded JSON; typed getters layer the wire models on top.

use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{
    Calibration, HistoryPage, IoStatus, RecipeDetail, RecipeList, Statistics, SystemStatus,
};
use crate::transport::TransportConfig;

/// Upper bound the server accepts for `?limit=`.
pub const MAX_HISTORY_LIMIT: u32 = 1000;

/// A named REST resource the dashboard pulls snapshots of.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Status,
    Statistics,
    Recipes,
    Recipe(String),
    IoStatus,
    Calibration,
    History { limit: u32, offset: u32 },
}

impl ResourceKind {
    /// Most recent `limit` history items.
    pub fn history(limit: u32) -> Self {
        Self::History { limit, offset: 0 }
    }

    /// Path segments below the origin, excluding the query string.
    fn segments(&self) -> Vec<&str> {
        match self {
            Self::Status => vec!["api", "status"],
            Self::Statistics => vec!["api", "statistics"],
            Self::Recipes => vec!["api", "recipes"],
            Self::Recipe(name) => vec!["api", "recipes", name.as_str()],
            Self::IoStatus => vec!["api", "io", "status"],
            Self::Calibration => vec!["api", "calibration"],
            Self::History { .. } => vec!["api", "history"],
        }
    }

    /// Server-relative path including any query, e.g. `/api/history?limit=50&offset=0`.
    pub fn path(&self) -> String {
        let mut path = String::new();
        for segment in self.segments() {
            path.push('/');
            path.push_str(segment);
        }
        if let Self::History { limit, offset } = self {
            let limit = (*limit).clamp(1, MAX_HISTORY_LIMIT);
            path.push_str(&format!("?limit={limit}&offset={offset}"));
        }
        path
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status => f.write_str("status"),
            Self::Statistics => f.write_str("statistics"),
            Self::Recipes => f.write_str("recipes"),
            Self::Recipe(name) => write!(f, "recipe:{name}"),
            Self::IoStatus => f.write_str("io"),
            Self::Calibration => f.write_str("calibration"),
            Self::History { limit, offset } => write!(f, "history[{offset}+{limit}]"),
        }
    }
}

/// HTTP client bound to one dashboard server origin.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    origin: Url,
}

impl ApiClient {
    /// Build a client for `origin` (e.g. `http://line-3.local:8000`).
    pub fn new(origin: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::from_reqwest(origin, http))
    }

    /// Wrap an existing `reqwest::Client`.
    pub fn from_reqwest(origin: Url, http: reqwest::Client) -> Self {
        Self { http, origin }
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Full URL for a resource, query included.
    pub fn resource_url(&self, kind: &ResourceKind) -> Result<Url, Error> {
        let mut url = url_for(&self.origin, &kind.segments())?;
        if let ResourceKind::History { limit, offset } = kind {
            let limit = (*limit).clamp(1, MAX_HISTORY_LIMIT);
            url.query_pairs_mut()
                .append_pair("limit", &limit.to_string())
                .append_pair("offset", &offset.to_string());
        }
        Ok(url)
    }

    pub fn stream_url(&self) -> Result<Url, Error> {
        stream_url(&self.origin)
    }

    pub fn export_url(&self) -> Result<Url, Error> {
        export_url(&self.origin)
    }

    pub fn video_url(&self) -> Result<Url, Error> {
        video_url(&self.origin)
    }

    // ── Requests ─────────────────────────────────────────────────────

    async fn get_checked(&self, url: Url) -> Result<reqwest::Response, Error> {
        debug!("GET {}", url);

        let resp = self.http.get(url.clone()).send().await.map_err(Error::Transport)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                path: url.path().to_owned(),
            });
        }
        Ok(resp)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        let resp = self.get_checked(url).await?;
        let body = resp.text().await.map_err(Error::Transport)?;
        serde_json::from_str(&body).map_err(|e| Error::Decode {
            message: e.to_string(),
            body,
        })
    }

    /// One-shot snapshot of `kind` as raw JSON.
    pub async fn fetch(&self, kind: &ResourceKind) -> Result<Value, Error> {
        self.get_json(self.resource_url(kind)?).await
    }

    /// One-shot snapshot decoded into `T`.
    pub async fn fetch_as<T: DeserializeOwned>(&self, kind: &ResourceKind) -> Result<T, Error> {
        self.get_json(self.resource_url(kind)?).await
    }

    pub async fn status(&self) -> Result<SystemStatus, Error> {
        self.fetch_as(&ResourceKind::Status).await
    }

    pub async fn statistics(&self) -> Result<Statistics, Error> {
        self.fetch_as(&ResourceKind::Statistics).await
    }

    pub async fn recipes(&self) -> Result<RecipeList, Error> {
        self.fetch_as(&ResourceKind::Recipes).await
    }

    pub async fn recipe(&self, name: &str) -> Result<RecipeDetail, Error> {
        self.fetch_as(&ResourceKind::Recipe(name.to_owned())).await
    }

    pub async fn io_status(&self) -> Result<IoStatus, Error> {
        self.fetch_as(&ResourceKind::IoStatus).await
    }

    pub async fn calibration(&self) -> Result<Calibration, Error> {
        self.fetch_as(&ResourceKind::Calibration).await
    }

    pub async fn history(&self, limit: u32, offset: u32) -> Result<HistoryPage, Error> {
        self.fetch_as(&ResourceKind::History { limit, offset }).await
    }

    /// Download the statistics CSV export without parsing it.
    pub async fn export_csv(&self) -> Result<Vec<u8>, Error> {
        let resp = self.get_checked(self.export_url()?).await?;
        let bytes = resp.bytes().await.map_err(Error::Transport)?;
        Ok(bytes.to_vec())
    }
}

// ── Origin-relative URLs ─────────────────────────────────────────────

fn url_for(origin: &Url, segments: &[&str]) -> Result<Url, Error> {
    let mut url = origin.clone();
    url.set_query(None);
    url.set_fragment(None);
    url.path_segments_mut()
        .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
        .clear()
        .extend(segments);
    Ok(url)
}

/// Live stream endpoint: `ws://host/ws/live`, or `wss://` for an https origin.
pub fn stream_url(origin: &Url) -> Result<Url, Error> {
    let mut url = url_for(origin, &["ws", "live"])?;
    let scheme = if origin.scheme() == "https" { "wss" } else { "ws" };
    url.set_scheme(scheme)
        .map_err(|()| Error::InvalidUrl(url::ParseError::InvalidDomainCharacter))?;
    Ok(url)
}

/// CSV export download target.
pub fn export_url(origin: &Url) -> Result<Url, Error> {
    url_for(origin, &["api", "statistics", "export"])
}

/// MJPEG video feed.
pub fn video_url(origin: &Url) -> Result<Url, Error> {
    url_for(origin, &["stream", "video"])
}
