// circlescope-api: live stream + REST client for the inspection dashboard server

pub mod error;
pub mod models;
pub mod rest;
pub mod snapshot;
pub mod transport;
pub mod websocket;

pub use error::{Error, ErrorKind};
pub use rest::{ApiClient, ResourceKind};
pub use snapshot::{SnapshotFetcher, SnapshotSource};
pub use transport::{Link, Transport, TransportConfig, TlsMode, WsTransport};
pub use websocket::{ConnectionState, Envelope, EventKind, ReconnectConfig, StreamClient};
