// Periodic and one-shot snapshot pulls
//
// Each resource kind gets its own cancellable polling task. A failed tick
// is logged and the schedule carries on at the same cadence.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::Error;
use crate::rest::{ApiClient, ResourceKind};

/// Anything that can produce a snapshot for a resource kind.
pub trait SnapshotSource: Send + Sync + 'static {
    fn fetch<'a>(&'a self, kind: &'a ResourceKind) -> BoxFuture<'a, Result<Value, Error>>;
}

impl SnapshotSource for ApiClient {
    fn fetch<'a>(&'a self, kind: &'a ResourceKind) -> BoxFuture<'a, Result<Value, Error>> {
        Box::pin(ApiClient::fetch(self, kind))
    }
}

type ResultHandler = Arc<dyn Fn(Value) + Send + Sync>;

/// Issues snapshot pulls, once or on independent per-kind timers.
///
/// Dropping the fetcher cancels every schedule it started.
pub struct SnapshotFetcher {
    source: Arc<dyn SnapshotSource>,
    schedules: DashMap<ResourceKind, CancellationToken>,
}

impl SnapshotFetcher {
    pub fn new(source: Arc<dyn SnapshotSource>) -> Self {
        Self {
            source,
            schedules: DashMap::new(),
        }
    }

    /// Single pull of `kind`.
    pub async fn fetch(&self, kind: &ResourceKind) -> Result<Value, Error> {
        self.source.fetch(kind).await
    }

    /// Single pull of `kind`, decoded into `T`.
    pub async fn fetch_as<T: DeserializeOwned>(&self, kind: &ResourceKind) -> Result<T, Error> {
        let value = self.source.fetch(kind).await?;
        serde_json::from_value(value).map_err(|e| Error::Decode {
            message: e.to_string(),
            body: String::new(),
        })
    }

    /// Poll `kind` every `every`, handing each successful result to `on_result`.
    ///
    /// The first pull happens one full interval after scheduling. Replaces
    /// any existing schedule for the same kind. A zero interval is ignored.
    /// Must be called from within a Tokio runtime.
    pub fn schedule_periodic<F>(&self, kind: ResourceKind, every: Duration, on_result: F)
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        if every.is_zero() {
            debug!(%kind, "zero interval, not scheduling");
            return;
        }

        let cancel = CancellationToken::new();
        if let Some(previous) = self.schedules.insert(kind.clone(), cancel.clone()) {
            previous.cancel();
        }

        let source = Arc::clone(&self.source);
        let on_result: ResultHandler = Arc::new(on_result);
        tokio::spawn(poll_task(source, kind, every, on_result, cancel));
    }

    /// Stop the schedule for `kind`, if any. Returns whether one was running.
    pub fn stop(&self, kind: &ResourceKind) -> bool {
        match self.schedules.remove(kind) {
            Some((_, cancel)) => {
                cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn stop_all(&self) {
        self.schedules.retain(|_, cancel| {
            cancel.cancel();
            false
        });
    }

    pub fn is_scheduled(&self, kind: &ResourceKind) -> bool {
        self.schedules
            .get(kind)
            .is_some_and(|cancel| !cancel.is_cancelled())
    }
}

impl Drop for SnapshotFetcher {
    fn drop(&mut self) {
        self.stop_all();
    }
}

async fn poll_task(
    source: Arc<dyn SnapshotSource>,
    kind: ResourceKind,
    every: Duration,
    on_result: ResultHandler,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // consume immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let result = tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    result = source.fetch(&kind) => result,
                };
                match result {
                    Ok(value) => on_result(value),
                    Err(e) => warn!(%kind, error = %e, "periodic snapshot failed"),
                }
            }
        }
    }

    debug!(%kind, "snapshot schedule stopped");
}
