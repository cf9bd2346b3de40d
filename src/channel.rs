//! Lazily-created, atomically-cached transport channels (§4.2).
//!
//! At most one [`ChannelHandle`] exists per endpoint at any time. Lookup-
//! with-create is atomic with respect to other lookups on the same
//! endpoint via a [`tokio::sync::OnceCell`] stored behind a concurrent
//! map — the "CAS-based entry state" the design notes call for: an
//! absent map entry is `Empty`, an entry whose cell has not resolved yet
//! is `Creating`, a resolved cell is `Ready`, and removing the entry (on
//! `mark_unhealthy`) is the `Evicted` transition.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::OnceCell;
use tonic::transport::{Channel, Endpoint as TonicEndpoint};
use tracing::debug;

use crate::endpoint::Endpoint;
use crate::error::OjpError;
use crate::pb::ojp_proxy_client::OjpProxyClient;

/// A transport channel paired with two call handles: one used for unary
/// blocking-style calls, one for streaming calls. Both are cheap clones
/// of the same underlying `tonic::transport::Channel` (HTTP/2 is
/// multiplexed), kept as two fields to mirror the source's separate
/// blocking/streaming stub objects.
#[derive(Clone)]
pub struct ChannelHandle {
    pub channel: Channel,
    pub blocking: OjpProxyClient<Channel>,
    pub streaming: OjpProxyClient<Channel>,
}

impl ChannelHandle {
    fn new(channel: Channel) -> Self {
        Self {
            blocking: OjpProxyClient::new(channel.clone()),
            streaming: OjpProxyClient::new(channel.clone()),
            channel,
        }
    }
}

/// Caches one [`ChannelHandle`] per [`Endpoint`], creating it lazily and
/// tearing it down when the endpoint is marked unhealthy.
pub struct ChannelCache {
    entries: DashMap<Endpoint, Arc<OnceCell<ChannelHandle>>>,
    retry_delay: Duration,
}

impl ChannelCache {
    pub fn new(retry_delay: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            retry_delay,
        }
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Returns the cached handle for `endpoint`, creating one if absent.
    /// Concurrent callers racing on the same endpoint converge on a
    /// single connection attempt via `OnceCell::get_or_try_init`.
    pub async fn get_or_create(&self, endpoint: &Endpoint) -> Result<ChannelHandle, OjpError> {
        let cell = self
            .entries
            .entry(endpoint.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let handle = cell
            .get_or_try_init(|| connect(endpoint))
            .await
            .map_err(|e| {
                // A failed connection attempt must not leave a poisoned
                // cell blocking future retries: drop the shared entry
                // so the next call tries again from scratch.
                self.entries.remove(endpoint);
                e
            })?;

        Ok(handle.clone())
    }

    /// Sets the flag to unhealthy... is the registry's job; this just
    /// removes and drops whatever `ChannelHandle` was cached, which
    /// shuts the underlying channel down when the last clone is
    /// dropped.
    pub fn evict(&self, endpoint: &Endpoint) {
        if self.entries.remove(endpoint).is_some() {
            debug!(endpoint = %endpoint, "evicted channel handle");
        }
    }
}

async fn connect(endpoint: &Endpoint) -> Result<ChannelHandle, OjpError> {
    let uri = format!("http://{}", endpoint.authority());
    debug!(endpoint = %endpoint, "creating channel");

    let tonic_endpoint: TonicEndpoint = uri
        .parse()
        .map_err(|e: tonic::transport::Error| OjpError::TransportUnavailable(e.to_string()))?;

    let channel = tonic_endpoint
        .connect()
        .await
        .map_err(|e| OjpError::TransportUnavailable(e.to_string()))?;

    Ok(ChannelHandle::new(channel))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn evict_removes_cached_entry() {
        let cache = ChannelCache::new(Duration::from_secs(5));
        let ep = Endpoint::new("127.0.0.1", 1);
        // Populate the map entry without actually connecting, by
        // inserting a resolved cell directly — exercising the eviction
        // path does not require a live server.
        let cell = Arc::new(OnceCell::new());
        cache.entries.insert(ep.clone(), cell);
        assert!(cache.entries.contains_key(&ep));
        cache.evict(&ep);
        assert!(!cache.entries.contains_key(&ep));
    }
}
