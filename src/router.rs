//! Endpoint selection: session-pinned if present and healthy, else
//! round-robin over healthy endpoints (§4.3).

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::channel::ChannelCache;
use crate::endpoint::{Endpoint, EndpointRegistry};
use crate::session::SessionPinning;

/// Selects endpoints for new and pinned sessions, and drives the inline
/// recovery sweep when no endpoint is currently healthy.
///
/// The round-robin cursor is a position in the *original* endpoint
/// order, not in a freshly filtered healthy subsequence: selection scans
/// forward from the cursor for the next healthy endpoint and leaves the
/// cursor just past whichever one it picked. This is what keeps a
/// transient unhealthy endpoint from shifting which endpoint the *next*
/// caller sees — the cursor only ever "skips over" the gap left by the
/// unhealthy endpoint, it never restarts from zero against a
/// re-numbered healthy list.
pub struct Router {
    registry: Arc<EndpointRegistry>,
    channels: Arc<ChannelCache>,
    pins: Arc<SessionPinning>,
    cursor: Mutex<usize>,
}

impl Router {
    pub fn new(
        registry: Arc<EndpointRegistry>,
        channels: Arc<ChannelCache>,
        pins: Arc<SessionPinning>,
    ) -> Self {
        Self {
            registry,
            channels,
            pins,
            cursor: Mutex::new(0),
        }
    }

    /// `selectForNewSession`: filter to healthy members; if none, run a
    /// recovery sweep and refilter; if still none, return `None`.
    pub async fn select_for_new_session(&self) -> Option<Endpoint> {
        if let Some(ep) = self.scan_from_cursor() {
            return Some(ep);
        }

        self.recovery_sweep().await;
        self.scan_from_cursor()
    }

    /// `selectForSession`: delegate to `select_for_new_session` when the
    /// session id is empty or unpinned; otherwise return the pinned
    /// endpoint if healthy, or unpin and delegate if not.
    pub async fn select_for_session(&self, session_id: &str) -> Option<Endpoint> {
        if session_id.is_empty() {
            return self.select_for_new_session().await;
        }

        match self.pins.lookup(session_id) {
            None => self.select_for_new_session().await,
            Some(pinned) => {
                if self.registry.is_healthy(&pinned) {
                    Some(pinned)
                } else {
                    self.pins.unpin(session_id);
                    self.select_for_new_session().await
                }
            }
        }
    }

    /// Scans forward from the cursor (wrapping) for the first healthy
    /// endpoint, advancing the cursor to just past it. Returns `None`
    /// without moving the cursor if nothing is healthy.
    fn scan_from_cursor(&self) -> Option<Endpoint> {
        let slice = self.registry.endpoints().as_slice();
        let total = slice.len();

        let mut cursor = self.cursor.lock();
        let start = *cursor % total;

        for offset in 0..total {
            let idx = (start + offset) % total;
            let ep = &slice[idx];
            if self.registry.is_healthy(ep) {
                *cursor = (idx + 1) % total;
                return Some(ep.clone());
            }
        }
        None
    }

    /// Pins a session identifier to the endpoint that just answered it,
    /// for use by callers (the dispatcher) once a response carries a
    /// non-empty session identifier.
    pub fn pin_session(&self, session_id: &str, endpoint: Endpoint) {
        self.pins.pin(session_id, endpoint);
    }

    /// Removes a session's pin outright — used on explicit session
    /// termination, where no replacement endpoint should be recorded.
    pub fn unpin_session(&self, session_id: &str) {
        self.pins.unpin(session_id);
    }

    /// Iterates unhealthy endpoints whose `now - last_failure` exceeds
    /// the configured retry delay, attempting to re-create a channel for
    /// each. Success flips the endpoint back to healthy.
    pub async fn recovery_sweep(&self) {
        let now = std::time::Instant::now();
        for ep in self.registry.endpoints().iter() {
            if self.registry.is_healthy(ep) {
                continue;
            }
            let Some(last_failure) = self.registry.last_failure(ep) else {
                continue;
            };
            if now.duration_since(last_failure) < self.channels.retry_delay() {
                continue;
            }

            debug!(endpoint = %ep, "recovery sweep attempting endpoint");
            if self.channels.get_or_create(ep).await.is_ok() {
                self.registry.mark_healthy(ep);
                info!(endpoint = %ep, "endpoint recovered");
            }
        }
    }
}
