//! Session identity, the "refresh on every response" value cell, and the
//! session → endpoint pin map (§3, §4.3, §9).

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::endpoint::Endpoint;

/// Downstream-database-family tag a session carries, used by the LOB
/// engine to pick framing behavior (§4.5).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DatabaseFamily {
    #[default]
    Generic,
    H2,
}

/// The server-side context for one logical database connection.
///
/// The identifier is stable for the session's lifetime; the
/// `server_state` blob is replaced wholesale by every response per the
/// "last response wins" rule, independent of the stable pin map below.
#[derive(Clone, Debug, Default)]
pub struct SessionRef {
    pub identifier: String,
    pub connection_hash: String,
    pub family: DatabaseFamily,
    pub server_state: Vec<u8>,
}

impl SessionRef {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.identifier.is_empty()
    }
}

/// A caller's mutable view of its session: "every response carries a
/// replacement session object that the caller must adopt."
///
/// Kept separate from [`SessionPinning`], which is keyed by the stable
/// identifier and never replaced wholesale.
#[derive(Clone, Default)]
pub struct SessionCell {
    inner: std::sync::Arc<RwLock<SessionRef>>,
}

impl SessionCell {
    pub fn new(initial: SessionRef) -> Self {
        Self {
            inner: std::sync::Arc::new(RwLock::new(initial)),
        }
    }

    pub fn get(&self) -> SessionRef {
        self.inner.read().clone()
    }

    /// Installs a response's session as the new current value. A
    /// session identifier appearing in any response MUST be installed
    /// for subsequent calls using that session.
    pub fn adopt(&self, next: SessionRef) {
        *self.inner.write() = next;
    }
}

/// Maps a stable session identifier to the endpoint currently holding
/// its server-side state.
///
/// A concurrent map; pin insertion on response and removal on failure
/// may race, resolved by "last writer wins" — correctness depends only
/// on eventual consistency because a stale pin to an unhealthy endpoint
/// is re-checked and fixed at next dispatch.
#[derive(Default)]
pub struct SessionPinning {
    pins: DashMap<String, Endpoint>,
}

impl SessionPinning {
    pub fn new() -> Self {
        Self {
            pins: DashMap::new(),
        }
    }

    /// An entry is created the first time a session identifier is
    /// observed on a response.
    pub fn pin(&self, session_id: &str, endpoint: Endpoint) {
        if !session_id.is_empty() {
            self.pins.insert(session_id.to_string(), endpoint);
        }
    }

    pub fn lookup(&self, session_id: &str) -> Option<Endpoint> {
        if session_id.is_empty() {
            None
        } else {
            self.pins.get(session_id).map(|r| r.clone())
        }
    }

    /// Removed on explicit session termination or when the pinned
    /// endpoint is detected unhealthy at dispatch time.
    pub fn unpin(&self, session_id: &str) {
        self.pins.remove(session_id);
    }
}
