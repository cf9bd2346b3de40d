//! Endpoint identity and health tracking.
//!
//! An [`Endpoint`] is just a `(host, port)` pair. The set of endpoints
//! discovered from a locator (§4.1) is immutable for the lifetime of a
//! router; only the per-endpoint health side-table mutates.

use std::fmt;
use std::time::Instant;

use dashmap::DashMap;

/// A remote proxy server address.
///
/// Equality and hashing are by `(host, port)` only, matching the data
/// model's "Equality by host+port".
#[derive(Clone, Debug, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl PartialEq for Endpoint {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host && self.port == other.port
    }
}

impl std::hash::Hash for Endpoint {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.host.hash(state);
        self.port.hash(state);
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// An ordered, immutable, non-empty set of endpoints with a shared
/// round-robin cursor living alongside it in the registry.
///
/// Insertion order from the URL is preserved.
#[derive(Clone, Debug)]
pub struct EndpointSet {
    endpoints: Vec<Endpoint>,
}

impl EndpointSet {
    /// Builds a non-empty endpoint set. Returns `None` for an empty vec —
    /// callers (the locator parser) are expected to reject that earlier,
    /// but this keeps the type honest about its own invariant.
    pub fn new(endpoints: Vec<Endpoint>) -> Option<Self> {
        if endpoints.is_empty() {
            None
        } else {
            Some(Self { endpoints })
        }
    }

    pub fn as_slice(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Endpoint> {
        self.endpoints.iter()
    }
}

/// Mutable per-endpoint health state.
///
/// Kept out of [`Endpoint`] itself so the endpoint set can stay a cheap,
/// immutable `Vec` while health flips concurrently from many call sites —
/// the same separation the teacher crate draws between `RpcEndpoint`
/// (config) and `EndpointStats` (runtime state).
#[derive(Clone, Debug)]
pub struct EndpointHealth {
    pub healthy: bool,
    pub last_failure: Option<Instant>,
}

impl EndpointHealth {
    fn new() -> Self {
        Self {
            healthy: true,
            last_failure: None,
        }
    }
}

/// Immutable endpoint set plus its mutable health side-table.
pub struct EndpointRegistry {
    endpoints: EndpointSet,
    health: DashMap<Endpoint, EndpointHealth>,
}

impl EndpointRegistry {
    pub fn new(endpoints: EndpointSet) -> Self {
        let health = DashMap::new();
        for ep in endpoints.iter() {
            health.insert(ep.clone(), EndpointHealth::new());
        }
        Self { endpoints, health }
    }

    pub fn endpoints(&self) -> &EndpointSet {
        &self.endpoints
    }

    pub fn is_healthy(&self, ep: &Endpoint) -> bool {
        self.health.get(ep).map(|h| h.healthy).unwrap_or(true)
    }

    pub fn last_failure(&self, ep: &Endpoint) -> Option<Instant> {
        self.health.get(ep).and_then(|h| h.last_failure)
    }

    /// Returns the currently healthy endpoints, in original order.
    pub fn healthy_endpoints(&self) -> Vec<Endpoint> {
        self.endpoints
            .iter()
            .filter(|ep| self.is_healthy(ep))
            .cloned()
            .collect()
    }

    /// Flips an endpoint unhealthy and records the failure time. Returns
    /// `true` if this call actually transitioned healthy -> unhealthy
    /// (used by callers that only want to act on a fresh transition).
    pub fn mark_unhealthy(&self, ep: &Endpoint) -> bool {
        let mut entry = self
            .health
            .entry(ep.clone())
            .or_insert_with(EndpointHealth::new);
        let was_healthy = entry.healthy;
        entry.healthy = false;
        entry.last_failure = Some(Instant::now());
        was_healthy
    }

    /// Flips an endpoint healthy again and clears the failure timestamp —
    /// health "flips back to true only when either the recovery sweep
    /// successfully re-creates a channel or a call through a newly
    /// (re)created channel succeeds".
    pub fn mark_healthy(&self, ep: &Endpoint) {
        let mut entry = self
            .health
            .entry(ep.clone())
            .or_insert_with(EndpointHealth::new);
        entry.healthy = true;
        entry.last_failure = None;
    }
}
