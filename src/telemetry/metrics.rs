//! Per-link traffic and error counters.
//!
//! Malformed frames are dropped silently on the wire but never silently in
//! the stats; every drop lands in a counter here.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counter for thread-safe increment operations.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Increments the counter by 1.
    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Adds a value to the counter.
    pub fn add(&self, val: u64) {
        self.0.fetch_add(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Statistics for one link.
#[derive(Debug, Default)]
pub struct LinkStats {
    /// PPP payloads received.
    pub rx_packets: Counter,
    /// Octets received.
    pub rx_octets: Counter,
    /// PPP payloads sent.
    pub tx_packets: Counter,
    /// Octets sent.
    pub tx_octets: Counter,
    /// Frames dropped because they did not decode.
    pub rx_malformed: Counter,
    /// Frames dropped by the phase filter.
    pub rx_discarded: Counter,
}

impl LinkStats {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Registry of per-link statistics keyed by peer name.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    links: RwLock<HashMap<String, Arc<LinkStats>>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stats handle for a link, created on first use.
    pub fn link(&self, peer: &str) -> Arc<LinkStats> {
        if let Some(stats) = self.links.read().unwrap().get(peer) {
            return Arc::clone(stats);
        }
        let mut links = self.links.write().unwrap();
        Arc::clone(
            links
                .entry(peer.to_string())
                .or_insert_with(|| Arc::new(LinkStats::new())),
        )
    }

    /// Remove a finished link's stats; returns them for a final report.
    pub fn remove(&self, peer: &str) -> Option<Arc<LinkStats>> {
        self.links.write().unwrap().remove(peer)
    }

    /// Snapshot of (peer, rx_packets, tx_packets) for all links.
    pub fn snapshot(&self) -> Vec<(String, u64, u64)> {
        self.links
            .read()
            .unwrap()
            .iter()
            .map(|(peer, stats)| {
                (
                    peer.clone(),
                    stats.rx_packets.get(),
                    stats.tx_packets.get(),
                )
            })
            .collect()
    }
}
