//! Correlation table for in-flight upstream queries.
//!
//! Each forwarded query gets a fresh 16-bit identifier mapping back to the
//! original client, message, and identifier. Allocation is serialized so
//! concurrent queries never share an identifier; resolution and sweeping
//! run on the sharded map without the allocation lock.

use crate::dns::wire::DnsMessage;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

/// Collision draws before a proactive sweep of expired entries
const MAX_DRAWS_BEFORE_SWEEP: u32 = 1000;

/// State kept for one forwarded query
pub struct CorrelationEntry {
    pub client: SocketAddr,
    pub original: DnsMessage,
    pub original_id: u16,
    pub created_at: Instant,
}

pub struct CorrelationTable {
    entries: DashMap<u16, CorrelationEntry>,
    alloc_lock: Mutex<()>,
    entry_timeout: Duration,
}

impl CorrelationTable {
    pub fn new(entry_timeout: Duration) -> CorrelationTable {
        CorrelationTable {
            entries: DashMap::new(),
            alloc_lock: Mutex::new(()),
            entry_timeout,
        }
    }

    /// Allocate a fresh identifier and record the mapping.
    ///
    /// Draws random candidates until one is not a live key. After 1,000
    /// consecutive collisions the expiry sweep runs once before drawing
    /// continues; this bounds livelock under identifier-space pressure
    /// without guaranteeing backpressure.
    pub fn create(&self, client: SocketAddr, original: DnsMessage) -> u16 {
        let _guard = self.alloc_lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut draws = 0u32;
        let new_id = loop {
            let candidate = fastrand::u16(..);
            if !self.entries.contains_key(&candidate) {
                break candidate;
            }
            draws += 1;
            if draws >= MAX_DRAWS_BEFORE_SWEEP {
                let expired = self.sweep();
                debug!(expired, "identifier space congested, swept expired entries");
                draws = 0;
            }
        };

        let original_id = original.id();
        self.entries.insert(
            new_id,
            CorrelationEntry {
                client,
                original,
                original_id,
                created_at: Instant::now(),
            },
        );
        new_id
    }

    /// Remove and return the entry for an upstream response identifier.
    /// A second resolve of the same identifier returns nothing.
    pub fn resolve(&self, new_id: u16) -> Option<CorrelationEntry> {
        self.entries.remove(&new_id).map(|(_, entry)| entry)
    }

    /// Drop every entry older than the configured timeout. Returns how
    /// many were removed; best-effort relative to concurrent resolves.
    pub fn sweep(&self) -> usize {
        let before = self.entries.len();
        let timeout = self.entry_timeout;
        self.entries.retain(|_, entry| entry.created_at.elapsed() <= timeout);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
