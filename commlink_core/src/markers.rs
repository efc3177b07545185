//! Debug marker bookkeeping.
//!
//! Markers are relays carrying the diagnostic tag. They are searched like
//! agents: every agent gets a quality packet for every tracked marker.

use crate::discovery::DiscoveryAdapter;
use commlink_env::{IdentityId, NodeId};
use std::collections::BTreeSet;
use tracing::debug;

/// Label fragment that marks a relay as diagnostic.
pub const DEFAULT_MARKER_TAG: &str = "[DEBUG RADIO]";

/// Whether a display label carries the diagnostic tag.
///
/// Only adapters call this, to fill `NodeInfo::diagnostic`.
pub fn label_is_diagnostic(label: &str, tag: &str) -> bool {
    !tag.is_empty() && label.contains(tag)
}

/// Set of tracked markers, in id order.
#[derive(Debug, Clone, Default)]
pub struct MarkerRegistry {
    markers: BTreeSet<NodeId>,
}

impl MarkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }
    
    /// Starts tracking a marker. Returns true if it was new.
    pub fn observe(&mut self, marker: NodeId) -> bool {
        let added = self.markers.insert(marker);
        if added {
            debug!("Tracking marker {}", marker);
        }
        added
    }
    
    /// Drops markers that lost the tag or left the world.
    pub fn evict_stale<A: DiscoveryAdapter + ?Sized>(&mut self, adapter: &A) -> usize {
        let before = self.markers.len();
        self.markers.retain(|m| {
            let keep = adapter.is_diagnostic(*m);
            if !keep {
                debug!("Evicting marker {}", m);
            }
            keep
        });
        before - self.markers.len()
    }
    
    /// Registers every diagnostic relay reachable from `origin`.
    pub fn scan<A: DiscoveryAdapter + ?Sized>(
        &mut self,
        adapter: &A,
        origin: NodeId,
        viewer: IdentityId,
    ) -> usize {
        let mut added = 0;
        for broadcaster in adapter.relayed_broadcasters(origin, viewer) {
            let parent = adapter.parent_entity(&broadcaster);
            if let Some(relay) = adapter.relay_of(parent) {
                if adapter.is_diagnostic(relay) && self.observe(relay) {
                    added += 1;
                }
            }
        }
        added
    }
    
    pub fn contains(&self, marker: NodeId) -> bool {
        self.markers.contains(&marker)
    }
    
    pub fn len(&self) -> usize {
        self.markers.len()
    }
    
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
    
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.markers.iter().copied()
    }
    
    /// Snapshot of the tracked ids.
    pub fn ids(&self) -> Vec<NodeId> {
        self.markers.iter().copied().collect()
    }
}
