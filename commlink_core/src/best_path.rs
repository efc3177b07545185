//! The "BestPath" engine - widest-path search over the discovered graph.
//!
//! A best-first search like Dijkstra's, except path quality is the
//! *product* of edge qualities and the frontier pops the *highest* value.
//! Edges are discovered on demand while nodes are expanded:
//!
//! ```text
//! pop best (node, q) ──► node is a target? record q, maybe stop
//!        │
//!        └─► receivers_of(node) ─► broadcasters_in_range ─► q * link_quality
//!                                                              │
//!                          beacon? resolve its targets directly ┤
//!                                   otherwise upsert into frontier
//! ```

use crate::discovery::DiscoveryAdapter;
use crate::markers::MarkerRegistry;
use crate::quality::link_quality;
use crate::search::{record_if_better, ResultMap, SearchRequest};
use commlink_env::NodeId;
use std::collections::{HashSet, VecDeque};

/// A not-yet-expanded node and the best quality known for reaching it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrontierEntry {
    pub node: NodeId,
    pub quality: f64,
}

/// Outcome of [`Frontier::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// No entry for the node existed
    Inserted,
    /// A lower-quality entry was superseded
    Replaced,
    /// An equal-or-better entry was kept
    Kept,
}

/// Candidates ordered by descending quality, ties in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Frontier {
    entries: VecDeque<FrontierEntry>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }
    
    /// Removes and returns the best candidate.
    pub fn pop_best(&mut self) -> Option<FrontierEntry> {
        self.entries.pop_front()
    }
    
    /// Inserts or improves the entry for `node`.
    ///
    /// A new entry lands right before the first entry of strictly lower
    /// quality, behind every equal one.
    pub fn upsert(&mut self, node: NodeId, quality: f64) -> Upsert {
        let mut outcome = Upsert::Inserted;
        if let Some(existing) = self.entries.iter().position(|e| e.node == node) {
            if self.entries[existing].quality >= quality {
                return Upsert::Kept;
            }
            self.entries.remove(existing);
            outcome = Upsert::Replaced;
        }
        let at = self
            .entries
            .iter()
            .position(|e| e.quality < quality)
            .unwrap_or(self.entries.len());
        self.entries.insert(at, FrontierEntry { node, quality });
        outcome
    }
    
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    
    pub fn clear(&mut self) {
        self.entries.clear();
    }
    
    pub fn iter(&self) -> impl Iterator<Item = &FrontierEntry> {
        self.entries.iter()
    }
}

/// Mutable state of one BestPath invocation.
///
/// Owned by the caller and reset at the start of every search, so the
/// allocations are reused across ticks without sharing results.
#[derive(Debug, Default)]
pub struct SearchContext {
    frontier: Frontier,
    explored: HashSet<NodeId>,
    results: ResultMap,
    expanded: usize,
}

impl SearchContext {
    pub fn new() -> Self {
        Self::default()
    }
    
    pub fn reset(&mut self) {
        self.frontier.clear();
        self.explored.clear();
        self.results.clear();
        self.expanded = 0;
    }
    
    /// Nodes expanded by the last search.
    pub fn expanded(&self) -> usize {
        self.expanded
    }
    
    fn finish(&mut self) -> ResultMap {
        std::mem::take(&mut self.results)
    }
}

/// Best reachable quality from `request.source` to every connected target.
///
/// Stops when the frontier runs dry or once the number of resolved targets
/// reaches [`TargetSet::completion_threshold`](crate::search::TargetSet::completion_threshold).
/// Diagnostic relays met along the way are added to `markers`.
pub fn best_path<A: DiscoveryAdapter + ?Sized>(
    adapter: &A,
    request: &SearchRequest<'_>,
    search: &mut SearchContext,
    markers: &mut MarkerRegistry,
) -> ResultMap {
    search.reset();
    search.frontier.upsert(request.source, 1.0);
    let threshold = request.targets.completion_threshold();
    
    while let Some(entry) = search.frontier.pop_best() {
        request.note(format_args!("Visiting {} at {:.4}", entry.node, entry.quality));
        
        if request.targets.contains(entry.node) {
            if record_if_better(&mut search.results, entry.node, entry.quality) {
                request.note(format_args!("Better connection to {}: {:.4}", entry.node, entry.quality));
            }
            if search.results.len() >= threshold {
                request.note(format_args!("Reached all targets. Stopping."));
                return search.finish();
            }
        }
        
        search.explored.insert(entry.node);
        search.expanded += 1;
        
        for receiver in adapter.receivers_of(entry.node, request.viewer) {
            for broadcaster in adapter.broadcasters_in_range(&receiver) {
                let quality = link_quality(&broadcaster, &receiver) * entry.quality;
                if quality <= 0.0 {
                    continue;
                }
                
                let mut neighbor = adapter.parent_entity(&broadcaster);
                if let Some(relay) = adapter.relay_of(neighbor) {
                    neighbor = relay;
                    if adapter.is_diagnostic(relay) {
                        markers.observe(relay);
                    }
                }
                if search.explored.contains(&neighbor) {
                    continue;
                }
                
                if broadcaster.kind.is_beacon() {
                    for outbound in adapter.broadcasters_of(neighbor, request.viewer) {
                        let parent = adapter.parent_entity(&outbound);
                        if !request.targets.contains(parent) {
                            continue;
                        }
                        if record_if_better(&mut search.results, parent, quality) {
                            request.note(format_args!("Found {} through beacon: {:.4}", parent, quality));
                            if search.results.len() >= threshold {
                                request.note(format_args!("Reached all targets. Stopping."));
                                return search.finish();
                            }
                        }
                    }
                } else {
                    let outcome = search.frontier.upsert(neighbor, quality);
                    request.note(format_args!("{:?} {} at {:.4}", outcome, neighbor, quality));
                }
            }
        }
    }
    
    request.note(format_args!("Exhausted connections. Stopping."));
    search.finish()
}
