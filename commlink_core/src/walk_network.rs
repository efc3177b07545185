//! The "WalkNetwork" engine - greedy relay tree with backtraced qualities.
//!
//! Grows an arborescence over relays rooted at the searching agent's first
//! receiver. Every relay keeps the single best *immediate* incoming edge;
//! the open relay with the best candidate is closed next. Agents and
//! diagnostic radios heard along the way get the product of the edge
//! chain back to the root times their own immediate quality.
//!
//! Results are comparable to [`best_path`](crate::best_path::best_path),
//! not identical: the tree is greedy on single hops.

use crate::discovery::DiscoveryAdapter;
use crate::markers::MarkerRegistry;
use crate::node::Receiver;
use crate::quality::link_quality;
use crate::search::{record_if_better, ResultMap, SearchRequest};
use commlink_env::NodeId;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Best incoming edge recorded for a relay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeEdge {
    /// Relay the edge leads into
    pub from: NodeId,
    /// Relay that heard it; `None` for the root receiver
    pub to: Option<NodeId>,
    /// Immediate quality of the hop
    pub quality: f64,
}

/// Reusable tree state, reset on every walk.
#[derive(Debug, Default)]
pub struct TreeState {
    candidate: HashMap<NodeId, f64>,
    predecessor: HashMap<NodeId, TreeEdge>,
    open: BTreeSet<NodeId>,
    closed: HashSet<NodeId>,
    reached: ResultMap,
}

impl TreeState {
    pub fn new() -> Self {
        Self::default()
    }
    
    pub fn reset(&mut self) {
        self.candidate.clear();
        self.predecessor.clear();
        self.open.clear();
        self.closed.clear();
        self.reached.clear();
    }
    
    /// Incoming edge chosen for `relay`, if any.
    pub fn edge(&self, relay: NodeId) -> Option<&TreeEdge> {
        self.predecessor.get(&relay)
    }
    
    /// Relays closed by the last walk.
    pub fn closed_count(&self) -> usize {
        self.closed.len()
    }
    
    /// Cumulative quality from the root to `relay`.
    ///
    /// The root itself (`None`) is 1. A relay without a recorded edge
    /// contributes 0.
    pub fn backtrace(&self, relay: Option<NodeId>) -> f64 {
        let mut quality = 1.0;
        let mut current = relay;
        while let Some(node) = current {
            match self.predecessor.get(&node) {
                Some(edge) => {
                    quality *= edge.quality;
                    current = edge.to;
                }
                None => return 0.0,
            }
        }
        quality
    }
    
    /// Removes the open relay with the highest candidate quality.
    ///
    /// Linear scan in id order; the first of equal candidates wins.
    pub fn pick_best_open(&mut self) -> Option<NodeId> {
        let mut best: Option<(NodeId, f64)> = None;
        for relay in &self.open {
            let quality = self.candidate.get(relay).copied().unwrap_or(0.0);
            match best {
                Some((_, current)) if quality <= current => {}
                _ => best = Some((*relay, quality)),
            }
        }
        let (relay, _) = best?;
        self.open.remove(&relay);
        self.closed.insert(relay);
        Some(relay)
    }
    
    fn offer(&mut self, relay: NodeId, to: Option<NodeId>, quality: f64) -> bool {
        if self.closed.contains(&relay) {
            return false;
        }
        let current = self.candidate.get(&relay).copied().unwrap_or(0.0);
        if quality <= current {
            return false;
        }
        self.candidate.insert(relay, quality);
        self.predecessor.insert(relay, TreeEdge { from: relay, to, quality });
        self.open.insert(relay);
        true
    }
}

/// Relaxes every broadcaster `receiver` hears into the tree.
///
/// `via` is the closed relay owning `receiver`, or `None` at the root.
fn relax<A: DiscoveryAdapter + ?Sized>(
    adapter: &A,
    request: &SearchRequest<'_>,
    via: Option<NodeId>,
    receiver: &Receiver,
    tree: &mut TreeState,
    markers: &mut MarkerRegistry,
) {
    for broadcaster in adapter.broadcasters_in_range(receiver) {
        let immediate = link_quality(&broadcaster, receiver);
        if immediate <= 0.0 {
            continue;
        }
        let parent = adapter.parent_entity(&broadcaster);
        let relay = adapter.relay_of(parent);
        
        if broadcaster.diagnostic {
            let synthetic = relay.unwrap_or(parent);
            let quality = tree.backtrace(via) * immediate;
            if adapter.is_diagnostic(synthetic) {
                markers.observe(synthetic);
            }
            if record_if_better(&mut tree.reached, synthetic, quality) {
                request.note(format_args!("Diagnostic radio {} at {:.4}", synthetic, quality));
            }
        }
        
        match relay {
            Some(relay) => {
                if tree.offer(relay, via, immediate) {
                    request.note(format_args!("Better edge into {}: {:.4}", relay, immediate));
                }
            }
            None if adapter.live_agent(parent) => {
                let quality = tree.backtrace(via) * immediate;
                if record_if_better(&mut tree.reached, parent, quality) {
                    request.note(format_args!("Agent {} at {:.4}", parent, quality));
                }
            }
            None => {}
        }
    }
}

/// Builds the relay tree for `request.source` and returns every agent and
/// diagnostic radio it reached.
///
/// The result is not filtered by `request.targets`; the emitter looks up
/// the ids it needs.
pub fn walk_network<A: DiscoveryAdapter + ?Sized>(
    adapter: &A,
    request: &SearchRequest<'_>,
    tree: &mut TreeState,
    markers: &mut MarkerRegistry,
) -> ResultMap {
    tree.reset();
    
    let Some(root) = adapter.receivers_of(request.source, request.viewer).into_iter().next() else {
        request.note(format_args!("{} has no receiver. Stopping.", request.source));
        return ResultMap::new();
    };
    relax(adapter, request, None, &root, tree, markers);
    
    while let Some(relay) = tree.pick_best_open() {
        request.note(format_args!("Closing {} at {:.4}", relay, tree.backtrace(Some(relay))));
        for receiver in adapter.receivers_of(relay, request.viewer) {
            relax(adapter, request, Some(relay), &receiver, tree, markers);
        }
    }
    
    std::mem::take(&mut tree.reached)
}
