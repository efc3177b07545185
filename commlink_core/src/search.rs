//! Shared vocabulary of the two search engines.

use commlink_env::{IdentityId, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{info, trace};

/// Best quality found per target node.
pub type ResultMap = HashMap<NodeId, f64>;

/// Which engine computes qualities on a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// Widest-path best-first search (`best_path`)
    #[default]
    BestPath,
    /// Greedy relay tree + backtrace (`walk_network`)
    WalkNetwork,
}

impl Algorithm {
    /// The other engine.
    pub fn toggled(self) -> Self {
        match self {
            Algorithm::BestPath => Algorithm::WalkNetwork,
            Algorithm::WalkNetwork => Algorithm::BestPath,
        }
    }
    
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::BestPath => "best_path",
            Algorithm::WalkNetwork => "walk_network",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Algorithm {
    type Err = String;
    
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "best_path" | "bestpath" | "new" => Ok(Algorithm::BestPath),
            "walk_network" | "walknetwork" | "walk" | "old" => Ok(Algorithm::WalkNetwork),
            _ => Err(format!("Unknown algorithm: {}", s)),
        }
    }
}

/// Node ids a search is trying to resolve.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetSet {
    ids: HashSet<NodeId>,
}

impl TargetSet {
    pub fn new() -> Self {
        Self::default()
    }
    
    pub fn insert(&mut self, id: NodeId) -> bool {
        self.ids.insert(id)
    }
    
    pub fn contains(&self, id: NodeId) -> bool {
        self.ids.contains(&id)
    }
    
    pub fn len(&self) -> usize {
        self.ids.len()
    }
    
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
    
    /// Result count at which a search stops early.
    ///
    /// One less than the target count: the source is assumed to occupy a
    /// target slot of its own.
    pub fn completion_threshold(&self) -> usize {
        self.ids.len().saturating_sub(1)
    }
    
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.ids.iter().copied()
    }
}

impl FromIterator<NodeId> for TargetSet {
    fn from_iter<I: IntoIterator<Item = NodeId>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

/// One search invocation.
#[derive(Debug, Clone, Copy)]
pub struct SearchRequest<'a> {
    /// Embodied character the search starts from
    pub source: NodeId,
    
    /// Identity used for every discovery query
    pub viewer: IdentityId,
    
    /// Targets to resolve
    pub targets: &'a TargetSet,
    
    /// Promote the per-hop trace to `info`
    pub verbose: bool,
}

impl<'a> SearchRequest<'a> {
    pub fn new(source: NodeId, viewer: IdentityId, targets: &'a TargetSet) -> Self {
        Self {
            source,
            viewer,
            targets,
            verbose: false,
        }
    }
    
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
    
    /// Emits a walk trace line.
    pub(crate) fn note(&self, args: fmt::Arguments<'_>) {
        if self.verbose {
            info!("{}", args);
        } else {
            trace!("{}", args);
        }
    }
}

/// Stores `quality` for `node` if it beats the stored value.
pub(crate) fn record_if_better(results: &mut ResultMap, node: NodeId, quality: f64) -> bool {
    let current = results.get(&node).copied().unwrap_or(0.0);
    if quality > current {
        results.insert(node, quality);
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_completion_threshold_is_one_below_target_count() {
        let targets: TargetSet = (1..=3).map(NodeId).collect();
        assert_eq!(targets.completion_threshold(), 2);
        assert_eq!(TargetSet::new().completion_threshold(), 0);
    }
    
    #[test]
    fn test_record_only_strictly_better() {
        let mut results = ResultMap::new();
        assert!(record_if_better(&mut results, NodeId(1), 0.5));
        assert!(!record_if_better(&mut results, NodeId(1), 0.5));
        assert!(!record_if_better(&mut results, NodeId(1), 0.2));
        assert!(record_if_better(&mut results, NodeId(1), 0.7));
        assert_eq!(results[&NodeId(1)], 0.7);
    }
    
    #[test]
    fn test_algorithm_toggle_and_parse() {
        assert_eq!(Algorithm::BestPath.toggled(), Algorithm::WalkNetwork);
        assert_eq!(Algorithm::WalkNetwork.toggled(), Algorithm::BestPath);
        assert_eq!("walk".parse::<Algorithm>().unwrap(), Algorithm::WalkNetwork);
        assert!("dijkstra".parse::<Algorithm>().is_err());
    }
}
