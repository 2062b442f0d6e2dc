//! Explicit "depends-on" edges, kept apart from structural placement.

use std::collections::HashMap;

use crate::domain::node::NodeId;

/// Per-node set of explicit dependencies.
///
/// Sets keep insertion order so that printed edges and build plans are
/// reproducible from one run to the next.
#[derive(Debug, Default, Clone)]
pub struct DependencyStore {
    edges: HashMap<NodeId, Vec<NodeId>>,
    count: usize,
}

impl DependencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `from depends-on on`. Returns false if the edge already existed.
    pub fn insert(&mut self, from: NodeId, on: NodeId) -> bool {
        if self.contains(from, on) {
            return false;
        }
        self.edges.entry(from).or_default().push(on);
        self.count += 1;
        true
    }

    pub fn edges_of(&self, node: NodeId) -> &[NodeId] {
        self.edges.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, from: NodeId, on: NodeId) -> bool {
        self.edges_of(from).contains(&on)
    }

    /// Total number of distinct edges.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}
