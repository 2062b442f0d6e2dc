//! Build order over the corrected dependency relation.
//!
//! The planner is the consumer of the aspect pass. It combines explicit edges
//! with the structural rule that a parent is realized after its children, and
//! sorts the result topologically. Cycle detection lives here, not in the
//! aspect engine.

use std::collections::{BTreeSet, HashMap};

use itertools::Itertools;
use tracing::{debug, instrument, warn};

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::node::NodeId;
use crate::domain::tree::CompositionTree;

/// Topologically sorted build order, dependencies first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    waves: Vec<Vec<NodeId>>,
    order: Vec<NodeId>,
}

/// Explicit edges plus structural children, without duplicates.
pub fn dependencies_of(tree: &CompositionTree, id: NodeId) -> Vec<NodeId> {
    tree.edges_of(id)
        .iter()
        .chain(tree.children_of(id))
        .copied()
        .unique()
        .collect()
}

impl BuildPlan {
    /// Sorts all nodes of `tree`; ties are broken by declaration order.
    #[instrument(level = "debug", skip_all, fields(nodes = tree.len()))]
    pub fn compute(tree: &CompositionTree) -> DomainResult<Self> {
        let ids = tree.ids();
        let position: HashMap<NodeId, usize> =
            ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();

        let mut pending: Vec<usize> = vec![0; ids.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); ids.len()];
        for (i, id) in ids.iter().enumerate() {
            for dep in dependencies_of(tree, *id) {
                let j = *position.get(&dep).ok_or(DomainError::UnknownNode(dep))?;
                pending[i] += 1;
                dependents[j].push(i);
            }
        }

        let mut ready: BTreeSet<usize> = (0..ids.len()).filter(|i| pending[*i] == 0).collect();
        let mut waves = Vec::new();
        let mut sorted = 0;
        while !ready.is_empty() {
            let wave: Vec<usize> = std::mem::take(&mut ready).into_iter().collect();
            for &i in &wave {
                for &d in &dependents[i] {
                    pending[d] -= 1;
                    if pending[d] == 0 {
                        ready.insert(d);
                    }
                }
            }
            sorted += wave.len();
            waves.push(wave.into_iter().map(|i| ids[i]).collect::<Vec<_>>());
        }

        if sorted < ids.len() {
            let remaining: Vec<usize> = (0..ids.len()).filter(|i| pending[*i] > 0).collect();
            let cycle = find_cycle(tree, &remaining, &position, &pending);
            warn!("cycle: {}", cycle.join(" -> "));
            return Err(DomainError::CycleDetected { cycle });
        }

        let order: Vec<NodeId> = waves.iter().flatten().copied().collect();
        debug!("planned {} nodes in {} waves", order.len(), waves.len());
        Ok(Self { waves, order })
    }

    /// Every node, each after all of its dependencies.
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    /// Groups of nodes whose dependencies all lie in earlier groups.
    pub fn waves(&self) -> &[Vec<NodeId>] {
        &self.waves
    }

    /// Index of `id` within [`order`](Self::order).
    pub fn position(&self, id: NodeId) -> Option<usize> {
        self.order.iter().position(|n| *n == id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Walks unsorted nodes along unsorted dependencies until one repeats.
///
/// Every unsorted node has at least one unsorted dependency, so the walk
/// always closes a loop.
fn find_cycle(
    tree: &CompositionTree,
    remaining: &[usize],
    position: &HashMap<NodeId, usize>,
    pending: &[usize],
) -> Vec<String> {
    let ids = tree.ids();
    let mut path: Vec<usize> = Vec::new();
    let mut current = remaining[0];
    loop {
        if let Some(start) = path.iter().position(|p| *p == current) {
            let mut cycle: Vec<String> =
                path[start..].iter().map(|i| tree.path_of(ids[*i])).collect();
            cycle.push(tree.path_of(ids[current]));
            return cycle;
        }
        path.push(current);
        let next = dependencies_of(tree, ids[current])
            .into_iter()
            .filter_map(|dep| position.get(&dep).copied())
            .find(|j| pending[*j] > 0);
        match next {
            Some(j) => current = j,
            None => return path.iter().map(|i| tree.path_of(ids[*i])).collect(),
        }
    }
}
