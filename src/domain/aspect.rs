//! Single-pass aspect engine.
//!
//! Once declaration is complete, [`AspectEngine::run`] visits every node of a
//! [`CompositionTree`] exactly once, in declaration order, and hands it to each
//! registered [`Aspect`] keyed on the node's [`KindTag`]. Aspects may detach
//! nodes from their parents and add dependency edges, but cannot declare new
//! nodes: [`VisitContext`] does not expose `add_node`.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, info, instrument, trace, warn};

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::node::{KindTag, NodeId, ResourceNode};
use crate::domain::tree::CompositionTree;

/// Lifecycle of the aspect pass over one tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitState {
    NotStarted,
    /// Set for the duration of a pass; stays set if a handler aborted it
    Running,
    Completed,
}

/// A correction rule applied to every node of a matching kind.
pub trait Aspect {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Node kinds this aspect is registered for.
    fn kinds(&self) -> &[KindTag];

    fn visit(&self, ctx: &mut VisitContext<'_>) -> DomainResult<()>;
}

/// Handle given to an [`Aspect`] while it visits one node.
pub struct VisitContext<'a> {
    tree: &'a mut CompositionTree,
    snapshot: &'a [NodeId],
    current: NodeId,
    stats: &'a mut VisitReport,
}

impl<'a> VisitContext<'a> {
    /// Node currently being visited.
    pub fn node_id(&self) -> NodeId {
        self.current
    }

    pub fn node(&self) -> DomainResult<&ResourceNode> {
        self.tree.node(self.current)
    }

    /// Read access to the whole tree.
    pub fn tree(&self) -> &CompositionTree {
        self.tree
    }

    /// Nodes taken at the start of the pass, in visiting order.
    pub fn snapshot(&self) -> &[NodeId] {
        self.snapshot
    }

    /// Snapshot nodes of the given kind.
    pub fn snapshot_by_kind(&self, tag: KindTag) -> impl Iterator<Item = &ResourceNode> + '_ {
        self.snapshot
            .iter()
            .filter_map(|id| self.tree.get(*id))
            .filter(move |n| n.tag() == tag)
    }

    /// See [`CompositionTree::remove_parent`].
    pub fn remove_parent(&mut self, id: NodeId) -> DomainResult<bool> {
        let detached = self.tree.remove_parent(id)?;
        if detached {
            self.stats.parents_detached += 1;
        }
        Ok(detached)
    }

    /// See [`CompositionTree::add_dependency`].
    pub fn add_dependency(&mut self, from: NodeId, on: NodeId) -> DomainResult<bool> {
        let added = self.tree.add_dependency(from, on)?;
        if added {
            debug!(
                "edge {} -> {}",
                self.tree.path_of(from),
                self.tree.path_of(on)
            );
            self.stats.edges_added += 1;
        }
        Ok(added)
    }
}

/// Summary of one aspect pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitReport {
    pub nodes_visited: usize,
    pub invocations: usize,
    pub parents_detached: usize,
    pub edges_added: usize,
}

impl fmt::Display for VisitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "visited {} nodes, {} rule invocations, {} parents detached, {} edges added",
            self.nodes_visited, self.invocations, self.parents_detached, self.edges_added
        )
    }
}

/// Registry of aspects plus the kind-keyed dispatch table.
#[derive(Default)]
pub struct AspectEngine {
    aspects: Vec<Box<dyn Aspect>>,
    /// Indices into `aspects`, in registration order per kind
    table: BTreeMap<KindTag, Vec<usize>>,
}

impl AspectEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an aspect for each kind it declares.
    pub fn register(&mut self, aspect: impl Aspect + 'static) -> &mut Self {
        let idx = self.aspects.len();
        for tag in aspect.kinds() {
            let slot = self.table.entry(*tag).or_default();
            if !slot.contains(&idx) {
                slot.push(idx);
            }
        }
        debug!("registered aspect {} for {:?}", aspect.name(), aspect.kinds());
        self.aspects.push(Box::new(aspect));
        self
    }

    pub fn len(&self) -> usize {
        self.aspects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aspects.is_empty()
    }

    /// Names of registered aspects, in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.aspects.iter().map(|a| a.name()).collect()
    }

    /// Runs the pass over `tree`.
    ///
    /// The node set is fixed when the pass starts. A handler error aborts
    /// the pass and leaves the tree in [`VisitState::Running`].
    #[instrument(level = "debug", skip_all, fields(nodes = tree.len()))]
    pub fn run(&self, tree: &mut CompositionTree) -> DomainResult<VisitReport> {
        match tree.state {
            VisitState::NotStarted => {}
            VisitState::Completed => return Err(DomainError::Reentry),
            VisitState::Running => return Err(DomainError::Poisoned),
        }
        tree.state = VisitState::Running;

        let snapshot: Vec<NodeId> = tree.ids().to_vec();
        let mut report = VisitReport::default();

        for &current in &snapshot {
            let tag = tree.node(current)?.tag();
            report.nodes_visited += 1;
            let Some(handlers) = self.table.get(&tag) else {
                continue;
            };
            for &idx in handlers {
                let aspect = &self.aspects[idx];
                trace!("visit {} with {}", tree.path_of(current), aspect.name());
                let mut ctx = VisitContext {
                    tree: &mut *tree,
                    snapshot: &snapshot,
                    current,
                    stats: &mut report,
                };
                if let Err(e) = aspect.visit(&mut ctx) {
                    warn!("aspect {} failed on {}: {}", aspect.name(), tree.path_of(current), e);
                    return Err(e);
                }
                report.invocations += 1;
            }
        }

        tree.state = VisitState::Completed;
        info!("aspect pass complete: {}", report);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::domain::node::ResourceKind;

    /// Records every node it sees.
    struct Recorder {
        kinds: Vec<KindTag>,
        seen: Rc<RefCell<Vec<NodeId>>>,
    }

    impl Aspect for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn kinds(&self) -> &[KindTag] {
            &self.kinds
        }

        fn visit(&self, ctx: &mut VisitContext<'_>) -> DomainResult<()> {
            self.seen.borrow_mut().push(ctx.node_id());
            Ok(())
        }
    }

    struct Failing;

    impl Aspect for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn kinds(&self) -> &[KindTag] {
            &[KindTag::Cluster]
        }

        fn visit(&self, ctx: &mut VisitContext<'_>) -> DomainResult<()> {
            let stray = ctx.node_id();
            ctx.remove_parent(stray)?;
            Err(DomainError::UnknownNode(stray))
        }
    }

    fn sample_tree() -> (CompositionTree, Vec<NodeId>) {
        let mut tree = CompositionTree::new();
        let stack = tree.add_node("Stack", ResourceKind::other("stack"), None).unwrap();
        let cluster = tree.add_node("Cluster", ResourceKind::Cluster, Some(stack)).unwrap();
        let bucket = tree.add_node("Bucket", ResourceKind::other("bucket"), Some(stack)).unwrap();
        (tree, vec![stack, cluster, bucket])
    }

    #[test]
    fn given_all_kinds_aspect_when_running_then_visits_each_node_once_in_order() {
        let (mut tree, ids) = sample_tree();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut engine = AspectEngine::new();
        engine.register(Recorder {
            kinds: KindTag::ALL.to_vec(),
            seen: Rc::clone(&seen),
        });

        let report = engine.run(&mut tree).unwrap();

        assert_eq!(*seen.borrow(), ids);
        assert_eq!(report.nodes_visited, 3);
        assert_eq!(report.invocations, 3);
        assert_eq!(tree.state(), VisitState::Completed);
    }

    #[test]
    fn given_kind_keyed_aspect_when_running_then_only_matching_nodes_are_visited() {
        let (mut tree, ids) = sample_tree();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut engine = AspectEngine::new();
        engine.register(Recorder {
            kinds: vec![KindTag::Cluster],
            seen: Rc::clone(&seen),
        });

        let report = engine.run(&mut tree).unwrap();

        assert_eq!(*seen.borrow(), vec![ids[1]]);
        assert_eq!(report.nodes_visited, 3);
        assert_eq!(report.invocations, 1);
    }

    #[test]
    fn given_completed_tree_when_running_again_then_reentry() {
        let (mut tree, _) = sample_tree();
        let engine = AspectEngine::new();

        engine.run(&mut tree).unwrap();

        assert_eq!(engine.run(&mut tree), Err(DomainError::Reentry));
    }

    #[test]
    fn given_failing_aspect_when_running_then_tree_is_poisoned() {
        let (mut tree, _) = sample_tree();
        let mut engine = AspectEngine::new();
        engine.register(Failing);

        assert!(engine.run(&mut tree).is_err());

        assert_eq!(tree.state(), VisitState::Running);
        assert_eq!(engine.run(&mut tree), Err(DomainError::Poisoned));
    }
}
