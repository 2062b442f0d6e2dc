use generational_arena::Arena;
use tracing::{debug, instrument};

use crate::domain::aspect::VisitState;
use crate::domain::edges::DependencyStore;
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::node::{KindTag, NodeId, ResourceKind, ResourceNode};

/// Separator between node names in a path.
pub const PATH_SEPARATOR: char = '/';

/// Composition tree for one provisioning run.
///
/// Holds two independent relations over the same arena of nodes:
/// structural placement (parent/children) and explicit dependency edges.
/// Enumeration follows declaration order, also for nodes detached later.
#[derive(Debug)]
pub struct CompositionTree {
    /// Arena storage for all resource nodes
    arena: Arena<ResourceNode>,
    /// Node ids in declaration order
    order: Vec<NodeId>,
    edges: DependencyStore,
    pub(crate) state: VisitState,
}

impl Default for CompositionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl CompositionTree {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            order: Vec::new(),
            edges: DependencyStore::new(),
            state: VisitState::NotStarted,
        }
    }

    /// Declares a node, attaching it under `parent` (root if `None`).
    ///
    /// Cluster references carried by `kind` must resolve to a declared cluster.
    #[instrument(level = "trace", skip(self, name))]
    pub fn add_node(
        &mut self,
        name: impl AsRef<str>,
        kind: ResourceKind,
        parent: Option<NodeId>,
    ) -> DomainResult<NodeId> {
        let name = name.as_ref();
        if self.state != VisitState::NotStarted {
            return Err(DomainError::Sealed);
        }
        if name.is_empty() || name.contains(PATH_SEPARATOR) {
            return Err(DomainError::InvalidName(name.to_string()));
        }
        if let Some(parent_id) = parent {
            self.node(parent_id)?;
        }
        if let Some(cluster) = kind.cluster_ref() {
            let target = self.node(cluster)?;
            if target.tag() != KindTag::Cluster {
                return Err(DomainError::NotACluster {
                    node: name.to_string(),
                    target: self.path_of(cluster),
                });
            }
        }
        if self.sibling_named(parent, name).is_some() {
            let scope = parent
                .map(|p| self.path_of(p))
                .unwrap_or_else(|| "<root>".to_string());
            return Err(DomainError::DuplicateName {
                name: name.to_string(),
                scope,
            });
        }

        let idx = self.arena.insert_with(|idx| {
            ResourceNode::new(NodeId(idx), name.to_string(), kind, parent)
        });
        let id = NodeId(idx);
        if let Some(parent_id) = parent {
            if let Some(parent_node) = self.arena.get_mut(parent_id.index()) {
                parent_node.children.push(id);
            }
        }
        self.order.push(id);
        Ok(id)
    }

    fn sibling_named(&self, parent: Option<NodeId>, name: &str) -> Option<NodeId> {
        match parent {
            Some(p) => self
                .get(p)?
                .children
                .iter()
                .copied()
                .find(|c| self.get(*c).is_some_and(|n| n.name() == name)),
            None => self
                .roots()
                .into_iter()
                .find(|r| self.get(*r).is_some_and(|n| n.name() == name)),
        }
    }

    pub fn get(&self, id: NodeId) -> Option<&ResourceNode> {
        self.arena.get(id.index())
    }

    /// Like [`get`](Self::get), but a missing node is an error.
    pub fn node(&self, id: NodeId) -> DomainResult<&ResourceNode> {
        self.get(id).ok_or(DomainError::UnknownNode(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.arena.contains(id.index())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn state(&self) -> VisitState {
        self.state
    }

    /// Node ids in declaration order.
    pub fn ids(&self) -> &[NodeId] {
        &self.order
    }

    /// All nodes in declaration order.
    pub fn find_all(&self) -> impl Iterator<Item = &ResourceNode> + '_ {
        self.order.iter().filter_map(|id| self.get(*id))
    }

    pub fn by_kind(&self, tag: KindTag) -> impl Iterator<Item = &ResourceNode> + '_ {
        self.find_all().filter(move |n| n.tag() == tag)
    }

    /// Nodes without a structural parent, in declaration order.
    pub fn roots(&self) -> Vec<NodeId> {
        self.find_all()
            .filter(|n| n.parent().is_none())
            .map(ResourceNode::id)
            .collect()
    }

    pub fn children_of(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(ResourceNode::children).unwrap_or(&[])
    }

    /// Clears the structural parent edge of `id`, making it a root.
    ///
    /// Returns `Ok(false)` without touching anything if the node has no parent,
    /// and `DuplicateName` if a root with the same name already exists.
    #[instrument(level = "trace", skip(self))]
    pub fn remove_parent(&mut self, id: NodeId) -> DomainResult<bool> {
        if self.state == VisitState::Completed {
            return Err(DomainError::Sealed);
        }
        let node = self.node(id)?;
        let parent = match node.parent() {
            Some(p) => p,
            None => return Ok(false),
        };
        // the detached node becomes a root, so its name must stay unique there
        if self.sibling_named(None, node.name()).is_some() {
            return Err(DomainError::DuplicateName {
                name: node.name().to_string(),
                scope: "<root>".to_string(),
            });
        }
        if let Some(parent_node) = self.arena.get_mut(parent.index()) {
            parent_node.children.retain(|c| *c != id);
        }
        if let Some(node) = self.arena.get_mut(id.index()) {
            node.parent = None;
        }
        debug!("detached {} from {}", self.path_of(id), self.path_of(parent));
        Ok(true)
    }

    /// Records `from depends-on on`; idempotent.
    ///
    /// Returns false if the edge already existed. Both ends must be declared.
    #[instrument(level = "trace", skip(self))]
    pub fn add_dependency(&mut self, from: NodeId, on: NodeId) -> DomainResult<bool> {
        if self.state == VisitState::Completed {
            return Err(DomainError::Sealed);
        }
        for end in [from, on] {
            if !self.contains(end) {
                return Err(DomainError::UnknownNode(end));
            }
        }
        Ok(self.edges.insert(from, on))
    }

    /// Explicit dependencies of `id`, in insertion order.
    pub fn edges_of(&self, id: NodeId) -> &[NodeId] {
        self.edges.edges_of(id)
    }

    pub fn edges(&self) -> &DependencyStore {
        &self.edges
    }

    /// Slash-separated path of names from the structural root down to `id`.
    pub fn path_of(&self, id: NodeId) -> String {
        let mut names = Vec::new();
        let mut current = self.get(id);
        while let Some(node) = current {
            names.push(node.name());
            current = node.parent().and_then(|p| self.get(p));
        }
        if names.is_empty() {
            return id.to_string();
        }
        names.reverse();
        names.join(&PATH_SEPARATOR.to_string())
    }

    /// Resolves a slash-separated path to a node.
    pub fn lookup(&self, path: &str) -> Option<NodeId> {
        let mut segments = path.split(PATH_SEPARATOR).filter(|s| !s.is_empty());
        let mut current = self.sibling_named(None, segments.next()?)?;
        for segment in segments {
            current = self.sibling_named(Some(current), segment)?;
        }
        Some(current)
    }

    /// Pre-order walk over all structural trees, roots in declaration order.
    pub fn iter(&self) -> TreeIterator<'_> {
        TreeIterator::new(self)
    }

    /// Number of levels in the deepest structural tree.
    #[instrument(level = "debug", skip(self))]
    pub fn depth(&self) -> usize {
        self.roots()
            .into_iter()
            .map(|r| self.calculate_depth(r))
            .max()
            .unwrap_or(0)
    }

    fn calculate_depth(&self, id: NodeId) -> usize {
        1 + self
            .children_of(id)
            .iter()
            .map(|&child| self.calculate_depth(child))
            .max()
            .unwrap_or(0)
    }
}

pub struct TreeIterator<'a> {
    tree: &'a CompositionTree,
    stack: Vec<(NodeId, usize)>,
}

impl<'a> TreeIterator<'a> {
    fn new(tree: &'a CompositionTree) -> Self {
        let stack = tree.roots().into_iter().rev().map(|r| (r, 0)).collect();
        Self { tree, stack }
    }
}

impl<'a> Iterator for TreeIterator<'a> {
    /// Node together with its structural depth (roots are 0)
    type Item = (&'a ResourceNode, usize);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((current, level)) = self.stack.pop() {
            if let Some(node) = self.tree.get(current) {
                // Push children in reverse order for left-to-right traversal
                for &child in node.children().iter().rev() {
                    self.stack.push((child, level + 1));
                }
                return Some((node, level));
            }
        }
        None
    }
}
