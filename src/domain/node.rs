//! Resource nodes: identity, kind and structural placement.

use std::fmt;

use generational_arena::Index;

/// Opaque identity of a node within one composition tree.
///
/// Wraps the arena index, so an id from another tree never resolves to a
/// live node of this one by accident of position alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) Index);

impl NodeId {
    pub(crate) fn index(self) -> Index {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (slot, generation) = self.0.into_raw_parts();
        write!(f, "#{}.{}", slot, generation)
    }
}

/// Kind of an infrastructure resource.
///
/// Closed set: the ordering rules only care about clusters, their
/// capacity-provider associations and the services bound to them.
/// Everything else is opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceKind {
    Cluster,
    /// Binds `cluster` to its elastic capacity source.
    CapacityProviderAssociation { cluster: NodeId },
    /// Long-running service placed on `cluster`.
    Service { cluster: NodeId },
    Other { resource_type: String },
}

impl ResourceKind {
    pub fn other(resource_type: impl Into<String>) -> Self {
        ResourceKind::Other {
            resource_type: resource_type.into(),
        }
    }

    pub fn tag(&self) -> KindTag {
        match self {
            ResourceKind::Cluster => KindTag::Cluster,
            ResourceKind::CapacityProviderAssociation { .. } => KindTag::CapacityProviderAssociation,
            ResourceKind::Service { .. } => KindTag::Service,
            ResourceKind::Other { .. } => KindTag::Other,
        }
    }

    /// Cluster referenced by this kind, if any.
    pub fn cluster_ref(&self) -> Option<NodeId> {
        match self {
            ResourceKind::CapacityProviderAssociation { cluster }
            | ResourceKind::Service { cluster } => Some(*cluster),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Other { resource_type } => write!(f, "{}", resource_type),
            other => write!(f, "{}", other.tag()),
        }
    }
}

/// Data-less discriminant of [`ResourceKind`], used to key rule tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KindTag {
    Cluster,
    CapacityProviderAssociation,
    Service,
    Other,
}

impl KindTag {
    pub const ALL: [KindTag; 4] = [
        KindTag::Cluster,
        KindTag::CapacityProviderAssociation,
        KindTag::Service,
        KindTag::Other,
    ];
}

impl fmt::Display for KindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KindTag::Cluster => "cluster",
            KindTag::CapacityProviderAssociation => "capacity-provider-association",
            KindTag::Service => "service",
            KindTag::Other => "other",
        };
        f.write_str(s)
    }
}

/// One declared infrastructure object in the composition tree.
#[derive(Debug, Clone)]
pub struct ResourceNode {
    id: NodeId,
    /// Local name, unique among siblings
    name: String,
    kind: ResourceKind,
    /// Structural parent; cleared at most once by the aspect pass
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl ResourceNode {
    pub(crate) fn new(id: NodeId, name: String, kind: ResourceKind, parent: Option<NodeId>) -> Self {
        Self {
            id,
            name,
            kind,
            parent,
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ResourceKind {
        &self.kind
    }

    pub fn tag(&self) -> KindTag {
        self.kind.tag()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

impl fmt::Display for ResourceNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.name, self.kind)
    }
}
