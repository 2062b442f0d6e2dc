//! Ordering rules for clusters, capacity-provider associations and services.
//!
//! The declarative layer places an association as a structural child of its
//! cluster, and parents are realized after their children. Left alone, the
//! cluster would wait on its own association. The two rules below replace
//! that placement with explicit edges:
//!
//! ```text
//! cluster <- association <- service
//! ```

use tracing::debug;

use crate::domain::aspect::{Aspect, AspectEngine, VisitContext};
use crate::domain::error::DomainResult;
use crate::domain::node::{KindTag, NodeId, ResourceKind};

/// Detaches an association from its parent when that parent is the cluster it targets.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachAssociation;

impl Aspect for DetachAssociation {
    fn name(&self) -> &'static str {
        "detach-association"
    }

    fn kinds(&self) -> &[KindTag] {
        &[KindTag::CapacityProviderAssociation]
    }

    fn visit(&self, ctx: &mut VisitContext<'_>) -> DomainResult<()> {
        let node = ctx.node()?;
        let ResourceKind::CapacityProviderAssociation { cluster } = *node.kind() else {
            return Ok(());
        };
        // binding identity, not name
        if node.parent() != Some(cluster) {
            return Ok(());
        }
        let id = node.id();
        ctx.remove_parent(id)?;
        Ok(())
    }
}

/// Orders every service after the associations of its bound cluster,
/// and each of those associations after the cluster.
#[derive(Debug, Default, Clone, Copy)]
pub struct ServiceAssociationEdges;

impl Aspect for ServiceAssociationEdges {
    fn name(&self) -> &'static str {
        "service-association-edges"
    }

    fn kinds(&self) -> &[KindTag] {
        &[KindTag::Service]
    }

    fn visit(&self, ctx: &mut VisitContext<'_>) -> DomainResult<()> {
        let service = ctx.node_id();
        let ResourceKind::Service { cluster } = *ctx.node()?.kind() else {
            return Ok(());
        };
        let cluster = ctx.tree().node(cluster)?.id();

        let associations: Vec<NodeId> = ctx
            .snapshot_by_kind(KindTag::CapacityProviderAssociation)
            .filter(|n| n.kind().cluster_ref() == Some(cluster))
            .map(|n| n.id())
            .collect();
        if associations.is_empty() {
            debug!("no associations for cluster of {}", ctx.tree().path_of(service));
            return Ok(());
        }

        for association in associations {
            ctx.add_dependency(association, cluster)?;
            ctx.add_dependency(service, association)?;
        }
        Ok(())
    }
}

impl AspectEngine {
    /// Engine with both ordering rules, detach first.
    pub fn with_default_rules() -> Self {
        let mut engine = Self::new();
        engine.register(DetachAssociation);
        engine.register(ServiceAssociationEdges);
        engine
    }
}
