//! Domain layer: composition tree, aspect pass and build ordering
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod aspect;
pub mod edges;
pub mod error;
pub mod node;
pub mod plan;
pub mod rules;
pub mod tree;

pub use aspect::{Aspect, AspectEngine, VisitContext, VisitReport, VisitState};
pub use edges::DependencyStore;
pub use error::{DomainError, DomainResult};
pub use node::{KindTag, NodeId, ResourceKind, ResourceNode};
pub use plan::{dependencies_of, BuildPlan};
pub use rules::{DetachAssociation, ServiceAssociationEdges};
pub use tree::{CompositionTree, TreeIterator, PATH_SEPARATOR};
