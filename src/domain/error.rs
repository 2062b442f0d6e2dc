//! Domain-level errors (no external dependencies)

use thiserror::Error;

use crate::domain::node::NodeId;

/// Domain errors represent violations of the tree, the visitor pass or the build order.
/// These are independent of manifest and I/O concerns.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("node {node} references {target}, which is not a cluster")]
    NotACluster { node: String, target: String },

    #[error("invalid node name '{0}': must be non-empty and must not contain '/'")]
    InvalidName(String),

    #[error("duplicate name '{name}' under {scope}")]
    DuplicateName { name: String, scope: String },

    #[error("tree is sealed: the aspect pass has completed, declare into a fresh tree")]
    Sealed,

    #[error("aspect pass already completed on this tree")]
    Reentry,

    #[error("aspect pass aborted earlier on this tree, it cannot be run again")]
    Poisoned,

    #[error("cycle detected in dependency graph: {}", cycle.join(" -> "))]
    CycleDetected { cycle: Vec<String> },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
