//! Composition trees for infrastructure stacks.
//!
//! Resources are declared into a [`domain::CompositionTree`]. A single
//! [`domain::AspectEngine`] pass then corrects ordering between clusters,
//! their capacity-provider associations and the services bound to them, and
//! [`domain::BuildPlan`] turns the result into a build order.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod tree_traits;
pub mod util;
