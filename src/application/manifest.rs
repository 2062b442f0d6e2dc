//! Declarative manifest of a composition.
//!
//! A manifest lists resources in declaration order. `parent` and `cluster`
//! refer to earlier resources by slash-separated path, `depends_on` to any
//! resource:
//!
//! ```toml
//! [[resource]]
//! name = "EcsClusterStack"
//! type = "AWS::CloudFormation::Stack"
//!
//! [[resource]]
//! name = "Cluster"
//! parent = "EcsClusterStack"
//! kind = "cluster"
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{CompositionTree, NodeId, ResourceKind};

/// Resource type shown for `other` resources that do not name one.
pub const DEFAULT_RESOURCE_TYPE: &str = "Resource";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Optional name of the composition
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "resource")]
    pub resources: Vec<ResourceSpec>,
}

/// One `[[resource]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceSpec {
    pub name: String,
    #[serde(default)]
    pub kind: KindSpec,
    /// Free-form resource type, e.g. `AWS::S3::Bucket`
    #[serde(default, rename = "type")]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub parent: Option<String>,
    /// Target cluster for associations, bound cluster for services
    #[serde(default)]
    pub cluster: Option<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KindSpec {
    Cluster,
    CapacityProviderAssociation,
    Service,
    #[default]
    Other,
}

impl Manifest {
    pub fn parse(content: &str) -> ApplicationResult<Self> {
        toml::from_str(content).map_err(|e| ApplicationError::ManifestParse {
            message: e.to_string(),
        })
    }

    /// Declares every resource, in order, into a fresh tree.
    ///
    /// `depends_on` entries become explicit dependency edges.
    #[instrument(level = "debug", skip(self), fields(resources = self.resources.len()))]
    pub fn declare(&self) -> ApplicationResult<CompositionTree> {
        let mut tree = CompositionTree::new();
        let mut declared = Vec::with_capacity(self.resources.len());
        for spec in &self.resources {
            declared.push(spec.declare_into(&mut tree)?);
        }
        // edges may point forward, so they are resolved once every node exists
        for (spec, id) in self.resources.iter().zip(declared) {
            for dep in &spec.depends_on {
                let on = resolve(&tree, &spec.name, "depends_on", dep)?;
                tree.add_dependency(id, on)?;
            }
        }
        debug!("declared {} nodes", tree.len());
        Ok(tree)
    }
}

impl ResourceSpec {
    fn declare_into(&self, tree: &mut CompositionTree) -> ApplicationResult<NodeId> {
        let parent = self
            .parent
            .as_deref()
            .map(|p| resolve(tree, &self.name, "parent", p))
            .transpose()?;
        let cluster = self
            .cluster
            .as_deref()
            .map(|c| resolve(tree, &self.name, "cluster", c))
            .transpose()?;

        if self.kind != KindSpec::Other && self.resource_type.is_some() {
            return Err(ApplicationError::manifest(
                &self.name,
                "'type' is only valid for other resources",
            ));
        }

        let kind = match (self.kind, cluster) {
            (KindSpec::CapacityProviderAssociation, Some(cluster)) => {
                ResourceKind::CapacityProviderAssociation { cluster }
            }
            (KindSpec::Service, Some(cluster)) => ResourceKind::Service { cluster },
            (KindSpec::CapacityProviderAssociation | KindSpec::Service, None) => {
                return Err(ApplicationError::manifest(
                    &self.name,
                    "missing 'cluster' reference",
                ));
            }
            (KindSpec::Cluster | KindSpec::Other, Some(_)) => {
                return Err(ApplicationError::manifest(
                    &self.name,
                    "'cluster' is only valid for associations and services",
                ));
            }
            (KindSpec::Cluster, None) => ResourceKind::Cluster,
            (KindSpec::Other, None) => ResourceKind::other(
                self.resource_type
                    .as_deref()
                    .unwrap_or(DEFAULT_RESOURCE_TYPE),
            ),
        };

        tree.add_node(&self.name, kind, parent)
            .map_err(|e| ApplicationError::manifest(&self.name, e.to_string()))
    }
}

fn resolve(
    tree: &CompositionTree,
    resource: &str,
    field: &str,
    path: &str,
) -> ApplicationResult<NodeId> {
    tree.lookup(path).ok_or_else(|| {
        ApplicationError::manifest(
            resource,
            format!("{} '{}' does not name a declared resource", field, path),
        )
    })
}
