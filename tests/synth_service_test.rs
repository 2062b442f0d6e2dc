//! End-to-end provisioning runs: manifest file → tree → aspect pass → plan.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rstest::{fixture, rstest};
use tempfile::TempDir;

use stackgraph::application::services::SynthService;
use stackgraph::application::ApplicationError;
use stackgraph::config::{RuleSettings, Settings};
use stackgraph::domain::{KindTag, NodeId, VisitState};
use stackgraph::infrastructure::di::ServiceContainer;
use stackgraph::infrastructure::traits::FileSystem;
use stackgraph::util::testing;

const ECS_MANIFEST: &str = r#"
name = "ecs"

[[resource]]
name = "EcsClusterStack"
type = "AWS::CloudFormation::Stack"

[[resource]]
name = "Cluster"
parent = "EcsClusterStack"
kind = "cluster"

[[resource]]
name = "Assoc"
parent = "EcsClusterStack/Cluster"
kind = "capacity-provider-association"
cluster = "EcsClusterStack/Cluster"

[[resource]]
name = "ServiceStack"
type = "AWS::CloudFormation::Stack"
depends_on = ["EcsClusterStack"]

[[resource]]
name = "TaskDefinition"
parent = "ServiceStack"
type = "AWS::ECS::TaskDefinition"

[[resource]]
name = "Service"
parent = "ServiceStack"
kind = "service"
cluster = "EcsClusterStack/Cluster"
depends_on = ["ServiceStack/TaskDefinition"]
"#;

/// In-memory manifests keyed by path.
#[derive(Default)]
struct MemoryFileSystem {
    files: HashMap<PathBuf, String>,
}

impl MemoryFileSystem {
    fn with_file(mut self, path: &str, content: &str) -> Self {
        self.files.insert(PathBuf::from(path), content.to_string());
        self
    }
}

impl FileSystem for MemoryFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "not in memory"))
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }
}

#[fixture]
fn manifest_dir() -> TempDir {
    testing::init_test_setup();
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("ecs.toml"), ECS_MANIFEST).unwrap();
    dir
}

fn service_with(rules: RuleSettings) -> SynthService {
    let settings = Settings {
        rules,
        ..Settings::default()
    };
    ServiceContainer::new(settings).synth_service()
}

fn position(order: &[NodeId], id: NodeId) -> usize {
    order.iter().position(|n| *n == id).unwrap()
}

#[rstest]
fn given_ecs_manifest_when_synthesizing_then_plan_respects_corrected_edges(manifest_dir: TempDir) {
    // Arrange
    let service = service_with(RuleSettings::default());
    let path = manifest_dir.path().join("ecs.toml");

    // Act
    let synthesis = service.synthesize_file(&path).unwrap();

    // Assert
    let tree = &synthesis.tree;
    let cluster = tree.lookup("EcsClusterStack/Cluster").unwrap();
    let assoc = tree.lookup("Assoc").expect("association detached to a root");
    let svc = tree.lookup("ServiceStack/Service").unwrap();
    let task = tree.lookup("ServiceStack/TaskDefinition").unwrap();

    assert_eq!(tree.state(), VisitState::Completed);
    assert_eq!(tree.edges_of(assoc), &[cluster]);
    assert_eq!(tree.edges_of(svc), &[task, assoc]);

    let order = synthesis.plan.order();
    assert_eq!(order.len(), 6);
    assert!(position(order, cluster) < position(order, assoc));
    assert!(position(order, assoc) < position(order, svc));
    assert!(position(order, task) < position(order, svc));

    assert_eq!(synthesis.report.parents_detached, 1);
    assert_eq!(synthesis.report.edges_added, 2);
}

#[rstest]
fn given_detach_disabled_when_synthesizing_then_cycle(manifest_dir: TempDir) {
    // Arrange
    let service = service_with(RuleSettings {
        detach_association: false,
        service_association_edges: true,
    });

    // Act
    let err = service
        .synthesize_file(&manifest_dir.path().join("ecs.toml"))
        .unwrap_err();

    // Assert
    assert!(err.is_cycle(), "unexpected error: {}", err);
    let msg = err.to_string();
    assert!(msg.contains("EcsClusterStack/Cluster/Assoc"), "{}", msg);
}

#[rstest]
fn given_ecs_manifest_when_visiting_only_then_no_plan_but_edges(manifest_dir: TempDir) {
    // Arrange
    let service = service_with(RuleSettings::default());
    let manifest = service.load(&manifest_dir.path().join("ecs.toml")).unwrap();

    // Act
    let (tree, report) = service.visit(&manifest).unwrap();

    // Assert
    assert_eq!(tree.by_kind(KindTag::CapacityProviderAssociation).count(), 1);
    assert_eq!(report.nodes_visited, 6);
    assert_eq!(tree.edges().len(), 4);
}

#[test]
fn given_in_memory_manifest_when_synthesizing_then_reads_through_filesystem_trait() {
    // Arrange
    let fs = MemoryFileSystem::default().with_file(
        "/mem/stack.toml",
        r#"
[[resource]]
name = "Bucket"
type = "AWS::S3::Bucket"

[[resource]]
name = "Reader"
type = "AWS::Lambda::Function"
depends_on = ["Bucket"]
"#,
    );
    let container = ServiceContainer::with_deps(Settings::default(), Arc::new(fs));

    // Act
    let synthesis = container
        .synth_service()
        .synthesize_file(Path::new("/mem/stack.toml"))
        .unwrap();

    // Assert
    let names: Vec<&str> = synthesis
        .plan
        .order()
        .iter()
        .map(|id| synthesis.tree.get(*id).unwrap().name())
        .collect();
    assert_eq!(names, vec!["Bucket", "Reader"]);
}

#[rstest]
#[case::unknown_parent(
    "[[resource]]\nname = \"a\"\nparent = \"nope\"\n",
    "parent 'nope'"
)]
#[case::missing_cluster(
    "[[resource]]\nname = \"s\"\nkind = \"service\"\n",
    "missing 'cluster'"
)]
#[case::cluster_not_a_cluster(
    "[[resource]]\nname = \"b\"\n\n[[resource]]\nname = \"s\"\nkind = \"service\"\ncluster = \"b\"\n",
    "not a cluster"
)]
#[case::type_on_cluster(
    "[[resource]]\nname = \"c\"\nkind = \"cluster\"\ntype = \"AWS::ECS::Cluster\"\n",
    "'type' is only valid"
)]
#[case::unknown_dependency(
    "[[resource]]\nname = \"a\"\ndepends_on = [\"ghost\"]\n",
    "depends_on 'ghost'"
)]
fn given_invalid_manifest_when_synthesizing_then_manifest_error(
    #[case] content: &str,
    #[case] expected: &str,
) {
    // Arrange
    let fs = MemoryFileSystem::default().with_file("/mem/bad.toml", content);
    let service = ServiceContainer::with_deps(Settings::default(), Arc::new(fs)).synth_service();

    // Act
    let err = service
        .synthesize_file(Path::new("/mem/bad.toml"))
        .unwrap_err();

    // Assert
    assert!(matches!(err, ApplicationError::Manifest { .. }), "{:?}", err);
    assert!(err.to_string().contains(expected), "{}", err);
}

#[test]
fn given_missing_manifest_when_synthesizing_then_operation_failed() {
    let service = ServiceContainer::with_deps(
        Settings::default(),
        Arc::new(MemoryFileSystem::default()),
    )
    .synth_service();

    let err = service
        .synthesize_file(Path::new("/mem/none.toml"))
        .unwrap_err();

    assert!(matches!(err, ApplicationError::OperationFailed { .. }));
}

#[test]
fn given_demo_manifest_when_synthesizing_then_plans_every_resource() {
    // Arrange
    testing::init_test_setup();
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/ecs-go-apps.toml");
    let service = service_with(RuleSettings::default());

    // Act
    let synthesis = service.synthesize_file(&path).unwrap();

    // Assert
    let tree = &synthesis.tree;
    let cluster = tree.lookup("EcsClusterStack/EcsClusterForNextApps").unwrap();
    let assoc = tree.lookup("CapacityProviderAssociations").unwrap();
    let svc = tree.lookup("GoBedrockService/EcsGoBedrockSimpleService").unwrap();
    let collection = tree.lookup("AmazonOpenSearchStack/demo").unwrap();
    let policy = tree.lookup("AmazonOpenSearchStack/accessPolicyDemo").unwrap();

    let order = synthesis.plan.order();
    assert_eq!(order.len(), tree.len());
    assert!(position(order, cluster) < position(order, assoc));
    assert!(position(order, assoc) < position(order, svc));
    assert!(position(order, policy) < position(order, collection));
    assert!(tree.edges_of(svc).contains(&assoc));
}
