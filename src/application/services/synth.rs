//! Provisioning run service
//!
//! Declares a manifest into a fresh composition tree, runs the aspect pass
//! with the configured rules, and computes the build plan.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::application::{ApplicationError, ApplicationResult, IoResultExt, Manifest};
use crate::config::{RuleSettings, Settings};
use crate::domain::{
    AspectEngine, BuildPlan, CompositionTree, DetachAssociation, ServiceAssociationEdges,
    VisitReport,
};
use crate::infrastructure::traits::FileSystem;

/// Result of one provisioning run.
#[derive(Debug)]
pub struct Synthesis {
    /// Tree after the aspect pass
    pub tree: CompositionTree,
    pub report: VisitReport,
    pub plan: BuildPlan,
}

/// Aspect engine with the rules enabled in `rules`, detach first.
pub fn engine_for(rules: &RuleSettings) -> AspectEngine {
    let mut engine = AspectEngine::new();
    if rules.detach_association {
        engine.register(DetachAssociation);
    }
    if rules.service_association_edges {
        engine.register(ServiceAssociationEdges);
    }
    engine
}

/// Service running the declare → visit → plan pipeline.
pub struct SynthService {
    fs: Arc<dyn FileSystem>,
    settings: Arc<Settings>,
}

impl SynthService {
    /// Create a new synth service.
    pub fn new(fs: Arc<dyn FileSystem>, settings: Arc<Settings>) -> Self {
        Self { fs, settings }
    }

    /// Read and parse a manifest file.
    #[instrument(level = "debug", skip(self))]
    pub fn load(&self, path: &Path) -> ApplicationResult<Manifest> {
        if !self.fs.is_file(path) {
            return Err(ApplicationError::OperationFailed {
                context: format!("read manifest: {}", path.display()),
                source: Box::new(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no such manifest file",
                )),
            });
        }
        let content = self
            .fs
            .read_to_string(path)
            .with_path_context("read manifest", path)?;
        Manifest::parse(&content)
    }

    /// Declare and run the aspect pass, without planning.
    #[instrument(level = "debug", skip_all, fields(manifest = manifest.name.as_deref().unwrap_or("")))]
    pub fn visit(&self, manifest: &Manifest) -> ApplicationResult<(CompositionTree, VisitReport)> {
        let mut tree = manifest.declare()?;

        let engine = engine_for(&self.settings.rules);
        debug!("rules: {:?}", engine.names());
        let report = engine.run(&mut tree)?;
        Ok((tree, report))
    }

    /// Declare, run the aspect pass, and plan.
    pub fn synthesize(&self, manifest: &Manifest) -> ApplicationResult<Synthesis> {
        let (tree, report) = self.visit(manifest)?;

        let plan = BuildPlan::compute(&tree)?;
        info!(
            "planned {} resources in {} waves",
            plan.len(),
            plan.waves().len()
        );
        Ok(Synthesis { tree, report, plan })
    }

    /// Load and synthesize in one step.
    pub fn synthesize_file(&self, path: &Path) -> ApplicationResult<Synthesis> {
        let manifest = self.load(path)?;
        self.synthesize(&manifest)
    }
}
