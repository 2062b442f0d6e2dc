//! Command dispatch

use std::io::{self, Write};
use std::path::Path;

use clap::CommandFactory;
use clap_complete::generate;
use tracing::{debug, instrument};

use crate::application::services::SynthService;
use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::output;
use crate::cli::{CliError, CliResult};
use crate::config::{global_config_path, local_config_path, Settings};
use crate::domain::{CompositionTree, KindTag, NodeId};
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::InfraError;
use crate::tree_traits::TreeNodeConvert;

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    dispatch(cli)?;
    io::stdout()
        .flush()
        .map_err(|e| InfraError::io("flush stdout", e))?;
    Ok(())
}

fn dispatch(cli: &Cli) -> CliResult<()> {
    match &cli.command {
        Some(Commands::Plan { manifest, waves }) => _plan(cli, manifest, *waves),
        Some(Commands::Tree { manifest, declared }) => _tree(cli, manifest, *declared),
        Some(Commands::Edges { manifest }) => _edges(cli, manifest),
        Some(Commands::Validate { manifest }) => _validate(cli, manifest),
        Some(Commands::Config { command }) => match command {
            ConfigCommands::Show { dir } => _config_show(cli, dir.as_deref()),
            ConfigCommands::Path => _config_path(),
        },
        Some(Commands::Completion { shell }) => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
        None => Err(CliError::Usage(
            "no command given, see --help".to_string(),
        )),
    }
}

/// Settings for a manifest: layered config including `--config`, then flags.
fn load_settings(cli: &Cli, dir: Option<&Path>) -> CliResult<Settings> {
    if let Some(path) = &cli.config_file {
        if !path.is_file() {
            return Err(CliError::InvalidArgs(format!(
                "config file not found: {}",
                path.display()
            )));
        }
    }
    let mut settings = Settings::load(dir, cli.config_file.as_deref())?;
    if cli.no_color {
        settings.output.color = false;
    }
    if !settings.output.color {
        colored::control::set_override(false);
    }
    Ok(settings)
}

fn synth_service(cli: &Cli, manifest: &Path) -> CliResult<(SynthService, Settings)> {
    let settings = load_settings(cli, manifest.parent())?;
    let container = ServiceContainer::new(settings.clone());
    Ok((container.synth_service(), settings))
}

fn describe(tree: &CompositionTree, id: NodeId) -> String {
    match tree.get(id) {
        Some(node) => format!("{} [{}]", tree.path_of(id), node.kind()),
        None => id.to_string(),
    }
}

#[instrument(skip(cli))]
fn _plan(cli: &Cli, manifest: &Path, waves: bool) -> CliResult<()> {
    let (service, settings) = synth_service(cli, manifest)?;
    let synthesis = service.synthesize_file(manifest)?;
    let tree = &synthesis.tree;
    debug!("{}", synthesis.report);

    if waves || settings.output.show_waves {
        for (i, wave) in synthesis.plan.waves().iter().enumerate() {
            output::header(&format!("wave {}", i + 1));
            for id in wave {
                output::detail(&describe(tree, *id));
            }
        }
    } else {
        for (i, id) in synthesis.plan.order().iter().enumerate() {
            output::info(&format!("{:>3}. {}", i + 1, describe(tree, *id)));
        }
    }
    Ok(())
}

#[instrument(skip(cli))]
fn _tree(cli: &Cli, manifest: &Path, declared: bool) -> CliResult<()> {
    let (service, _) = synth_service(cli, manifest)?;
    let manifest = service.load(manifest)?;
    let tree = if declared {
        manifest.declare()?
    } else {
        service.visit(&manifest)?.0
    };
    debug!("{} nodes, depth {}", tree.len(), tree.depth());
    output::info(&tree.to_tree_string());
    Ok(())
}

#[instrument(skip(cli))]
fn _edges(cli: &Cli, manifest: &Path) -> CliResult<()> {
    let (service, _) = synth_service(cli, manifest)?;
    let manifest = service.load(manifest)?;
    let (tree, report) = service.visit(&manifest)?;

    for node in tree.find_all() {
        let deps = tree.edges_of(node.id());
        if deps.is_empty() {
            continue;
        }
        output::header(&describe(&tree, node.id()));
        for dep in deps {
            output::edge(&describe(&tree, *dep));
        }
    }
    output::info(&format!("\n{}", report));
    Ok(())
}

#[instrument(skip(cli))]
fn _validate(cli: &Cli, manifest: &Path) -> CliResult<()> {
    let (service, _) = synth_service(cli, manifest)?;
    let synthesis = service.synthesize_file(manifest)?;
    let tree = &synthesis.tree;

    output::success(&format!(
        "{}: {} resources ({} clusters, {} associations, {} services), {} edges, {} waves",
        manifest.display(),
        tree.len(),
        tree.by_kind(KindTag::Cluster).count(),
        tree.by_kind(KindTag::CapacityProviderAssociation).count(),
        tree.by_kind(KindTag::Service).count(),
        tree.edges().len(),
        synthesis.plan.waves().len(),
    ));
    Ok(())
}

fn _config_show(cli: &Cli, dir: Option<&Path>) -> CliResult<()> {
    let settings = load_settings(cli, dir)?;
    output::info(&settings.to_toml()?);
    Ok(())
}

fn _config_path() -> CliResult<()> {
    match global_config_path() {
        Some(path) => {
            let state = if path.exists() { "" } else { " (not present)" };
            output::info(&format!("global: {}{}", path.display(), state));
        }
        None => output::info("global: <no config directory>"),
    }
    output::info(&format!(
        "local:  {}",
        local_config_path(Path::new("<manifest dir>")).display()
    ));
    Ok(())
}
