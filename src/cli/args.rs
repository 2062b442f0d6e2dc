//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueHint};

/// Composition trees for infrastructure stacks: aspect passes, dependency correction and build ordering
#[derive(Parser, Debug)]
#[command(name = "stackgraph")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug output (-d info, -dd debug, -ddd trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub debug: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Extra config file, merged after global and local config
    #[arg(
        short = 'c',
        long = "config",
        env = "STACKGRAPH_CONFIG",
        global = true,
        value_hint = ValueHint::FilePath
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the build order after the aspect pass
    Plan {
        /// Manifest file
        #[arg(value_hint = ValueHint::FilePath)]
        manifest: PathBuf,
        /// Group resources into build waves
        #[arg(short, long)]
        waves: bool,
    },

    /// Show the composition tree after the aspect pass
    Tree {
        /// Manifest file
        #[arg(value_hint = ValueHint::FilePath)]
        manifest: PathBuf,
        /// Show the tree as declared, before the aspect pass
        #[arg(long)]
        declared: bool,
    },

    /// List explicit dependency edges per resource
    Edges {
        /// Manifest file
        #[arg(value_hint = ValueHint::FilePath)]
        manifest: PathBuf,
    },

    /// Check that the manifest yields a valid build order
    Validate {
        /// Manifest file
        #[arg(value_hint = ValueHint::FilePath)]
        manifest: PathBuf,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show effective settings
    Show {
        /// Directory whose local config to include
        #[arg(value_hint = ValueHint::DirPath)]
        dir: Option<PathBuf>,
    },
    /// Show config file locations
    Path,
}
