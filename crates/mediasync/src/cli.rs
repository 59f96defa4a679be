use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Clone, Debug, Parser)]
#[command(name = "mediasync", version = env!("CARGO_PKG_VERSION"), about, long_about = None, propagate_version = true)]
pub struct App {
    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Download referenced media and rewrite content to local paths
    #[command(alias = "s", name = "sync")]
    Sync(SyncArg),
    /// Show how URLs map onto the local media directory
    #[command(alias = "r", name = "resolve")]
    Resolve(ResolveArg),
}

#[derive(Clone, Debug, Args)]
pub struct ProjectArg {
    /// Project root; relative paths in the config resolve against it
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Config file [default: <root>/mediasync.toml]
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Debug, Args)]
pub struct SyncArg {
    #[command(flatten)]
    pub project: ProjectArg,

    /// Fail the build on any sync error
    #[arg(long, conflicts_with = "lenient")]
    pub strict: bool,

    /// Log sync errors and keep building with remote URLs
    #[arg(long)]
    pub lenient: bool,

    /// Download media but leave content files untouched
    #[arg(long)]
    pub no_rewrite: bool,

    /// Maximum parallel downloads
    #[arg(long)]
    pub concurrency: Option<usize>,
}

impl SyncArg {
    /// `Some` when the policy was forced on the command line.
    pub fn strict_override(&self) -> Option<bool> {
        match (self.strict, self.lenient) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Args)]
pub struct ResolveArg {
    #[command(flatten)]
    pub project: ProjectArg,

    /// Remote URLs to resolve
    #[arg(required = true)]
    pub urls: Vec<String>,
}
