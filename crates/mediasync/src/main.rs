use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;
use mediasync::fetch::ReqwestClient;
use mediasync::manifest::JsonManifestStore;
use mediasync::{ErrorPolicy, MediaSync, Settings, SyncConfig, SyncOutcome};
use tracing_subscriber::EnvFilter;

use crate::cli::{App, Commands, ProjectArg, ResolveArg, SyncArg};

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app = App::parse();
    init_tracing(app.verbose);

    match app.cmd {
        Commands::Sync(arg) => sync(arg).await,
        Commands::Resolve(arg) => resolve(arg),
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn load(project: &ProjectArg) -> anyhow::Result<(PathBuf, SyncConfig)> {
    let root = match &project.root {
        Some(root) => root.clone(),
        None => std::env::current_dir().context("cannot determine the current directory")?,
    };
    let file = project
        .config
        .clone()
        .unwrap_or_else(|| root.join(mediasync::config::CONFIG_FILE));
    let config = SyncConfig::load(&file).with_context(|| format!("failed to load '{}'", file.display()))?;
    Ok((root, config))
}

fn settings(arg: &SyncArg) -> anyhow::Result<Settings> {
    let (root, mut config) = load(&arg.project)?;
    if let Some(strict) = arg.strict_override() {
        config.strict = Some(strict);
    }
    if let Some(concurrency) = arg.concurrency {
        config.concurrency = concurrency;
    }
    if arg.no_rewrite {
        config.rewrite_content = false;
    }
    Ok(config.settings(&root)?)
}

async fn sync(arg: SyncArg) -> anyhow::Result<()> {
    let settings = match settings(&arg) {
        Ok(settings) => settings,
        Err(error) => match ErrorPolicy::from_flag(arg.strict_override()) {
            ErrorPolicy::Strict => return Err(error),
            ErrorPolicy::Lenient => {
                tracing::warn!(error = %format!("{error:#}"), "Media sync not configured; continuing");
                return Ok(());
            }
        },
    };

    let policy = settings.policy();
    let client = ReqwestClient::new()?;
    let store = JsonManifestStore::new(&settings.manifest_path);
    let outcome = MediaSync::new(settings, client, store)
        .run_with_policy(policy)
        .await?;

    if let SyncOutcome::Aborted(summary) = &outcome {
        for failure in &summary.failures {
            tracing::warn!(url = %failure.url, attempts = failure.attempts, error = %failure.error, "Not localized");
        }
    }
    Ok(())
}

fn resolve(arg: ResolveArg) -> anyhow::Result<()> {
    let (root, config) = load(&arg.project)?;
    let settings = config.settings(&root)?;
    let Some(resolver) = settings.resolver() else {
        bail!("no origin configured, or syncing is disabled");
    };

    for url in &arg.urls {
        match resolver.resolve(url) {
            Some(asset) => {
                println!("{url}");
                println!("  key:    {}", asset.cache_key);
                println!("  fetch:  {}", asset.download_url);
                println!("  file:   {}", asset.local_path.display());
                println!("  public: {}", asset.public_path);
            }
            None => println!("{url}\n  not resolvable"),
        }
    }
    Ok(())
}
