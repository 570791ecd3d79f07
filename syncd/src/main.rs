//! Command-line front-end wiring configuration, logging and the concrete
//! facades into a [`SyncEngine`] and invoking its two entry points.

use std::{path::PathBuf, process::ExitCode};

use archive_dak::DakRestFacade;
use archive_repo::{FilesystemRepositoryFacade, HttpRepositoryFacade};
use clap::{Parser, Subcommand};
use color_eyre::{eyre::Context, Result};
use sync_engine::{PackageName, SyncEngine};
use tracing::{error, info, metadata::LevelFilter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{prelude::*, EnvFilter};

mod config;

#[derive(Subcommand, Debug)]
enum Command {
    /// Sync the named source packages (and their binaries) in one component.
    SyncPackages {
        component: String,
        names: Vec<String>,
        /// Bypass the target-version-greater check; never bypasses the
        /// modified-fork check.
        #[clap(long)]
        force: bool,
    },
    /// Sync every source package across all components of the target suite,
    /// skipping locally modified forks.
    Autosync,
}

#[derive(Parser, Debug)]
struct Opts {
    #[clap(subcommand)]
    command: Command,
    /// Path to the TOML configuration file.
    #[clap(short = 'c', long, env = "SYNCD_CONFIG")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::registry()
        .with(ErrorLayer::default())
        .with(
            tracing_subscriber::fmt::layer().with_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(LevelFilter::INFO.to_string())),
            ),
        )
        .init();
    color_eyre::install()?;

    let opts = Opts::parse();
    let file_config = config::load(&opts.config).wrap_err("failed to load configuration")?;

    let source = HttpRepositoryFacade::new(
        file_config.engine.source_repo_url.clone(),
        file_config.engine.source_suite_name.clone(),
        file_config.cache_dir.clone(),
    );
    let target = FilesystemRepositoryFacade::new(
        file_config.archive_root_path.clone(),
        file_config.engine.target_suite.name.clone(),
    );
    let dak = DakRestFacade::new(file_config.dak_api_url.clone(), file_config.project_name.clone());

    let engine = SyncEngine::new(source, target, dak, file_config.engine);

    let ok = match opts.command {
        Command::SyncPackages { component, names, force } => {
            let names: Vec<PackageName> = names.into_iter().map(PackageName::from).collect();
            engine.sync_packages(&component, &names, force).await?
        }
        Command::Autosync => engine.autosync().await?,
    };

    if ok {
        info!("sync completed successfully");
        Ok(ExitCode::SUCCESS)
    } else {
        error!("sync failed");
        Ok(ExitCode::FAILURE)
    }
}
