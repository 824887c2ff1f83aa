///
/// This module implements the CLI for devops-companion: command parsing,
/// wiring of the concrete collaborators and user-visible output.
///
/// All processing logic (parsers, enrichment, routing, watching) lives in the
/// [`devops-companion-core`] crate. This module only builds a
/// [`ProcessingCoordinator`] over the local vault and calls into it.
///
/// ## How To Use
/// - From a shell: `devops-companion <command> --config devops-companion.yaml`.
/// - From tests: construct a [`Cli`] and call [`run`].
///
/// [`devops-companion-core`]: ../../devops_companion_core/
use crate::load_config::{load_config, CliConfig};
use crate::notify::ConsoleNotifier;
use crate::transport::HttpClient;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use devops_companion_core::contract::{SourceFile, Storage};
use devops_companion_core::enrich::ConnectionStatus;
use devops_companion_core::import::import_files;
use devops_companion_core::pipeline::{PipelineMode, ProcessOutcome, ProcessingCoordinator};
use devops_companion_core::storage::LocalStorage;
use devops_companion_core::watcher;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

type Coordinator = ProcessingCoordinator<LocalStorage, ConsoleNotifier, HttpClient>;

/// Keep markdown summaries of DevOps files up to date.
#[derive(Parser)]
#[clap(
    name = "devops-companion",
    version,
    about = "Parse Docker Compose, Terraform, Kubernetes and Ansible files into markdown documentation"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Process every file under the scan folder once
    Scan {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
    /// Poll the scan folder and process changed files until Ctrl-C
    Watch {
        #[clap(long)]
        config: PathBuf,
    },
    /// Process a single file, given as a path relative to the vault root
    Process {
        #[clap(long)]
        config: PathBuf,
        path: String,
        /// Skip enrichment and file-name routing rules
        #[clap(long)]
        lite: bool,
    },
    /// Copy local files into the scan folder and process them
    Import {
        #[clap(long)]
        config: PathBuf,
        #[clap(required = true)]
        files: Vec<PathBuf>,
    },
    /// Check the configured provider's API key
    TestConnection {
        #[clap(long)]
        config: PathBuf,
    },
}

fn coordinator(config: CliConfig) -> Result<Coordinator> {
    let storage = LocalStorage::new(config.vault_root);
    let transport = HttpClient::new().context("Failed to build HTTP client")?;
    Ok(ProcessingCoordinator::new(
        Arc::new(storage),
        Arc::new(ConsoleNotifier),
        transport,
        config.companion,
    ))
}

/// Async CLI entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Scan { config } => {
            let coordinator = coordinator(load_config(config)?)?;
            tracing::info!(command = "scan", "Starting manual scan");
            let report = coordinator.scan_all().await;
            for (path, reason) in &report.failed {
                println!("failed: {path}: {reason}");
            }
            tracing::info!(command = "scan", ?report, "Scan finished");
            Ok(())
        }
        Commands::Watch { config } => {
            let config = load_config(config)?;
            if !config.companion.watcher.enabled {
                bail!("Watcher is disabled in the configuration (watcher.enabled: false)");
            }
            let period = Duration::from_secs(config.companion.watch_interval_secs.max(1));
            let handle = watcher::spawn(Arc::new(coordinator(config)?), period);
            println!("Watching. Press Ctrl-C to stop.");
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
            handle.stop();
            println!("Watcher stopped.");
            Ok(())
        }
        Commands::Process { config, path, lite } => {
            let coordinator = coordinator(load_config(config)?)?;
            if !coordinator.storage().exists(&path).await? {
                bail!("No such file in vault: {path}");
            }
            let mode = if lite { PipelineMode::Lite } else { PipelineMode::Full };
            match coordinator.process(&SourceFile::from_path(&path, 0), mode).await {
                ProcessOutcome::Written { output_path, action } => {
                    println!("{action:?} {output_path}");
                    Ok(())
                }
                ProcessOutcome::Skipped => {
                    println!("Skipped {path}: already being processed");
                    Ok(())
                }
                ProcessOutcome::Failed { reason } => bail!("Processing {path} failed: {reason}"),
            }
        }
        Commands::Import { config, files } => {
            let coordinator = coordinator(load_config(config)?)?;
            let report = import_files(&coordinator, &files).await?;
            tracing::info!(
                command = "import",
                imported = report.imported.len(),
                failed = report.failed.len(),
                "Import finished"
            );
            if !report.failed.is_empty() {
                bail!("{} of {} files could not be imported", report.failed.len(), files.len());
            }
            Ok(())
        }
        Commands::TestConnection { config } => {
            let coordinator = coordinator(load_config(config)?)?;
            let status = coordinator.gateway().check_connection().await;
            tracing::info!(command = "test-connection", ?status, "Connection test finished");
            match status {
                ConnectionStatus::Valid(_) => {
                    println!("{status}");
                    Ok(())
                }
                other => bail!("{other}"),
            }
        }
    }
}
