//! podkeeper - pod supervisor CLI
//!
//! Starts one pod from `<services-dir>/<identifier>/pod-<identifier>.yaml`,
//! keeps it healthy and shuts it down gracefully. Meant to run as the main
//! process of a `Type=notify` systemd unit.
//!
//! ## Usage
//!
//! ```sh
//! podkeeper run <identifier> [--network <name>] [--log-driver <driver>]
//!                            [--log-level <level>] [--replace | --no-replace]
//!                            [--remove | --keep]
//! ```
//!
//! ## Signals
//!
//! - `SIGINT` / `SIGTERM`: graceful stop
//! - `SIGHUP`: forwarded to the pod as a reload
//! - `SIGALRM`: immediate health check
//! - `SIGUSR1` / `SIGUSR2`: forwarded verbatim to the pod

use clap::{Args, Parser, Subcommand};
use podkeeper::constants::{
    CHECK_INITIAL_DELAY, CHECK_INTERVAL, DEFAULT_ENGINE, DEFAULT_LOG_DRIVER, DEFAULT_NETWORK,
    DEFAULT_SERVICES_DIR,
};
use podkeeper::relay::{install_os_handlers, spawn_check_timer};
use podkeeper::{EngineArgs, PodmanEngine, ReadinessReporter, Supervisor, SupervisorConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// =============================================================================
// CLI Parsing
// =============================================================================

#[derive(Debug, Parser)]
#[command(name = "podkeeper", version, about = "Supervise a single container pod")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start a pod and supervise it until stopped.
    Run(RunArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Pod identifier; names the directory below the services directory.
    identifier: String,

    /// Network for the created pod.
    #[arg(long, default_value = DEFAULT_NETWORK)]
    network: String,

    /// Logging driver for the created pod.
    #[arg(long, default_value = DEFAULT_LOG_DRIVER)]
    log_driver: String,

    /// Log level of the engine's start call (empty: engine default).
    #[arg(long, default_value = "")]
    log_level: String,

    /// Replace a previously running pod with the same name (default).
    #[arg(long, overrides_with = "no_replace")]
    replace: bool,

    /// Do not stop or remove an existing pod with the same name.
    #[arg(long, overrides_with = "replace")]
    no_replace: bool,

    /// Remove the pod after stopping it (default).
    #[arg(long, overrides_with = "keep")]
    remove: bool,

    /// Keep the stopped pod.
    #[arg(long, overrides_with = "remove")]
    keep: bool,

    /// Directory holding one subdirectory per pod identifier.
    #[arg(long, env = "PODKEEPER_SERVICES_DIR", default_value = DEFAULT_SERVICES_DIR)]
    services_dir: PathBuf,

    /// Container engine binary.
    #[arg(long, env = "PODKEEPER_ENGINE", default_value = DEFAULT_ENGINE)]
    engine: PathBuf,

    /// Also run a health check whenever a child process changes state.
    #[arg(long)]
    check_on_child_exit: bool,
}

impl RunArgs {
    fn config(&self) -> SupervisorConfig {
        SupervisorConfig::new(&self.identifier)
            .with_services_dir(&self.services_dir)
            .with_engine_args(EngineArgs {
                network: Some(self.network.clone()),
                log_driver: Some(self.log_driver.clone()),
                log_level: Some(self.log_level.clone()),
            })
            .with_replace(self.replace || !self.no_replace)
            .with_remove(self.remove || !self.keep)
    }
}

// =============================================================================
// Command Implementations
// =============================================================================

async fn cmd_run(args: RunArgs) -> ExitCode {
    let engine = Arc::new(PodmanEngine::with_program(&args.engine));
    let mut supervisor =
        match Supervisor::new(args.config(), engine, ReadinessReporter::from_env()) {
            Ok(s) => s,
            Err(e) => {
                error!(identifier = %args.identifier, error = %e, "invalid pod configuration");
                return ExitCode::FAILURE;
            }
        };

    let relay = supervisor.relay();
    let mut tasks = match install_os_handlers(&relay, args.check_on_child_exit) {
        Ok(tasks) => tasks,
        Err(e) => {
            error!(error = %e, "failed to install signal handlers");
            return ExitCode::FAILURE;
        }
    };
    tasks.push(spawn_check_timer(relay, CHECK_INITIAL_DELAY, CHECK_INTERVAL));

    let result = supervisor.run().await;
    for task in tasks {
        task.abort();
    }

    match result {
        Ok(report) => {
            info!(pod = %supervisor.pod_name(), report = ?report, "supervisor terminated");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(
                pod = %supervisor.pod_name(),
                status = ?e.exit_status(),
                error = %e,
                "failed to start pod"
            );
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// Main
// =============================================================================

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(false)
        .compact()
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Failed to set tracing subscriber");
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Command::Run(args) => cmd_run(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn run_args(argv: &[&str]) -> RunArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Command::Run(args) => args,
        }
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_replace_help_describes_skip() {
        let cli = Cli::command();
        let run = cli.find_subcommand("run").unwrap();
        let help = run
            .get_arguments()
            .find(|a| a.get_id() == "no_replace")
            .and_then(|a| a.get_help())
            .unwrap()
            .to_string();
        assert!(help.contains("Do not stop or remove"));
        assert!(!help.contains("Fail"));
    }

    #[test]
    fn test_defaults_replace_and_remove() {
        let config = run_args(&["podkeeper", "run", "web"]).config();
        assert!(config.replace_existing);
        assert!(config.remove_on_exit);
        assert_eq!(
            config.engine_args.to_args(),
            vec!["--network", "brodge", "--log-driver", "journald"]
        );
    }

    #[test]
    fn test_no_replace_and_keep() {
        let config = run_args(&["podkeeper", "run", "web", "--no-replace", "--keep"]).config();
        assert!(!config.replace_existing);
        assert!(!config.remove_on_exit);
    }

    #[test]
    fn test_last_flag_wins() {
        let config = run_args(&[
            "podkeeper",
            "run",
            "web",
            "--no-replace",
            "--replace",
            "--keep",
            "--remove",
        ])
        .config();
        assert!(config.replace_existing);
        assert!(config.remove_on_exit);
    }
}
