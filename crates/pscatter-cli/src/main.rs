//! `pscatter`: operator entry point for the coordinator, worker, one-shot
//! command, and combined single-process roles (spec.md §6.3).

mod command_client;
mod error;
mod handler;

use std::path::PathBuf;
use std::sync::Arc;

use clap::error::ErrorKind;
use clap::{Parser, Subcommand};

use pscatter_config::logging::{init_logging, LogLevel};
use pscatter_config::{log_cli_info, CoordinatorConfig, EngineConfig, SinkConfig, WorkerConfig};
use pscatter_coordinator::{Coordinator, NoopLauncher};
use pscatter_engine::ScanEngine;
use pscatter_proto::{Command as ProtoCommand, Connection, Listener, ProtoError};
use pscatter_sink::{NullSink, SinkForwarderPool};
use pscatter_worker::Worker;

use crate::command_client::CommandClient;
use crate::error::CliError;
use crate::handler::SinkFileHandler;

#[derive(Parser)]
#[command(name = "pscatter")]
#[command(version, about = "Distributed filesystem metadata scanner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    role: Role,
}

#[derive(Subcommand)]
enum Role {
    /// Run the coordinator: listen for workers, distribute scan paths.
    Server {
        #[arg(long, default_value = "0.0.0.0:7932")]
        listen: String,
        #[arg(long = "scan-path", value_name = "PATH")]
        scan_paths: Vec<PathBuf>,
        #[arg(long)]
        stats_interval: Option<f64>,
    },
    /// Run a worker: connect to a coordinator and scan whatever it assigns.
    Client {
        #[arg(long, default_value = "127.0.0.1:7932")]
        connect: String,
        #[arg(long)]
        threads: Option<usize>,
        /// Path to a sink credential file. Reading it is the whole of this
        /// rewrite's sink-credential handling (spec.md §6.3's exit-code-3
        /// contract); no credential-consuming sink backend is built here.
        #[arg(long)]
        sink: Option<PathBuf>,
        #[arg(long)]
        ulimit_memory: Option<u64>,
    },
    /// Send a single operator command to a running coordinator.
    Command {
        #[arg(long, default_value = "127.0.0.1:7932")]
        connect: String,
        #[arg(value_enum)]
        cmd: CommandArg,
    },
    /// Launch a coordinator and one in-process worker together.
    Auto {
        #[arg(long, default_value = "127.0.0.1:7932")]
        listen: String,
        #[arg(long = "scan-path", value_name = "PATH")]
        scan_paths: Vec<PathBuf>,
        #[arg(long)]
        threads: Option<usize>,
        #[arg(long)]
        sink: Option<PathBuf>,
    },
}

#[derive(Clone, clap::ValueEnum)]
enum CommandArg {
    Quit,
    Dumpstate,
    Toggledebug,
}

impl From<CommandArg> for ProtoCommand {
    fn from(c: CommandArg) -> Self {
        match c {
            CommandArg::Quit => ProtoCommand::Quit,
            CommandArg::Dumpstate => ProtoCommand::DumpState,
            CommandArg::Toggledebug => ProtoCommand::ToggleDebug,
        }
    }
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            e.print().ok();
            // spec.md §6.3: `1` bad CLI. `--help`/`--version` route through
            // the same `Err` path in clap but are not failures.
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            std::process::exit(code);
        }
    };

    init_logging(LogLevel::Info);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start async runtime: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(cli)) {
        eprintln!("{e}");
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.role {
        Role::Server { listen, scan_paths, stats_interval } => {
            run_server(listen, scan_paths, stats_interval).await
        }
        Role::Client { connect, threads, sink, ulimit_memory } => {
            run_client(connect, threads, sink, ulimit_memory).await
        }
        Role::Command { connect, cmd } => run_command(connect, cmd.into()).await,
        Role::Auto { listen, scan_paths, threads, sink } => {
            run_auto(listen, scan_paths, threads, sink).await
        }
    }
}

/// Reading the credential file is this rewrite's entire sink-credential
/// story (Open Question decision: no credential-consuming sink backend is
/// built, per DESIGN.md); this exists purely to honor spec.md §6.3's
/// exit-code-3 contract for an unreadable file.
fn check_sink_credentials(path: &Option<PathBuf>) -> Result<(), CliError> {
    if let Some(path) = path {
        std::fs::read_to_string(path).map_err(|source| CliError::CredentialFile {
            path: path.clone(),
            source,
        })?;
    }
    Ok(())
}

#[cfg(unix)]
fn apply_ulimit_memory(bytes: u64) {
    let limit = libc::rlimit {
        rlim_cur: bytes as libc::rlim_t,
        rlim_max: bytes as libc::rlim_t,
    };
    // SAFETY: `limit` is a plain value struct, valid for the duration of
    // the call; a failed setrlimit only leaves the existing limit in place.
    let rc = unsafe { libc::setrlimit(libc::RLIMIT_AS, &limit) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        tracing::warn!(component = "CLI", bytes, error = %err, "failed to apply memory ulimit");
    }
}

#[cfg(not(unix))]
fn apply_ulimit_memory(_bytes: u64) {}

async fn run_server(
    listen: String,
    scan_paths: Vec<PathBuf>,
    stats_interval: Option<f64>,
) -> Result<(), CliError> {
    let mut config = CoordinatorConfig::default();
    if let Some(secs) = stats_interval {
        config.stats_interval_secs = secs;
    }
    let initial_work = scan_paths
        .into_iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();

    let listener = Listener::bind(listen.as_str()).await?;
    log_cli_info!("coordinator listening", addr = listen.as_str());

    Coordinator::new(config, Box::new(NoopLauncher), Vec::new(), initial_work)
        .run(listener)
        .await?;
    Ok(())
}

async fn run_client(
    connect: String,
    threads: Option<usize>,
    sink: Option<PathBuf>,
    ulimit_memory: Option<u64>,
) -> Result<(), CliError> {
    check_sink_credentials(&sink)?;
    if let Some(bytes) = ulimit_memory {
        apply_ulimit_memory(bytes);
    }

    let mut engine_config = EngineConfig::default();
    if let Some(t) = threads {
        engine_config.scanner_threads = t;
    }

    let sink_pool = SinkForwarderPool::new(Arc::new(NullSink), SinkConfig::default());
    let handler = Arc::new(SinkFileHandler::new(
        Arc::clone(&sink_pool),
        tokio::runtime::Handle::current(),
    ));
    let engine = ScanEngine::new(handler, engine_config);

    let connection = Connection::connect(connect.as_str()).await?;
    log_cli_info!("worker connecting", addr = connect.as_str());
    Worker::new(connection, engine, sink_pool, WorkerConfig::default())
        .run()
        .await?;
    Ok(())
}

async fn run_command(connect: String, cmd: ProtoCommand) -> Result<(), CliError> {
    let client = CommandClient::connect(connect.as_str()).await?;
    client.send_command(cmd).await?;
    Ok(())
}

async fn run_auto(
    listen: String,
    scan_paths: Vec<PathBuf>,
    threads: Option<usize>,
    sink: Option<PathBuf>,
) -> Result<(), CliError> {
    check_sink_credentials(&sink)?;

    let initial_work = scan_paths
        .into_iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();

    let listener = Listener::bind(listen.as_str()).await?;
    let addr = listener.local_addr().map_err(ProtoError::Io)?;
    log_cli_info!("auto mode: coordinator listening", addr = format!("{addr}"));

    let coordinator_config = CoordinatorConfig::default();
    let coordinator_handle = tokio::spawn(async move {
        Coordinator::new(coordinator_config, Box::new(NoopLauncher), Vec::new(), initial_work)
            .run(listener)
            .await
    });

    let mut engine_config = EngineConfig::default();
    if let Some(t) = threads {
        engine_config.scanner_threads = t;
    }
    let sink_pool = SinkForwarderPool::new(Arc::new(NullSink), SinkConfig::default());
    let handler = Arc::new(SinkFileHandler::new(
        Arc::clone(&sink_pool),
        tokio::runtime::Handle::current(),
    ));
    let engine = ScanEngine::new(handler, engine_config);
    let connection = Connection::connect(addr).await?;
    Worker::new(connection, engine, sink_pool, WorkerConfig::default())
        .run()
        .await?;

    coordinator_handle
        .await
        .map_err(|e| CliError::Internal(format!("coordinator task panicked: {e}")))??;
    Ok(())
}
