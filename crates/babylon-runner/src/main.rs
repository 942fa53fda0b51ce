//! Babylon extension runner.
//!
//! Hosts the demo driver, actor and reporters behind one extension server.

mod extensions;

use std::path::PathBuf;

use anyhow::{Context, Result};
use babylon_core::config::{env_vars, resolve_secret};
use babylon_extension::{Extension, ExtensionServer, ServerConfig};
use clap::{Parser, Subcommand, ValueEnum};

use extensions::{ExampleActor, ExampleDriver, FileReporter, LiveLogReporter, FALLBACK_SECRET};

#[derive(Parser, Debug)]
#[command(name = "babylon-runner")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Extension to host.
    #[command(subcommand)]
    command: Command,

    /// TOML config file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Port to listen on.
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Hostname advertised to the orchestrator.
    #[arg(long, global = true)]
    hostname: Option<String>,

    /// Orchestrator host.
    #[arg(long, global = true)]
    orchestrator_host: Option<String>,

    /// Orchestrator port.
    #[arg(long, global = true)]
    orchestrator_port: Option<u16>,

    /// Self-register with the orchestrator on startup.
    #[arg(long, global = true)]
    register: bool,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Host the example driver.
    Driver,
    /// Host the example actor.
    Actor,
    /// Host a reporter.
    Reporter {
        /// Reporter flavour.
        #[arg(short, long, value_enum, default_value_t = ReporterKind::File)]
        kind: ReporterKind,
        /// Directory for log files.
        #[arg(long, default_value = "logs")]
        log_dir: PathBuf,
    },
    /// Host every demo extension in one process.
    All {
        /// Directory for log files.
        #[arg(long, default_value = "logs")]
        log_dir: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ReporterKind {
    /// Full session log written at session end.
    File,
    /// Every event appended as it arrives.
    Live,
}

fn init_logging(verbose: bool) {
    let json_logging = std::env::var(env_vars::LOG_JSON)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    let default_directive = if verbose { "babylon=debug" } else { "babylon=info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new(default_directive)
                .add_directive(tracing::Level::WARN.into())
        });

    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_thread_ids(false)
            .compact()
            .init();
    }
}

fn load_config(args: &Args) -> Result<ServerConfig> {
    let mut config = ServerConfig::load(args.config.as_deref()).context("Failed to load config")?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(hostname) = &args.hostname {
        config.hostname = hostname.clone();
    }
    if let Some(host) = &args.orchestrator_host {
        config.orchestrator.host = host.clone();
    }
    if let Some(port) = args.orchestrator_port {
        config.orchestrator.port = port;
    }
    Ok(config)
}

fn build_server(command: &Command, secret: &str, register: bool) -> ExtensionServer {
    let file_reporter = |dir: &PathBuf| FileReporter::new(dir.clone(), secret, register);

    match command {
        Command::Driver => ExtensionServer::for_driver(ExampleDriver::new(secret, register)),
        Command::Actor => ExtensionServer::for_actor(ExampleActor::new(secret, register)),
        Command::Reporter { kind: ReporterKind::File, log_dir } => {
            ExtensionServer::for_reporter(file_reporter(log_dir))
        }
        Command::Reporter { kind: ReporterKind::Live, log_dir } => {
            ExtensionServer::for_reporter(LiveLogReporter::new(log_dir.clone(), secret, register))
        }
        Command::All { log_dir } => ExtensionServer::new()
            .with_extension(Extension::driver(ExampleDriver::new(secret, register)))
            .with_extension(Extension::actor(ExampleActor::new(secret, register)))
            .with_extension(Extension::reporter(file_reporter(log_dir)))
            .with_extension(Extension::reporter(LiveLogReporter::new(
                log_dir.clone(),
                secret,
                register,
            ))),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = load_config(&args)?;
    let secret = resolve_secret(FALLBACK_SECRET);

    tracing::info!(
        category = "runner",
        command = ?args.command,
        port = config.port,
        orchestrator = %config.orchestrator.address(),
        register = args.register,
        "Starting Babylon extension runner"
    );

    build_server(&args.command, &secret, args.register)
        .with_config(config)
        .run()
        .await?;
    Ok(())
}
