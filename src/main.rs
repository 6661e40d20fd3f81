// ABOUTME: Entry point for the pulley CLI application.
// ABOUTME: Parses arguments, wires the runtime client, and maps outcomes to exit codes.

mod cli;

use clap::Parser;
use cli::{Cli, Commands, PullArgs};
use pulley::config::{self, CONFIG_FILENAME, Config, read_image_list};
use pulley::error::{Error, Result, SetupError};
use pulley::output::Output;
use pulley::progress::PullSummary;
use pulley::pull::CancelSignal;
use pulley::runtime::{BollardRegistry, RuntimeError, RuntimeErrorKind, resolve_endpoint};
use pulley::{Orchestrator, parse_references};
use std::env;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing_subscriber::EnvFilter;

/// Some images failed or were abandoned.
const EXIT_PULL_FAILED: i32 = 1;
/// The run could not start.
const EXIT_SETUP: i32 = 2;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbose flag
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            if let Error::Runtime(runtime) = &e {
                tracing::debug!(kind = ?runtime.kind(), endpoint = ?runtime.endpoint(), "runtime unavailable");
                if runtime.kind() == RuntimeErrorKind::NoRuntimeFound {
                    eprintln!("Hint: pass --runtime/--socket or set DOCKER_HOST");
                }
            }
            EXIT_SETUP
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Init { force } => {
            let cwd = env::current_dir()?;
            config::init_config(&cwd, force)?;
            println!("Created {}", CONFIG_FILENAME);
            Ok(0)
        }
        Commands::Pull(args) => pull(args).await,
    }
}

/// Load an explicit config file, or discover one; no file means defaults.
fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => match Config::discover(&env::current_dir()?) {
            Err(Error::ConfigNotFound(_)) => Ok(Config::default()),
            other => other,
        },
    }
}

async fn pull(args: PullArgs) -> Result<i32> {
    let mut output = Output::new(args.output_mode());
    let config = load_config(args.config.as_deref())?;

    let pull_config = args.pull_config(config.pull.clone());
    pull_config.validate()?;

    let mut references = parse_references(&args.images)?;
    if let Some(file) = &args.file {
        references.extend(read_image_list(file)?);
    }
    if references.is_empty() {
        references = config.images.clone();
    }
    if references.is_empty() {
        return Err(SetupError::EmptyInput.into());
    }

    let runtime_config = args.runtime_config(config.runtime.clone());
    let docker_host = env::var("DOCKER_HOST").ok();
    let endpoint =
        resolve_endpoint(&runtime_config, docker_host.as_deref()).map_err(RuntimeError::from)?;
    let registry = BollardRegistry::connect_endpoint(&endpoint)?;
    registry.ping().await?;
    tracing::debug!(runtime = %registry.runtime_type(), ?endpoint, "connected to runtime");
    output.progress(&format!(
        "Using {} with {} concurrent pull(s)",
        registry.runtime_type(),
        pull_config.concurrency
    ));

    let orchestrator = Orchestrator::new(Arc::new(registry), pull_config);
    let mut events = orchestrator.progress().subscribe();

    let cancel = CancelSignal::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("Interrupted, cancelling remaining pulls...");
                cancel.cancel();
            }
        })
    };

    output.start_timer();
    let run = orchestrator.run_until(references, cancel);
    tokio::pin!(run);

    let results = loop {
        tokio::select! {
            result = &mut run => break result?,
            event = events.recv() => match event {
                Ok(event) => output.event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "progress display fell behind");
                }
                Err(RecvError::Closed) => break (&mut run).await?,
            },
        }
    };

    loop {
        match events.try_recv() {
            Ok(event) => output.event(&event),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    interrupt.abort();

    let summary = orchestrator
        .summary()
        .unwrap_or_else(|| PullSummary::from_results(results));
    output.summary(&summary);

    Ok(if summary.all_succeeded() {
        0
    } else {
        EXIT_PULL_FAILED
    })
}
