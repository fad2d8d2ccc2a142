use std::io::Read;
use std::path::{Path, PathBuf};

use accelbench_engine::{Engine, Response};
use anyhow::{Context, Result};
use argh::FromArgs;

use crate::config::Config;
use crate::observability;
use crate::s3_compatible::S3CompatibleClient;

/// Benchmark and validate an object store accelerator against its origin.
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    pub config: Option<PathBuf>,

    #[argh(subcommand)]
    pub command: Command,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Command {
    Run(RunCommand),
    Version(VersionCommand),
}

/// execute a single request and print the response as JSON
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "run")]
struct RunCommand {
    /// path to the JSON request, read from stdin if omitted
    #[argh(option, short = 'r')]
    pub request: Option<PathBuf>,
}

/// print the accelbench version
#[derive(Default, Debug, FromArgs)]
#[argh(subcommand, name = "version")]
struct VersionCommand {}

/// Bootstrap the runtime and execute the CLI command.
pub fn execute() -> Result<()> {
    let args: Args = argh::from_env();

    let command = match args.command {
        Command::Run(command) => command,
        // Special switch to just print the version and exit.
        Command::Version(VersionCommand {}) => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
    };

    let config = Config::load(args.config.as_deref())?;

    // Sentry should be initialized before creating the async runtime.
    let _sentry_guard = observability::init_sentry(&config);

    // Calls are issued strictly one after another, a single thread suffices.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let _runtime_guard = runtime.enter();

    observability::init_tracing(&config);
    tracing::debug!(?config);

    let request = read_request(command.request.as_deref())?;
    let engine = build_engine(&config)?;
    let response = runtime.block_on(engine.handle_slice(&request));

    println!("{}", serde_json::to_string_pretty(&response)?);

    match response {
        Response::Error(payload) => anyhow::bail!("request failed: {}", payload.error_message),
        _ => Ok(()),
    }
}

/// Creates an engine talking to the configured origin and accelerator.
pub fn build_engine(config: &Config) -> Result<Engine> {
    let origin = S3CompatibleClient::new("origin", &config.origin)
        .context("failed to configure origin client")?;
    let accelerator = S3CompatibleClient::new("accelerator", &config.accelerator)
        .context("failed to configure accelerator client")?;

    Ok(Engine::new(Box::new(origin), Box::new(accelerator)))
}

fn read_request(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(path) => std::fs::read(path)
            .with_context(|| format!("failed to read request from {}", path.display())),
        None => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .context("failed to read request from stdin")?;
            Ok(buf)
        }
    }
}
