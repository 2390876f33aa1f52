use anyhow::{bail, Context, Result};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

use procmem::config::{validate_config, Config, ConfigLoader, DEFAULT_CONFIG_FILE};
use procmem::{invoke, MemoryBackend, MemoryError, Operation, ProcessMemoryService, SimulatedBackend};

const USAGE: &str = "usage: procmem [--config PATH] [--simulated] <operation> [args...]";

#[derive(Debug, Default)]
struct CliArgs {
    config: Option<PathBuf>,
    simulated: bool,
    operation: String,
    args: Vec<Value>,
}

impl CliArgs {
    fn parse(mut raw: impl Iterator<Item = String>) -> Result<Self> {
        let mut cli = CliArgs::default();
        let mut operation = None;

        while let Some(arg) = raw.next() {
            if operation.is_some() {
                cli.args.push(parse_argument(&arg));
                continue;
            }
            match arg.as_str() {
                "--config" => {
                    let path = raw.next().context("--config requires a path")?;
                    cli.config = Some(PathBuf::from(path));
                }
                "--simulated" => cli.simulated = true,
                "-h" | "--help" => {
                    let names: Vec<String> = Operation::ALL
                        .iter()
                        .map(|op| format!("  {}({})", op, op.signature()))
                        .collect();
                    bail!("{}\n\noperations:\n{}", USAGE, names.join("\n"));
                }
                flag if flag.starts_with("--") => bail!("unknown option {}\n{}", flag, USAGE),
                _ => operation = Some(arg),
            }
        }

        cli.operation = operation.context(USAGE)?;
        Ok(cli)
    }
}

/// Arguments are JSON when they parse as JSON, plain strings otherwise
fn parse_argument(arg: &str) -> Value {
    serde_json::from_str(arg).unwrap_or_else(|_| Value::String(arg.to_string()))
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let config = match path {
        Some(path) => ConfigLoader::new(path)
            .load()
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => ConfigLoader::new(DEFAULT_CONFIG_FILE).load_or_default()?,
    };
    Ok(config)
}

/// RUST_LOG overrides the configured level; an unparsable level falls back
/// to `info` and is reported by validation
fn subscriber<W>(level: &str, writer: W) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(writer)
        .finish()
}

fn init_logging(level: &str) -> Result<()> {
    tracing::subscriber::set_global_default(subscriber(level, std::io::stderr))?;
    Ok(())
}

fn run<B: MemoryBackend>(backend: B, config: &Config, op: Operation, args: &[Value]) -> Result<Value, MemoryError> {
    let service = ProcessMemoryService::with_config(backend, config);
    invoke(&service, op, args)
}

/// A throwaway address space with one process, for trying calls without
/// touching the system
fn simulated_backend() -> Result<SimulatedBackend> {
    let backend = SimulatedBackend::new();
    let pid = backend.spawn("simulated.exe");
    backend.add_module(pid, "simulated.exe", "C:\\simulated\\simulated.exe", 0x4000)?;
    backend.add_module(pid, "kernel32.dll", "C:\\Windows\\System32\\kernel32.dll", 0x2000)?;
    info!(pid, "simulated process ready");
    Ok(backend)
}

#[cfg(windows)]
fn run_native(config: &Config, op: Operation, args: &[Value]) -> Result<Result<Value, MemoryError>> {
    Ok(run(procmem::backend::WindowsBackend::new(), config, op, args))
}

#[cfg(not(windows))]
fn run_native(_config: &Config, _op: Operation, _args: &[Value]) -> Result<Result<Value, MemoryError>> {
    bail!("the native backend requires Windows; pass --simulated to use the in-memory backend")
}

fn main() -> Result<ExitCode> {
    let cli = CliArgs::parse(std::env::args().skip(1))?;
    let config = load_config(cli.config.as_ref())?;
    // Validation warnings need the subscriber in place
    init_logging(&config.logging.level)?;
    validate_config(&config)?;

    info!("procmem v{}", procmem::core::VERSION);
    debug!(operation = %cli.operation, args = ?cli.args, simulated = cli.simulated, "dispatching");

    let outcome = match cli.operation.parse::<Operation>() {
        Ok(op) if cli.simulated => run(simulated_backend()?, &config, op, &cli.args),
        Ok(op) => run_native(&config, op, &cli.args)?,
        Err(err) => Err(err),
    };

    match outcome {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            let report = json!({ "error": err.code(), "message": err.to_string() });
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(ExitCode::FAILURE)
        }
    }
}
