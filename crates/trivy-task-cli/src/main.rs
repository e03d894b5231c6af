mod display;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;
use trivy_task_core::config::load_config_or_default;
use trivy_task_core::host::{ConsoleReporter, EnvInputs, InputSource, MapInputs, TaskReporter};
use trivy_task_core::platform::{HostArch, HostOs};
use trivy_task_core::{resolver, HostEnvironment, Orchestrator, TaskConfig, TaskResult};

#[derive(Parser)]
#[command(
    name = "trivy-task",
    version,
    about = "trivy-task — run the Trivy security scanner as a CI pipeline step",
    long_about = "Install (or containerize) Trivy, scan a filesystem path or container image for \
                  vulnerabilities, misconfigurations and secrets, and publish the verdict and the \
                  JSON report back to the pipeline."
)]
struct Cli {
    /// TOML config file (falls back to $TRIVY_TASK_CONFIG, then built-in defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan with inputs given as flags
    Run {
        /// Filesystem path to scan
        #[arg(long)]
        path: Option<String>,

        /// Container image reference to scan
        #[arg(long)]
        image: Option<String>,

        /// Trivy version to use, or "latest" for the pinned default
        #[arg(long, default_value = "latest")]
        version: String,

        /// Run Trivy through the container runtime instead of a local binary
        #[arg(long)]
        docker: bool,

        /// Pass --debug to Trivy
        #[arg(long)]
        debug: bool,

        /// Exit code Trivy uses when it finds problems
        #[arg(long)]
        exit_code: Option<String>,

        /// Summary format after the pipeline commands (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Scan with inputs read from the pipeline agent's INPUT_* variables
    Task {
        /// Summary format after the pipeline commands (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show which release archive would be downloaded
    Resolve {
        /// Trivy version, or "latest"
        #[arg(long, default_value = "latest")]
        version: String,

        /// Architecture to resolve for (defaults to this host)
        #[arg(long)]
        arch: Option<String>,

        /// Operating system to resolve for (defaults to this host)
        #[arg(long)]
        os: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Run {
            path,
            image,
            version,
            docker,
            debug,
            exit_code,
            format,
        } => {
            let mut inputs = MapInputs::new()
                .with("version", version)
                .with("docker", docker.to_string())
                .with("debug", debug.to_string());
            if let Some(path) = path {
                inputs.set("path", path);
            }
            if let Some(image) = image {
                inputs.set("image", image);
            }
            if let Some(exit_code) = exit_code {
                inputs.set("exitCode", exit_code);
            }
            cmd_scan(config_path, &inputs, &format)
        }
        Commands::Task { format } => cmd_scan(config_path, &EnvInputs, &format),
        Commands::Resolve {
            version,
            arch,
            os,
            format,
        } => {
            let config =
                load_config_or_default(config_path).context("Failed to load configuration")?;
            cmd_resolve(&config, &version, arch.as_deref(), os.as_deref(), &format)
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let mut filter = EnvFilter::builder()
        .with_default_directive(default.into())
        .from_env_lossy();
    // --verbose also overrides a quieter RUST_LOG default
    if verbose {
        filter = filter.add_directive(LevelFilter::DEBUG.into());
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

/// Run one scan task. Setup failures are published to the pipeline like any
/// other failure, so the agent always sees a verdict.
fn cmd_scan(
    config_path: Option<&Path>,
    inputs: &dyn InputSource,
    format: &str,
) -> Result<ExitCode> {
    let mut reporter = ConsoleReporter::stdout();

    let setup = load_config_or_default(config_path)
        .and_then(|config| HostEnvironment::detect().map(|host| (config, host)));
    let (config, host) = match setup {
        Ok(setup) => setup,
        Err(e) => {
            error!("Task setup failed: {}", e);
            reporter
                .set_result(&TaskResult::failed(e.to_string()))
                .context("Failed to publish task result")?;
            return Ok(ExitCode::FAILURE);
        }
    };

    let mut orchestrator = Orchestrator::new(config, host);
    let report = orchestrator
        .run(inputs, &mut reporter)
        .context("Failed to publish task result")?;

    match format {
        "json" => {
            let json = serde_json::to_string_pretty(&report)?;
            println!("{}", json);
        }
        _ => display::print_run_summary(&report),
    }

    if report.result.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn cmd_resolve(
    config: &TaskConfig,
    version: &str,
    arch: Option<&str>,
    os: Option<&str>,
    format: &str,
) -> Result<ExitCode> {
    let arch = arch.map(HostArch::from_name).unwrap_or_else(HostArch::current);
    let os = os.map(HostOs::from_name).unwrap_or_else(HostOs::current);

    let artifact = resolver::resolve(version, &os, &arch, config)?;

    match format {
        "json" => {
            let json = serde_json::to_string_pretty(&artifact)?;
            println!("{}", json);
        }
        _ => display::print_artifact(&artifact),
    }

    Ok(ExitCode::SUCCESS)
}
