use crate::config::TaskConfig;
use crate::error::{Result, ScanError};
use crate::installer::Toolchain;
use crate::request::ScanRequest;
use crate::resolver::strip_v;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Categories of analysis requested from the scanner.
pub const SECURITY_CHECKS: &str = "vuln,config,secret";

/// A program plus its argument vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// How the scanner gets run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionMode {
    Local(Toolchain),
    Container,
}

/// Host directories mounted into the scanner container.
///
/// The home directory only matters in container mode, so a host without one
/// can still run the local binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEnvironment {
    pub home_dir: Option<PathBuf>,
    pub working_dir: PathBuf,
}

impl HostEnvironment {
    pub fn new(home_dir: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            home_dir: Some(home_dir.into()),
            working_dir: working_dir.into(),
        }
    }

    pub fn without_home(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            home_dir: None,
            working_dir: working_dir.into(),
        }
    }

    /// Read `$HOME` (unset or empty means none) and the process working
    /// directory.
    pub fn detect() -> Result<Self> {
        let home_dir = std::env::var_os("HOME")
            .filter(|home| !home.is_empty())
            .map(PathBuf::from);
        Ok(Self {
            home_dir,
            working_dir: std::env::current_dir()?,
        })
    }

    /// Home directory, required for mounting registry credentials.
    pub fn require_home(&self) -> Result<&Path> {
        self.home_dir.as_deref().ok_or(ScanError::MissingHome)
    }
}

/// Scanner arguments shared by both execution modes.
///
/// The order is fixed so logged command lines are reproducible.
pub fn scanner_args(request: &ScanRequest, output_path: &Path) -> Vec<String> {
    let mut args = Vec::with_capacity(11);
    if request.debug {
        args.push("--debug".to_string());
    }
    args.push(request.target.scan_type().to_string());
    args.extend([
        "--exit-code".to_string(),
        request.exit_code_threshold.clone(),
        "--format".to_string(),
        "json".to_string(),
        "--output".to_string(),
        output_path.to_string_lossy().into_owned(),
        "--security-checks".to_string(),
        SECURITY_CHECKS.to_string(),
    ]);
    args.push(request.target.value().to_string());
    args
}

/// `run` arguments for the container runtime, up to and including the image.
///
/// Mounts registry credentials, the scratch directory (so the output file is
/// visible on the host), and the working directory as `/src`. Without a home
/// directory the credentials mount is left out.
fn container_args(request: &ScanRequest, host: &HostEnvironment, config: &TaskConfig) -> Vec<String> {
    let temp_dir = config.temp_dir.to_string_lossy();

    let mut args = vec!["run".to_string(), "--rm".to_string()];
    if let Some(home) = &host.home_dir {
        let docker_config = home.join(".docker").join("config.json");
        args.push("-v".to_string());
        args.push(format!("{}:/root/.docker/config.json", docker_config.display()));
    }
    args.extend([
        "-v".to_string(),
        format!("{temp_dir}:{temp_dir}"),
        "-v".to_string(),
        format!("{}:/src", host.working_dir.display()),
        "--workdir".to_string(),
        "/src".to_string(),
        format!(
            "{}:{}",
            config.container_image,
            strip_v(&request.requested_version)
        ),
    ]);
    args
}

/// Assemble the full command line for one scan.
pub fn build(
    mode: &ExecutionMode,
    request: &ScanRequest,
    output_path: &Path,
    host: &HostEnvironment,
    config: &TaskConfig,
) -> Invocation {
    match mode {
        ExecutionMode::Local(toolchain) => Invocation::new(
            toolchain.executable_path.to_string_lossy().into_owned(),
            scanner_args(request, output_path),
        ),
        ExecutionMode::Container => {
            let mut args = container_args(request, host, config);
            args.extend(scanner_args(request, output_path));
            Invocation::new(config.container_runtime.clone(), args)
        }
    }
}
