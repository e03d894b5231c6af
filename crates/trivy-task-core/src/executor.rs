use crate::error::Result;
use crate::host::ProcessRunner;
use crate::invocation::Invocation;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Exit code of one scanner run and where it wrote its report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanOutcome {
    pub exit_code: i32,
    pub output_path: PathBuf,
}

impl ScanOutcome {
    /// Zero means nothing at or above the threshold. Anything else is either
    /// findings or a scanner failure; the two are not told apart.
    pub fn is_clean(&self) -> bool {
        self.exit_code == 0
    }
}

/// Run the scanner to completion and record its exit code.
pub fn execute(
    runner: &dyn ProcessRunner,
    invocation: &Invocation,
    output_path: &Path,
) -> Result<ScanOutcome> {
    info!("Running Trivy...");
    debug!("{}", invocation);

    let exit_code = runner.run(invocation)?;
    debug!("Trivy exited with code {}", exit_code);

    Ok(ScanOutcome {
        exit_code,
        output_path: output_path.to_path_buf(),
    })
}
