use crate::config::TaskConfig;
use crate::error::{Result, ScanError};
use crate::resolver::ResolvedArtifact;
use flate2::read::GzDecoder;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// A scanner binary ready to run on this host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub executable_path: PathBuf,
}

/// Fetches a URL into a local file.
pub trait Downloader {
    fn download(&self, url: &str, dest: &Path) -> Result<()>;
}

/// Downloader backed by a blocking `reqwest` client.
///
/// With no timeout a stalled download blocks until the pipeline's own job
/// limit stops the task.
pub struct HttpDownloader {
    timeout: Option<Duration>,
}

impl HttpDownloader {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub fn from_config(config: &TaskConfig) -> Self {
        Self::new(config.download_timeout_secs.map(Duration::from_secs))
    }

    fn client(&self) -> reqwest::Result<reqwest::blocking::Client> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("trivy-task/", env!("CARGO_PKG_VERSION"))),
        );

        reqwest::blocking::Client::builder()
            .default_headers(headers)
            // the blocking client otherwise defaults to 30s
            .timeout(self.timeout)
            .build()
    }
}

impl Downloader for HttpDownloader {
    fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let failed = |reason: String| ScanError::Download {
            url: url.to_string(),
            reason,
        };

        let client = self.client().map_err(|e| failed(e.to_string()))?;
        let mut response = client
            .get(url)
            .send()
            .map_err(|e| failed(e.to_string()))?
            .error_for_status()
            .map_err(|e| failed(e.to_string()))?;

        let mut file = File::create(dest).map_err(|e| failed(e.to_string()))?;
        let bytes = response
            .copy_to(&mut file)
            .map_err(|e| failed(e.to_string()))?;
        debug!("Downloaded {} bytes to {}", bytes, dest.display());
        Ok(())
    }
}

/// Downloads and unpacks the scanner into the configured scratch directory.
///
/// Nothing is cached: each call removes the previous binary and installs
/// again.
pub struct Installer<'a> {
    downloader: &'a dyn Downloader,
    config: &'a TaskConfig,
}

impl<'a> Installer<'a> {
    pub fn new(downloader: &'a dyn Downloader, config: &'a TaskConfig) -> Self {
        Self { downloader, config }
    }

    pub fn install(&self, artifact: &ResolvedArtifact) -> Result<Toolchain> {
        let binary = self.config.binary_path();
        let archive = self.config.archive_path();
        remove_stale(&binary);
        remove_stale(&archive);

        std::fs::create_dir_all(&self.config.temp_dir)?;

        info!("Downloading Trivy...");
        self.downloader.download(&artifact.download_url, &archive)?;

        info!("Extracting Trivy...");
        extract_tar_gz(&archive, &self.config.temp_dir)?;
        if !binary.is_file() {
            return Err(ScanError::Extraction {
                archive,
                reason: "archive did not contain a 'trivy' binary".to_string(),
            });
        }

        info!("Setting permissions...");
        make_executable(&binary)?;

        Ok(Toolchain {
            executable_path: binary,
        })
    }
}

/// Best-effort removal; a missing file is fine.
pub(crate) fn remove_stale(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed stale {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove {}: {}", path.display(), e),
    }
}

fn extract_tar_gz(archive: &Path, dest: &Path) -> Result<()> {
    let failed = |reason: String| ScanError::Extraction {
        archive: archive.to_path_buf(),
        reason,
    };

    let file = File::open(archive).map_err(|e| failed(e.to_string()))?;
    let mut tarball = tar::Archive::new(GzDecoder::new(file));
    tarball.unpack(dest).map_err(|e| failed(e.to_string()))
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let permission_error = |source: io::Error| ScanError::Permission {
        path: path.to_path_buf(),
        source,
    };
    let mut perms = std::fs::metadata(path)
        .map_err(permission_error)?
        .permissions();
    perms.set_mode(perms.mode() | 0o755);
    std::fs::set_permissions(path, perms).map_err(permission_error)
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
