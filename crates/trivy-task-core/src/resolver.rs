use crate::config::TaskConfig;
use crate::error::{Result, ScanError};
use crate::platform::{HostArch, HostOs};
use serde::Serialize;
use tracing::info;

/// A scanner release archive pinned to one version and architecture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedArtifact {
    /// Version without a leading `v`
    pub version: String,
    pub arch_tag: String,
    pub download_url: String,
}

/// Strip one leading `v` from a version string.
pub fn strip_v(version: &str) -> &str {
    version.strip_prefix('v').unwrap_or(version)
}

/// Release-asset architecture tag for a host architecture.
pub fn arch_tag(arch: &HostArch) -> Result<&'static str> {
    match arch {
        HostArch::Arm => Ok("ARM"),
        HostArch::Arm64 => Ok("ARM64"),
        HostArch::X86_32 => Ok("32bit"),
        HostArch::X86_64 => Ok("64bit"),
        HostArch::Other(name) => Err(ScanError::UnsupportedArchitecture(name.clone())),
    }
}

/// Fail unless the scanner publishes Linux builds for this host.
pub fn ensure_supported_platform(os: &HostOs) -> Result<()> {
    match os {
        HostOs::Linux => Ok(()),
        HostOs::Windows => Err(ScanError::UnsupportedPlatform(
            "Windows is not currently supported".to_string(),
        )),
        HostOs::Other(_) => Err(ScanError::UnsupportedPlatform(
            "Only Linux is currently supported".to_string(),
        )),
    }
}

/// Work out which release archive to download.
///
/// `latest` maps to the configured default; no release index is queried.
/// The URL path keeps the version as given, the archive name uses it
/// without the `v`.
pub fn resolve(
    requested_version: &str,
    os: &HostOs,
    arch: &HostArch,
    config: &TaskConfig,
) -> Result<ResolvedArtifact> {
    ensure_supported_platform(os)?;

    let version = if requested_version == "latest" {
        config.default_version.as_str()
    } else {
        requested_version
    };
    info!("Required Trivy version is {}", version);

    let tag = arch_tag(arch)?;
    let normalized = strip_v(version);
    let archive = format!("trivy_{}_Linux-{}.tar.gz", normalized, tag);
    let download_url = format!(
        "{}/{}/{}",
        config.release_base_url.trim_end_matches('/'),
        version,
        archive
    );

    Ok(ResolvedArtifact {
        version: normalized.to_string(),
        arch_tag: tag.to_string(),
        download_url,
    })
}
