use crate::error::{Result, ScanError};
use crate::host::InputSource;

/// Exit-code threshold passed to the scanner when none is given.
pub const DEFAULT_EXIT_CODE: &str = "1";

/// What the scanner should inspect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanTarget {
    Filesystem(String),
    Image(String),
}

impl ScanTarget {
    /// Scanner subcommand for this target.
    pub fn scan_type(&self) -> &'static str {
        match self {
            ScanTarget::Filesystem(_) => "fs",
            ScanTarget::Image(_) => "image",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            ScanTarget::Filesystem(path) => path,
            ScanTarget::Image(reference) => reference,
        }
    }
}

/// One validated scan, built from task inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub target: ScanTarget,
    pub exit_code_threshold: String,
    pub debug: bool,
    pub use_container: bool,
    pub requested_version: String,
}

impl ScanRequest {
    /// Build a request for exactly one target.
    pub fn new(
        path: Option<String>,
        image: Option<String>,
        requested_version: impl Into<String>,
    ) -> Result<Self> {
        let target = select_target(path, image)?;
        Ok(Self {
            target,
            exit_code_threshold: DEFAULT_EXIT_CODE.to_string(),
            debug: false,
            use_container: false,
            requested_version: requested_version.into(),
        })
    }

    pub fn with_exit_code(mut self, threshold: impl Into<String>) -> Self {
        self.exit_code_threshold = threshold.into();
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_container(mut self, use_container: bool) -> Self {
        self.use_container = use_container;
        self
    }

    /// Read and validate the `path`, `image`, `version`, `docker`, `debug`
    /// and `exitCode` inputs.
    ///
    /// The target is checked first so a missing target is reported even
    /// when the version is also absent.
    pub fn from_inputs(inputs: &dyn InputSource) -> Result<Self> {
        let target = select_target(inputs.get_input("path"), inputs.get_input("image"))?;
        let requested_version = inputs.get_required_input("version")?;
        let exit_code_threshold = inputs
            .get_input("exitCode")
            .map(|v| v.trim().to_string())
            .unwrap_or_else(|| DEFAULT_EXIT_CODE.to_string());

        Ok(Self {
            target,
            exit_code_threshold,
            debug: inputs.get_bool_input("debug")?,
            use_container: inputs.get_bool_input("docker")?,
            requested_version: requested_version.trim().to_string(),
        })
    }
}

fn select_target(path: Option<String>, image: Option<String>) -> Result<ScanTarget> {
    match (path, image) {
        (Some(path), None) => Ok(ScanTarget::Filesystem(path)),
        (None, Some(image)) => Ok(ScanTarget::Image(image)),
        (None, None) => Err(ScanError::input(
            "You must specify something to scan. Use either the 'image' or 'path' option.",
        )),
        (Some(_), Some(_)) => Err(ScanError::input(
            "You must specify only one of the 'image' or 'path' options. \
             Use multiple task definitions if you want to scan multiple targets.",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MapInputs;

    #[test]
    fn test_path_only_is_valid() {
        let request = ScanRequest::new(Some("a".to_string()), None, "latest").unwrap();
        assert_eq!(request.target, ScanTarget::Filesystem("a".to_string()));
        assert_eq!(request.exit_code_threshold, "1");
        assert!(!request.debug);
        assert!(!request.use_container);
    }

    #[test]
    fn test_image_only_is_valid() {
        let request = ScanRequest::new(None, Some("alpine:3.16".to_string()), "v0.29.2").unwrap();
        assert_eq!(request.target.scan_type(), "image");
        assert_eq!(request.target.value(), "alpine:3.16");
    }

    #[test]
    fn test_both_targets_rejected() {
        let err = ScanRequest::new(Some("a".to_string()), Some("b".to_string()), "latest")
            .unwrap_err();
        assert!(matches!(err, ScanError::InputValidation(_)));
        assert!(err.to_string().contains("only one"));
    }

    #[test]
    fn test_no_target_rejected() {
        let err = ScanRequest::new(None, None, "latest").unwrap_err();
        assert!(matches!(err, ScanError::InputValidation(_)));
        assert!(err.to_string().contains("something to scan"));
    }

    #[test]
    fn test_from_inputs_full() {
        let inputs = MapInputs::new()
            .with("image", "nginx:1.23")
            .with("version", " v0.30.0 ")
            .with("docker", "true")
            .with("debug", "true")
            .with("exitCode", "0");

        let request = ScanRequest::from_inputs(&inputs).unwrap();
        assert_eq!(request.target, ScanTarget::Image("nginx:1.23".to_string()));
        assert_eq!(request.requested_version, "v0.30.0");
        assert_eq!(request.exit_code_threshold, "0");
        assert!(request.debug);
        assert!(request.use_container);
    }

    #[test]
    fn test_from_inputs_checks_target_before_version() {
        let err = ScanRequest::from_inputs(&MapInputs::new()).unwrap_err();
        assert!(err.to_string().contains("something to scan"));

        let err = ScanRequest::from_inputs(&MapInputs::new().with("path", ".")).unwrap_err();
        assert_eq!(err.to_string(), "Input required: version");
    }

    #[test]
    fn test_blank_exit_code_uses_default() {
        let inputs = MapInputs::new()
            .with("path", "./src")
            .with("version", "latest")
            .with("exitCode", "");
        let request = ScanRequest::from_inputs(&inputs).unwrap();
        assert_eq!(request.exit_code_threshold, DEFAULT_EXIT_CODE);
    }
}
