use crate::config::TaskConfig;
use crate::error::Result;
use crate::executor::{self, ScanOutcome};
use crate::host::{
    IdGenerator, InputSource, ProcessRunner, RandomIds, SystemRunner, TaskReporter, TaskResult,
};
use crate::installer::{remove_stale, Downloader, HttpDownloader, Installer};
use crate::invocation::{self, ExecutionMode, HostEnvironment, Invocation};
use crate::platform::{HostArch, HostOs};
use crate::request::ScanRequest;
use crate::resolver;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

/// Attachment type the pipeline files the JSON report under.
pub const ATTACHMENT_TYPE: &str = "JSON_RESULT";

pub const SUCCESS_MESSAGE: &str = "No problems found.";
pub const FAILURE_MESSAGE: &str = "Failed: Trivy detected problems.";

/// Where a task run currently is, or where it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    ValidatingInputs,
    SelectingExecutionMode,
    Installing,
    ConfiguringContainer,
    ConfiguringScan,
    Executing,
    ReportingResult,
    Done,
    Failed,
}

/// A published attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub kind: String,
    pub name: String,
    pub path: PathBuf,
}

/// Everything a finished run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub result: TaskResult,
    pub stage: Stage,
    pub invocation: Option<Invocation>,
    pub outcome: Option<ScanOutcome>,
    pub attachment: Option<Attachment>,
}

/// Drives one task run from raw inputs to a published verdict.
pub struct Orchestrator {
    config: TaskConfig,
    host: HostEnvironment,
    os: HostOs,
    arch: HostArch,
    downloader: Box<dyn Downloader>,
    runner: Box<dyn ProcessRunner>,
    ids: Box<dyn IdGenerator>,
    stage: Stage,
}

impl Orchestrator {
    /// Production wiring: HTTP downloads, real processes, random names, and
    /// the platform this binary runs on.
    pub fn new(config: TaskConfig, host: HostEnvironment) -> Self {
        let downloader = HttpDownloader::from_config(&config);
        Self {
            config,
            host,
            os: HostOs::current(),
            arch: HostArch::current(),
            downloader: Box::new(downloader),
            runner: Box::new(SystemRunner),
            ids: Box::new(RandomIds),
            stage: Stage::ValidatingInputs,
        }
    }

    pub fn with_downloader(mut self, downloader: Box<dyn Downloader>) -> Self {
        self.downloader = downloader;
        self
    }

    pub fn with_runner(mut self, runner: Box<dyn ProcessRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_ids(mut self, ids: Box<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_platform(mut self, os: HostOs, arch: HostArch) -> Self {
        self.os = os;
        self.arch = arch;
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Run the task and publish its result.
    ///
    /// Validation, installation and spawn errors end the run as `Failed`
    /// with the error message; they are not returned. `Err` means the
    /// verdict itself could not be published.
    pub fn run(
        &mut self,
        inputs: &dyn InputSource,
        reporter: &mut dyn TaskReporter,
    ) -> Result<RunReport> {
        let mut report = RunReport {
            result: TaskResult::failed(""),
            stage: Stage::ValidatingInputs,
            invocation: None,
            outcome: None,
            attachment: None,
        };

        match self.drive(inputs, reporter, &mut report) {
            Ok(result) => {
                self.enter(Stage::Done);
                report.result = result;
            }
            Err(e) => {
                error!("{} failed: {}", stage_label(self.stage), e);
                self.enter(Stage::Failed);
                report.result = TaskResult::failed(e.to_string());
            }
        }
        report.stage = self.stage;

        reporter.set_result(&report.result)?;
        info!("Done!");
        Ok(report)
    }

    fn drive(
        &mut self,
        inputs: &dyn InputSource,
        reporter: &mut dyn TaskReporter,
        report: &mut RunReport,
    ) -> Result<TaskResult> {
        self.enter(Stage::ValidatingInputs);
        let request = ScanRequest::from_inputs(inputs)?;

        self.enter(Stage::SelectingExecutionMode);
        let mode = if request.use_container {
            info!("Run requested using {}...", self.config.container_runtime);
            self.enter(Stage::ConfiguringContainer);
            self.host.require_home()?;
            ExecutionMode::Container
        } else {
            info!("Run requested using local Trivy binary...");
            self.enter(Stage::Installing);
            info!("Finding correct Trivy version to install...");
            let artifact =
                resolver::resolve(&request.requested_version, &self.os, &self.arch, &self.config)?;
            let toolchain =
                Installer::new(self.downloader.as_ref(), &self.config).install(&artifact)?;
            ExecutionMode::Local(toolchain)
        };

        self.enter(Stage::ConfiguringScan);
        info!("Preparing output location...");
        let output_path = self
            .config
            .temp_dir
            .join(format!("trivy-results-{}.json", self.ids.next_id()));
        remove_stale(&output_path);

        info!("Configuring options for {} scan...", request.target.scan_type());
        let invocation =
            invocation::build(&mode, &request, &output_path, &self.host, &self.config);
        report.invocation = Some(invocation.clone());

        self.enter(Stage::Executing);
        let outcome = executor::execute(self.runner.as_ref(), &invocation, &output_path)?;
        report.outcome = Some(outcome.clone());

        self.enter(Stage::ReportingResult);
        let result = if outcome.is_clean() {
            TaskResult::succeeded(SUCCESS_MESSAGE)
        } else {
            TaskResult::failed(FAILURE_MESSAGE)
        };

        // Findings are the payload, so the report is attached on failure too
        info!("Publishing JSON results...");
        if !outcome.output_path.is_file() {
            warn!(
                "Scanner did not write {}; attaching anyway",
                outcome.output_path.display()
            );
        }
        let attachment = Attachment {
            kind: ATTACHMENT_TYPE.to_string(),
            name: format!("trivy-{}.json", self.ids.next_id()),
            path: outcome.output_path.clone(),
        };
        reporter.add_attachment(&attachment.kind, &attachment.name, &attachment.path)?;
        report.attachment = Some(attachment);

        Ok(result)
    }

    fn enter(&mut self, stage: Stage) {
        debug!("{} -> {}", stage_label(self.stage), stage_label(stage));
        self.stage = stage;
    }
}

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::ValidatingInputs => "validating inputs",
        Stage::SelectingExecutionMode => "selecting execution mode",
        Stage::Installing => "installing",
        Stage::ConfiguringContainer => "configuring container",
        Stage::ConfiguringScan => "configuring scan",
        Stage::Executing => "executing",
        Stage::ReportingResult => "reporting result",
        Stage::Done => "done",
        Stage::Failed => "failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScanError;
    use crate::host::{MapInputs, SequentialIds, TaskStatus};
    use std::cell::RefCell;
    use std::path::Path;
    use std::rc::Rc;

    #[derive(Default)]
    struct Recorder {
        attachments: Vec<(String, String, PathBuf)>,
        results: Vec<TaskResult>,
    }

    impl TaskReporter for Recorder {
        fn add_attachment(&mut self, kind: &str, name: &str, path: &Path) -> Result<()> {
            self.attachments
                .push((kind.to_string(), name.to_string(), path.to_path_buf()));
            Ok(())
        }

        fn set_result(&mut self, result: &TaskResult) -> Result<()> {
            self.results.push(result.clone());
            Ok(())
        }
    }

    struct StubRunner {
        code: i32,
        calls: Rc<RefCell<Vec<Invocation>>>,
    }

    impl ProcessRunner for StubRunner {
        fn run(&self, invocation: &Invocation) -> Result<i32> {
            self.calls.borrow_mut().push(invocation.clone());
            Ok(self.code)
        }
    }

    struct NoDownloads;

    impl Downloader for NoDownloads {
        fn download(&self, url: &str, _dest: &Path) -> Result<()> {
            Err(ScanError::Download {
                url: url.to_string(),
                reason: "downloads disabled in tests".to_string(),
            })
        }
    }

    struct Harness {
        orch: Orchestrator,
        calls: Rc<RefCell<Vec<Invocation>>>,
        tmp: tempfile::TempDir,
    }

    fn harness(code: i32) -> Harness {
        let tmp = tempfile::tempdir().unwrap();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let config = TaskConfig {
            temp_dir: tmp.path().to_path_buf(),
            ..TaskConfig::default()
        };
        let orch = Orchestrator::new(config, HostEnvironment::new("/home/vsts", "/work"))
        .with_downloader(Box::new(NoDownloads))
        .with_runner(Box::new(StubRunner {
            code,
            calls: Rc::clone(&calls),
        }))
        .with_ids(Box::new(SequentialIds::new("t")))
        .with_platform(HostOs::Linux, HostArch::X86_64);
        Harness { orch, calls, tmp }
    }

    fn docker_inputs() -> MapInputs {
        MapInputs::new()
            .with("image", "alpine:3.16")
            .with("version", "latest")
            .with("docker", "true")
    }

    #[test]
    fn test_container_scan_success() {
        let Harness { mut orch, calls, tmp } = harness(0);
        let mut recorder = Recorder::default();

        let report = orch.run(&docker_inputs(), &mut recorder).unwrap();

        assert_eq!(report.result, TaskResult::succeeded(SUCCESS_MESSAGE));
        assert_eq!(report.stage, Stage::Done);
        assert_eq!(orch.stage(), Stage::Done);
        assert_eq!(recorder.results, vec![report.result.clone()]);
        assert_eq!(
            recorder.attachments,
            vec![(
                "JSON_RESULT".to_string(),
                "trivy-t2.json".to_string(),
                tmp.path().join("trivy-results-t1.json"),
            )]
        );

        let calls = calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "docker");
        assert!(calls[0].args.contains(&"aquasec/trivy:latest".to_string()));
    }

    #[test]
    fn test_findings_fail_but_still_attach() {
        let Harness { mut orch, tmp: _tmp, .. } = harness(1);
        let mut recorder = Recorder::default();

        let report = orch.run(&docker_inputs(), &mut recorder).unwrap();

        assert_eq!(report.result.status, TaskStatus::Failed);
        assert_eq!(report.result.message, FAILURE_MESSAGE);
        assert_eq!(report.outcome.map(|o| o.exit_code), Some(1));
        assert_eq!(recorder.attachments.len(), 1);
        assert_eq!(report.stage, Stage::Done);
    }

    #[test]
    fn test_invalid_inputs_fail_before_side_effects() {
        let Harness { mut orch, calls, tmp: _tmp } = harness(0);
        let mut recorder = Recorder::default();
        let inputs = MapInputs::new()
            .with("path", ".")
            .with("image", "alpine")
            .with("version", "latest");

        let report = orch.run(&inputs, &mut recorder).unwrap();

        assert_eq!(report.stage, Stage::Failed);
        assert!(report.result.message.contains("only one"));
        assert!(recorder.attachments.is_empty());
        assert_eq!(recorder.results.len(), 1);
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn test_local_mode_download_failure_is_reported() {
        let Harness { mut orch, calls, tmp: _tmp } = harness(0);
        let mut recorder = Recorder::default();
        let inputs = MapInputs::new().with("path", "./src").with("version", "latest");

        let report = orch.run(&inputs, &mut recorder).unwrap();

        assert_eq!(report.result.status, TaskStatus::Failed);
        assert!(report
            .result
            .message
            .contains("trivy_0.29.2_Linux-64bit.tar.gz"));
        assert!(calls.borrow().is_empty());
        assert!(recorder.attachments.is_empty());
    }

    #[test]
    fn test_container_mode_needs_home() {
        let tmp = tempfile::tempdir().unwrap();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let config = TaskConfig {
            temp_dir: tmp.path().to_path_buf(),
            ..TaskConfig::default()
        };
        let mut orch = Orchestrator::new(config, HostEnvironment::without_home("/work"))
            .with_runner(Box::new(StubRunner {
                code: 0,
                calls: Rc::clone(&calls),
            }))
            .with_ids(Box::new(SequentialIds::new("t")));
        let mut recorder = Recorder::default();

        let report = orch.run(&docker_inputs(), &mut recorder).unwrap();

        assert_eq!(report.stage, Stage::Failed);
        assert_eq!(
            report.result.message,
            "Cannot mount registry credentials: HOME is not set"
        );
        assert!(calls.borrow().is_empty());
        assert!(recorder.attachments.is_empty());
    }

    #[test]
    fn test_report_serializes_for_json_output() {
        let Harness { mut orch, tmp: _tmp, .. } = harness(0);
        let mut recorder = Recorder::default();

        let report = orch.run(&docker_inputs(), &mut recorder).unwrap();
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["result"]["status"], "Succeeded");
        assert_eq!(json["stage"], "Done");
        assert_eq!(json["outcome"]["exit_code"], 0);
        assert_eq!(json["invocation"]["program"], "docker");
        assert_eq!(json["attachment"]["kind"], "JSON_RESULT");
    }

    #[test]
    fn test_local_mode_unsupported_platform() {
        let Harness { orch, tmp: _tmp, .. } = harness(0);
        let mut orch = orch.with_platform(HostOs::Windows, HostArch::X86_64);
        let mut recorder = Recorder::default();
        let inputs = MapInputs::new().with("path", ".").with("version", "latest");

        let report = orch.run(&inputs, &mut recorder).unwrap();
        assert_eq!(report.result.message, "Windows is not currently supported");
    }

    #[test]
    fn test_container_mode_skips_platform_checks() {
        let Harness { orch, calls, tmp: _tmp } = harness(0);
        let mut orch = orch.with_platform(HostOs::Other("macos".to_string()), HostArch::Arm64);
        let mut recorder = Recorder::default();

        let report = orch.run(&docker_inputs(), &mut recorder).unwrap();
        assert!(report.result.is_success());
        assert_eq!(calls.borrow().len(), 1);
    }
}
