pub mod config;
pub mod error;
pub mod executor;
pub mod host;
pub mod installer;
pub mod invocation;
pub mod orchestrator;
pub mod platform;
pub mod request;
pub mod resolver;

pub use config::TaskConfig;
pub use error::{Result, ScanError};
pub use executor::ScanOutcome;
pub use host::{TaskResult, TaskStatus};
pub use installer::Toolchain;
pub use invocation::{ExecutionMode, HostEnvironment, Invocation};
pub use orchestrator::{Orchestrator, RunReport, Stage};
pub use request::{ScanRequest, ScanTarget};
pub use resolver::ResolvedArtifact;
