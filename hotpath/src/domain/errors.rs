//! Error taxonomy for the session pipeline.
//!
//! Each stage owns its own enum so callers can tell recoverable conditions
//! (report, return to menu) from fatal ones (end the session) without string
//! matching. Anyhow wraps these at the binary boundary.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use super::types::Pid;

/// Failures while locating or validating a target process.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("no running JVM found\nstart the target first, e.g.: hotpath launch --jar app.jar")]
    NoProcessFound,

    #[error("no target selected")]
    NothingSelected,

    #[error("process {0} not found (it may have exited)")]
    ProcessNotFound(Pid),

    #[error("process {0} is not a JVM")]
    NotTargetRuntime(Pid),

    #[error("could not list candidate processes: {0}")]
    ListingFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failures while downloading or installing the profiler distribution.
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("unsupported platform {os}/{arch} (supported: linux x86_64, linux aarch64, macos)")]
    UnsupportedPlatform {
        os: &'static str,
        arch: &'static str,
    },

    #[error("download from {url} failed: {reason}")]
    DownloadFailed { url: String, reason: String },

    #[error("could not extract {}: {reason}", archive.display())]
    ExtractionFailed { archive: PathBuf, reason: String },

    #[error("no usable download transport (tried: {tried})\ninstall curl or check network access, then rerun")]
    NoTransportAvailable { tried: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failures while executing a profiling action against the target.
#[derive(Error, Debug)]
pub enum ActionError {
    #[error("{tool} is not available: {advice}")]
    ToolUnavailable { tool: String, advice: String },

    #[error("{tool} exited with status {status}\n{remediation}")]
    ToolFailed {
        tool: String,
        status: i32,
        remediation: Remediation,
    },

    #[error("{tool} reported success but produced no output at {}", path.display())]
    NoOutput { tool: String, path: PathBuf },

    #[error("every strategy for {action} failed:\n{detail}")]
    AllStrategiesFailed {
        action: &'static str,
        detail: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failures while browsing or post-processing collected artifacts.
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("artifact no longer exists: {}", .0.display())]
    Missing(PathBuf),

    #[error("converter unavailable: {0}")]
    ConverterUnavailable(String),

    #[error("conversion failed: {0}")]
    ConversionFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failures while signalling the target process.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("failed to send {signal} to {pid}: {source}\n{hint}")]
    SignalFailed {
        pid: Pid,
        signal: &'static str,
        source: std::io::Error,
        hint: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Diagnosis and concrete next steps attached to an external tool failure.
///
/// Rendered under the error message so the operator always sees something
/// actionable: what went wrong, commands to try, and where applicable an
/// alternative action that avoids the failed mechanism entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remediation {
    pub diagnosis: String,
    pub commands: Vec<String>,
    pub alternate: Option<String>,
}

impl Remediation {
    pub fn new(diagnosis: impl Into<String>) -> Self {
        Self {
            diagnosis: diagnosis.into(),
            commands: Vec::new(),
            alternate: None,
        }
    }

    #[must_use]
    pub fn try_command(mut self, command: impl Into<String>) -> Self {
        self.commands.push(command.into());
        self
    }

    #[must_use]
    pub fn alternate(mut self, alternate: impl Into<String>) -> Self {
        self.alternate = Some(alternate.into());
        self
    }
}

impl fmt::Display for Remediation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.diagnosis)?;
        for command in &self.commands {
            write!(f, "\n  try: {command}")?;
        }
        if let Some(alternate) = &self.alternate {
            write!(f, "\n  or: {alternate}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_errors_name_the_pid() {
        let err = DiscoveryError::ProcessNotFound(Pid(1234));
        assert_eq!(err.to_string(), "process 1234 not found (it may have exited)");

        let err = DiscoveryError::NotTargetRuntime(Pid(99));
        assert_eq!(err.to_string(), "process 99 is not a JVM");
    }

    #[test]
    fn provision_error_mentions_platform_pair() {
        let err = ProvisionError::UnsupportedPlatform {
            os: "freebsd",
            arch: "x86_64",
        };
        assert!(err.to_string().contains("freebsd/x86_64"));
        assert!(err.to_string().contains("supported"));
    }

    #[test]
    fn remediation_renders_commands_then_alternate() {
        let remediation = Remediation::new("kernel blocks perf events for unprivileged users")
            .try_command("sudo sysctl kernel.perf_event_paranoid=1")
            .alternate("use timer-based CPU sampling instead");

        let rendered = remediation.to_string();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "kernel blocks perf events for unprivileged users");
        assert_eq!(lines[1], "  try: sudo sysctl kernel.perf_event_paranoid=1");
        assert_eq!(lines[2], "  or: use timer-based CPU sampling instead");
    }

    #[test]
    fn tool_failure_embeds_remediation() {
        let err = ActionError::ToolFailed {
            tool: "asprof".into(),
            status: 255,
            remediation: Remediation::new("target JVM refused to attach")
                .try_command("check that the JVM runs as the same user"),
        };
        let text = err.to_string();
        assert!(text.contains("asprof exited with status 255"));
        assert!(text.contains("  try: check that the JVM runs as the same user"));
    }
}
