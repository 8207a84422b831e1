//! Wrappers around the external binaries the session drives.
//!
//! Two families: the provisioned async-profiler launcher (`asprof`,
//! `jfrconv`) and the JDK serviceability tools (`jps`, `jcmd`, `jstack`,
//! `jstat`, `jfr`). Both turn non-zero exits into [`ActionError::ToolFailed`]
//! with a remediation the operator can act on.

pub mod asprof;
pub mod jdk;

pub use asprof::AsprofCommand;
pub use jdk::JdkTools;

use std::process::{Command, Output};

use crate::domain::ActionError;

/// Runs a command to completion, capturing stdout and stderr.
///
/// A missing binary becomes [`ActionError::ToolUnavailable`] carrying
/// `missing_advice`; callers still have to interpret the exit status.
pub(crate) fn run_capture(
    command: &mut Command,
    tool: &str,
    missing_advice: &str,
) -> Result<Output, ActionError> {
    log::debug!("running {command:?}");
    match command.output() {
        Ok(output) => Ok(output),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            Err(ActionError::ToolUnavailable {
                tool: tool.to_string(),
                advice: missing_advice.to_string(),
            })
        }
        Err(err) => Err(ActionError::Io(err)),
    }
}

/// Merged stderr-then-stdout text of a finished command, trimmed.
///
/// Diagnostics from JVM tooling land on either stream depending on the tool
/// and failure mode, so remediation matching looks at both.
pub(crate) fn combined_text(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stderr).into_owned();
    if !output.stdout.is_empty() {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(&String::from_utf8_lossy(&output.stdout));
    }
    text.trim().to_string()
}

pub(crate) fn exit_status_code(output: &Output) -> i32 {
    output.status.code().unwrap_or(-1)
}
