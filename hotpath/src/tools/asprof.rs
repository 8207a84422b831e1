//! Builder for `asprof` invocations plus failure diagnosis.
//!
//! `asprof` attaches to a running JVM, samples for a fixed window, and writes
//! the result itself. The builder only assembles arguments; [`AsprofCommand::run`]
//! is the single place that spawns the binary and classifies what went wrong.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Command;

use crate::domain::{ActionError, Pid, Remediation};
use crate::tools::{combined_text, exit_status_code, run_capture};

const MISSING_ADVICE: &str =
    "the profiler distribution is missing or corrupt; delete the cache directory and rerun";

pub struct AsprofCommand {
    program: PathBuf,
    pid: Pid,
    duration_secs: Option<u32>,
    event: Option<String>,
    output_format: Option<String>,
    file: Option<PathBuf>,
    flags: Vec<String>,
}

impl AsprofCommand {
    pub fn new(program: impl Into<PathBuf>, pid: Pid) -> Self {
        Self {
            program: program.into(),
            pid,
            duration_secs: None,
            event: None,
            output_format: None,
            file: None,
            flags: Vec::new(),
        }
    }

    #[must_use]
    pub fn duration(mut self, secs: u32) -> Self {
        self.duration_secs = Some(secs);
        self
    }

    /// Event selector: a built-in name (`cpu`, `alloc`, `lock`, `wall`,
    /// `nativemem`, `ctimer`) or a fully qualified Java method to trace.
    #[must_use]
    pub fn event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    /// Output format override (`heatmap`, `traces`); default is a flame
    /// graph inferred from the file extension.
    #[must_use]
    pub fn output_format(mut self, format: impl Into<String>) -> Self {
        self.output_format = Some(format.into());
        self
    }

    #[must_use]
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Bare flag such as `--reverse`, `--live`, `--total` or `--all-user`.
    #[must_use]
    pub fn flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.push(flag.into());
        self
    }

    /// Argument vector in the order `asprof` documents: options first, pid last.
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        if let Some(secs) = self.duration_secs {
            args.push("-d".into());
            args.push(secs.to_string().into());
        }
        if let Some(event) = &self.event {
            args.push("-e".into());
            args.push(event.into());
        }
        if let Some(format) = &self.output_format {
            args.push("-o".into());
            args.push(format.into());
        }
        if let Some(file) = &self.file {
            args.push("-f".into());
            args.push(file.as_os_str().to_owned());
        }
        for flag in &self.flags {
            args.push(flag.into());
        }
        args.push(self.pid.to_string().into());
        args
    }

    /// Runs the profiler to completion.
    ///
    /// # Errors
    ///
    /// `ToolUnavailable` when the binary is missing, `ToolFailed` with a
    /// remediation derived from the tool's own diagnostics otherwise.
    pub fn run(&self) -> Result<(), ActionError> {
        let mut command = Command::new(&self.program);
        command.args(self.args());
        let output = run_capture(&mut command, "asprof", MISSING_ADVICE)?;
        if output.status.success() {
            return Ok(());
        }
        let text = combined_text(&output);
        log::warn!("asprof failed: {text}");
        Err(ActionError::ToolFailed {
            tool: "asprof".to_string(),
            status: exit_status_code(&output),
            remediation: categorize_failure(&text, self.pid),
        })
    }

    pub fn rendered(&self) -> String {
        let mut rendered = self.program.display().to_string();
        for arg in self.args() {
            rendered.push(' ');
            rendered.push_str(&arg.to_string_lossy());
        }
        rendered
    }
}

/// Maps raw `asprof` diagnostics to an operator-facing remediation.
///
/// Patterns come from the messages the profiler actually prints; unknown
/// failures get a generic reattach checklist. Action numbers referenced in
/// alternates match the session menu catalog.
pub fn categorize_failure(text: &str, pid: Pid) -> Remediation {
    if text.contains("perf_event") || text.contains("Perf events unavailable") {
        return Remediation::new("the kernel blocks perf events for unprivileged users")
            .try_command("sudo sysctl kernel.perf_event_paranoid=1")
            .try_command("sudo sysctl kernel.kptr_restrict=0")
            .alternate("action 15 (CPU-time sampling) or action 4 (wall-clock) avoid perf events");
    }
    if text.contains("No such process") {
        return Remediation::new("the target process exited before or during sampling")
            .try_command("rerun discovery and pick a live process");
    }
    if text.contains("Operation not permitted") || text.contains("Permission denied") {
        return Remediation::new("attaching was denied; the profiler must run as the JVM's user")
            .try_command(format!("sudo -u <jvm-user> asprof -d 30 {pid}"))
            .try_command("sudo sysctl kernel.yama.ptrace_scope=0");
    }
    if text.contains("Could not start attach mechanism")
        || text.contains("Unable to open socket file")
    {
        return Remediation::new("the JVM did not answer the dynamic attach handshake")
            .try_command(format!("check that /tmp/.java_pid{pid} is not blocked by a container boundary"))
            .try_command("restart the target without -XX:+DisableAttachMechanism");
    }
    if text.contains("Failed to inject profiler") || text.contains("libasyncProfiler") {
        return Remediation::new("the profiler library could not be loaded into the target")
            .try_command("mount /tmp exec (noexec blocks library injection)")
            .alternate("structured recordings (action 10) run inside the JVM and need no injection");
    }
    Remediation::new("asprof failed for an unrecognized reason; its output is logged above")
        .try_command(format!("run it by hand for the full diagnostics: asprof -d 10 {pid}"))
        .try_command("verify the target JVM version is supported by the bundled profiler")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered_args(command: &AsprofCommand) -> Vec<String> {
        command
            .args()
            .into_iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn args_follow_documented_order_with_pid_last() {
        let command = AsprofCommand::new("/opt/asprof", Pid(4821))
            .duration(30)
            .event("cpu")
            .file("/tmp/out.html")
            .flag("--all-user");
        assert_eq!(
            rendered_args(&command),
            ["-d", "30", "-e", "cpu", "-f", "/tmp/out.html", "--all-user", "4821"]
        );
    }

    #[test]
    fn output_format_precedes_file() {
        let command = AsprofCommand::new("asprof", Pid(1))
            .duration(60)
            .event("cpu")
            .output_format("heatmap")
            .file("heat.html");
        let args = rendered_args(&command);
        let o = args.iter().position(|a| a == "-o").unwrap();
        let f = args.iter().position(|a| a == "-f").unwrap();
        assert!(o < f);
        assert_eq!(args[o + 1], "heatmap");
    }

    #[test]
    fn perf_event_failures_point_at_paranoid_sysctl_and_fallback_actions() {
        let remediation =
            categorize_failure("perf_event_open failed: Permission denied", Pid(7));
        assert!(remediation.diagnosis.contains("perf events"));
        assert!(remediation
            .commands
            .iter()
            .any(|c| c.contains("perf_event_paranoid")));
        assert!(remediation.alternate.as_deref().unwrap().contains("wall-clock"));
    }

    #[test]
    fn attach_refusals_mention_the_socket_file() {
        let remediation =
            categorize_failure("Could not start attach mechanism: target busy", Pid(4821));
        assert!(remediation.commands.iter().any(|c| c.contains(".java_pid4821")));
    }

    #[test]
    fn unknown_failures_get_the_generic_checklist() {
        let remediation = categorize_failure("something novel", Pid(3));
        assert!(remediation.diagnosis.contains("unrecognized"));
        assert_eq!(remediation.alternate, None);
    }
}
