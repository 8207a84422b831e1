//! JDK serviceability tool wrappers.
//!
//! Structured recordings, GC log control, thread dumps and process listing
//! all ride on the standard JDK binaries. Paths default to bare names
//! resolved through `PATH`, honour `JAVA_HOME` when set, and can be pointed
//! at any directory for tests.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::domain::{ActionError, Pid, Remediation};
use crate::tools::{combined_text, exit_status_code, run_capture};

fn missing_advice(tool: &str) -> String {
    format!("install a full JDK (not a JRE) and put {tool} on PATH, or set JAVA_HOME")
}

#[derive(Debug, Clone)]
pub struct JdkTools {
    pub jps: PathBuf,
    pub jcmd: PathBuf,
    pub jstack: PathBuf,
    pub jstat: PathBuf,
    pub jfr: PathBuf,
}

impl Default for JdkTools {
    fn default() -> Self {
        Self::from_path()
    }
}

impl JdkTools {
    /// Resolves tools from `JAVA_HOME/bin` when set, else bare `PATH` names.
    pub fn from_path() -> Self {
        match env::var("JAVA_HOME") {
            Ok(home) if !home.is_empty() => Self::from_dir(Path::new(&home).join("bin")),
            _ => Self {
                jps: "jps".into(),
                jcmd: "jcmd".into(),
                jstack: "jstack".into(),
                jstat: "jstat".into(),
                jfr: "jfr".into(),
            },
        }
    }

    pub fn from_dir(bin: impl AsRef<Path>) -> Self {
        let bin = bin.as_ref();
        Self {
            jps: bin.join("jps"),
            jcmd: bin.join("jcmd"),
            jstack: bin.join("jstack"),
            jstat: bin.join("jstat"),
            jfr: bin.join("jfr"),
        }
    }

    /// Raw `jps -l` listing, one `<pid> <qualified-name>` pair per line.
    pub fn jps_lines(&self) -> Result<String, ActionError> {
        let output = run_capture(
            Command::new(&self.jps).arg("-l"),
            "jps",
            &missing_advice("jps"),
        )?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }
        Err(ActionError::ToolFailed {
            tool: "jps".to_string(),
            status: exit_status_code(&output),
            remediation: Remediation::new(combined_text(&output)),
        })
    }

    /// Sends one diagnostic command to the target JVM and returns its reply.
    ///
    /// # Errors
    ///
    /// `ToolFailed` carries a remediation that always includes the exact
    /// command line to retry by hand.
    pub fn jcmd(&self, pid: Pid, args: &[String]) -> Result<String, ActionError> {
        let mut command = Command::new(&self.jcmd);
        command.arg(pid.to_string()).args(args);
        let output = run_capture(&mut command, "jcmd", &missing_advice("jcmd"))?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }
        let text = combined_text(&output);
        log::warn!("jcmd {pid} {} failed: {text}", args.join(" "));
        Err(ActionError::ToolFailed {
            tool: "jcmd".to_string(),
            status: exit_status_code(&output),
            remediation: jcmd_remediation(&text, pid, args),
        })
    }

    /// Full thread dump with lock ownership (`jstack -l`).
    pub fn jstack(&self, pid: Pid) -> Result<String, ActionError> {
        let output = run_capture(
            Command::new(&self.jstack).arg("-l").arg(pid.to_string()),
            "jstack",
            &missing_advice("jstack"),
        )?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }
        Err(ActionError::ToolFailed {
            tool: "jstack".to_string(),
            status: exit_status_code(&output),
            remediation: Remediation::new(combined_text(&output))
                .try_command(format!("jstack -l {pid}")),
        })
    }

    /// One `jstat -gc` snapshot: a header line plus one counter row.
    pub fn jstat_gc(&self, pid: Pid) -> Result<String, ActionError> {
        let output = run_capture(
            Command::new(&self.jstat).arg("-gc").arg(pid.to_string()),
            "jstat",
            &missing_advice("jstat"),
        )?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }
        Err(ActionError::ToolFailed {
            tool: "jstat".to_string(),
            status: exit_status_code(&output),
            remediation: Remediation::new(combined_text(&output))
                .try_command(format!("jstat -gc {pid}")),
        })
    }

    /// Renders selected events from a recording file as JSON.
    pub fn jfr_print_json(&self, events: &[&str], file: &Path) -> Result<String, ActionError> {
        let output = run_capture(
            Command::new(&self.jfr)
                .arg("print")
                .arg("--json")
                .arg("--events")
                .arg(events.join(","))
                .arg(file),
            "jfr",
            &missing_advice("jfr"),
        )?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }
        Err(ActionError::ToolFailed {
            tool: "jfr".to_string(),
            status: exit_status_code(&output),
            remediation: Remediation::new(combined_text(&output))
                .try_command(format!("jfr print --json {}", file.display())),
        })
    }
}

/// Diagnoses the common ways `jcmd` refuses to talk to a JVM.
fn jcmd_remediation(text: &str, pid: Pid, args: &[String]) -> Remediation {
    let manual = format!("jcmd {pid} {}", args.join(" "));
    if text.contains("well-known file is not secure") || text.contains("Unable to open socket") {
        return Remediation::new("the JVM rejected the attach request (user mismatch)")
            .try_command(format!("sudo -u <jvm-user> {manual}"))
            .alternate("sampler-based actions attach differently and may still work");
    }
    if text.contains("No such process") || text.contains("Could not find any processes") {
        return Remediation::new("the target process is gone")
            .try_command("rerun discovery and pick a live process");
    }
    if text.contains("not enabled") && text.contains("JFR") {
        return Remediation::new("flight recording is disabled in this JVM")
            .try_command("restart the target with -XX:+FlightRecorder (pre-JDK 11 only)");
    }
    Remediation::new(if text.is_empty() {
        "jcmd gave no diagnostics".to_string()
    } else {
        text.to_string()
    })
    .try_command(manual)
}
