//! `hotpath launch`: start a JVM with instrumentation-friendly flags.
//!
//! Accurate sampling needs `-XX:+DebugNonSafepoints` set at startup, so the
//! launcher injects it (plus any requested heap/GC/profile flags) and prints
//! the pid for a profiling session in another terminal.

use std::path::Path;
use std::process::Command;

use anyhow::Context;
use hotpath_common::LaunchSpec;

/// Spawns `java` with the rendered flags and waits for it to exit.
///
/// # Errors
///
/// `java` missing from PATH, spawn failure, or a non-zero exit status.
pub fn run(spec: &LaunchSpec) -> anyhow::Result<()> {
    run_with(Path::new("java"), spec)
}

fn run_with(java: &Path, spec: &LaunchSpec) -> anyhow::Result<()> {
    let args = spec.java_args();
    println!("launching: {} {}", java.display(), args.join(" "));

    let mut child = Command::new(java)
        .args(&args)
        .spawn()
        .context("launching java (is a JDK on PATH?)")?;

    println!("started pid {}", child.id());
    println!("profile it from another terminal: hotpath session");

    let status = child.wait().context("waiting for the target to exit")?;
    if !status.success() {
        anyhow::bail!("target exited with {status}");
    }
    println!("target exited cleanly");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    use hotpath_common::{Framework, LaunchMode};

    fn fake_java(dir: &Path, exit_code: i32) -> std::path::PathBuf {
        let path = dir.join("java");
        fs::write(&path, format!("#!/bin/sh\nexit {exit_code}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn jar_spec() -> LaunchSpec {
        LaunchSpec {
            mode: LaunchMode::Jar("app.jar".to_string()),
            framework: Framework::Plain,
            heap: None,
            profile: None,
            gc: None,
            gc_log: false,
            virtual_threads: false,
            enable_preview: false,
            app_args: Vec::new(),
        }
    }

    #[test]
    fn clean_exit_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let java = fake_java(dir.path(), 0);
        run_with(&java, &jar_spec()).unwrap();
    }

    #[test]
    fn nonzero_exit_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let java = fake_java(dir.path(), 3);
        let err = run_with(&java, &jar_spec()).unwrap_err();
        assert!(err.to_string().contains("target exited with"));
    }

    #[test]
    fn missing_java_reports_context() {
        let err = run_with(Path::new("/nonexistent/java"), &jar_spec()).unwrap_err();
        assert!(format!("{err:#}").contains("launching java"));
    }
}
