//! The interactive session controller.
//!
//! Owns the whole flow: preflight, profiler provisioning, target selection,
//! then the menu loop. The loop is a small state machine:
//!
//! ```text
//! SelectingProcess ──▶ ReadyAtMenu ◀──▶ ExecutingAction
//!        ▲                 │
//!        └── reattach ─────┤ (target died, same-named JVM found)
//!                          ▼
//!                      Terminated
//! ```
//!
//! ReadyAtMenu re-checks target liveness on every entry, so a target that
//! died mid-session (terminated by us or crashed on its own) is noticed
//! before the next action rather than after it fails. Action failures are
//! reported and the menu comes back; only provisioning and discovery
//! listing failures end the session with an error.

pub mod menu;

use std::env;
use std::fs;
use std::io::{self, BufRead, BufReader, Stdin, Stdout, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;

use crate::actions::{self, ActionContext, ActionOutcome, ProfilingAction};
use crate::console::Console;
use crate::discovery;
use crate::domain::{Candidate, DiscoveryError, Pid, TargetProcess};
use crate::lifecycle::{HostProcesses, ProcessControl, TerminatePacing};
use crate::preflight;
use crate::provision::{default_cache_dir, Provisioner, ToolInstallation, TOOL_VERSION};
use crate::tools::JdkTools;

use self::menu::ProblemCategory;

pub struct SessionConfig {
    /// Where artifacts land. Canonicalized before use: the target JVM
    /// writes recordings itself and resolves relative paths against its
    /// own working directory, not ours.
    pub results_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub tool_version: String,
    pub pacing: TerminatePacing,
    /// Sleep granularity for timed waits; tests shrink it to milliseconds.
    pub progress_tick: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let results_dir = env::var("HOTPATH_RESULTS_DIR")
            .ok()
            .filter(|dir| !dir.is_empty())
            .map_or_else(|| PathBuf::from("profiling-results"), PathBuf::from);
        Self {
            results_dir,
            cache_dir: default_cache_dir(),
            tool_version: TOOL_VERSION.to_string(),
            pacing: TerminatePacing::default(),
            progress_tick: Duration::from_secs(1),
        }
    }
}

enum SessionState {
    SelectingProcess,
    ReadyAtMenu(TargetProcess),
    ExecutingAction(TargetProcess, ProfilingAction),
    Terminated,
}

/// Drives one interactive session. Generic over console and process
/// control so the full flow runs under test with scripted input.
pub struct SessionController<R, W, P> {
    console: Console<R, W>,
    procs: P,
    jdk: JdkTools,
    provisioner: Provisioner,
    config: SessionConfig,
}

impl SessionController<BufReader<Stdin>, Stdout, HostProcesses> {
    pub fn stdio() -> Self {
        let config = SessionConfig::default();
        let provisioner = Provisioner::new(&config.cache_dir);
        Self::new(
            Console::stdio(),
            HostProcesses,
            JdkTools::from_path(),
            provisioner,
            config,
        )
    }
}

impl<R: BufRead, W: Write, P: ProcessControl> SessionController<R, W, P> {
    pub fn new(
        console: Console<R, W>,
        procs: P,
        jdk: JdkTools,
        provisioner: Provisioner,
        config: SessionConfig,
    ) -> Self {
        Self {
            console,
            procs,
            jdk,
            provisioner,
            config,
        }
    }

    /// Runs the session to completion.
    ///
    /// Provisioning happens before any target interaction, so no action can
    /// run without an installed profiler.
    ///
    /// # Errors
    ///
    /// Unsupported platform, unwritable results directory, failed
    /// provisioning, or a process listing that cannot be obtained at all.
    pub fn run(&mut self) -> anyhow::Result<()> {
        self.console.say(format!(
            "hotpath {} (async-profiler {})",
            env!("CARGO_PKG_VERSION"),
            self.config.tool_version
        ))?;

        let platform =
            preflight::run_checks(&self.config.results_dir, &self.jdk, &mut self.console)?;

        let tool = self
            .provisioner
            .ensure_installed(platform, &self.config.tool_version)
            .context("provisioning async-profiler")?;
        if tool.verified {
            self.console
                .say(format!("installed profiler from {}", tool.source_url))?;
        } else {
            self.console
                .say(format!("using profiler at {}", tool.current.display()))?;
        }

        let results_dir = fs::canonicalize(&self.config.results_dir).with_context(|| {
            format!("resolving {}", self.config.results_dir.display())
        })?;
        self.console
            .say(format!("artifacts go to {}", results_dir.display()))?;

        let own_pid = Pid(i32::try_from(std::process::id()).unwrap_or(i32::MAX));
        let mut hint: Option<ProblemCategory> = None;
        let mut hint_prompted = false;
        let mut state = SessionState::SelectingProcess;

        loop {
            state = match state {
                SessionState::SelectingProcess => match self.select_target(own_pid)? {
                    Some(target) => {
                        self.console.say(format!("target: {target}"))?;
                        if !hint_prompted {
                            hint_prompted = true;
                            hint = menu::prompt_problem_category(&mut self.console)?;
                        }
                        SessionState::ReadyAtMenu(target)
                    }
                    None => SessionState::Terminated,
                },
                SessionState::ReadyAtMenu(target) => self.at_menu(target, own_pid, hint)?,
                SessionState::ExecutingAction(target, action) => {
                    self.run_action(target, action, &tool, &results_dir)?
                }
                SessionState::Terminated => break,
            };
        }

        self.console.say("session ended")?;
        Ok(())
    }

    fn select_target(&mut self, own_pid: Pid) -> anyhow::Result<Option<TargetProcess>> {
        let candidates = discovery::discover(&self.jdk, own_pid)?;
        let jdk = &self.jdk;
        let procs = &self.procs;
        let resolve = |pid: Pid| -> Result<Candidate, DiscoveryError> {
            if !procs.is_alive(pid) {
                return Err(DiscoveryError::ProcessNotFound(pid));
            }
            discovery::candidate_from_pid(jdk, pid)
        };

        match discovery::select_target(&candidates, &mut self.console, resolve) {
            Ok(target) => Ok(Some(target)),
            Err(DiscoveryError::NothingSelected) => {
                self.console.say("nothing selected; ending session")?;
                Ok(None)
            }
            Err(DiscoveryError::Io(err)) if err.kind() == io::ErrorKind::UnexpectedEof => {
                self.console.say("input closed; ending session")?;
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Menu entry point. Re-checks liveness first: a dead target gets a
    /// reattach offer when a same-named JVM is running, otherwise the
    /// session winds down.
    fn at_menu(
        &mut self,
        target: TargetProcess,
        own_pid: Pid,
        hint: Option<ProblemCategory>,
    ) -> anyhow::Result<SessionState> {
        if !self.procs.is_alive(target.pid) {
            self.console
                .say(format!("target {target} is no longer running"))?;
            return match discovery::rediscover_by_name(&self.jdk, own_pid, &target.display_name)
            {
                Some(found) => {
                    self.console.say(format!(
                        "a JVM with the same name is up: {} ({})",
                        found.pid, found.display_name
                    ))?;
                    if self.confirm_or_no("select a new target?")? {
                        Ok(SessionState::SelectingProcess)
                    } else {
                        Ok(SessionState::Terminated)
                    }
                }
                None => {
                    self.console
                        .say("no same-named JVM is running; ending session")?;
                    Ok(SessionState::Terminated)
                }
            };
        }

        menu::print_menu(&mut self.console, hint)?;
        match menu::prompt_action(&mut self.console) {
            Ok(action) => Ok(SessionState::ExecutingAction(target, action)),
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                self.console.say("input closed; ending session")?;
                Ok(SessionState::Terminated)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn run_action(
        &mut self,
        target: TargetProcess,
        action: ProfilingAction,
        tool: &ToolInstallation,
        results_dir: &Path,
    ) -> anyhow::Result<SessionState> {
        // Validate immediately before running: the menu prompt can sit
        // unanswered for a long time.
        if let Err(err) = discovery::validate(&self.procs, &self.jdk, target.pid) {
            self.console.say(format!("{err}"))?;
            return Ok(SessionState::ReadyAtMenu(target));
        }

        let mut ctx = ActionContext {
            target: &target,
            tool,
            jdk: &self.jdk,
            results_dir,
            console: &mut self.console,
            procs: &self.procs,
            pacing: self.config.pacing,
            progress_tick: self.config.progress_tick,
        };

        match actions::execute(action, &mut ctx) {
            Ok(ActionOutcome::ExitRequested) => Ok(SessionState::Terminated),
            Ok(outcome) => {
                if let ActionOutcome::Artifacts(paths) = &outcome {
                    log::debug!("action produced {} artifact(s)", paths.len());
                }
                Ok(SessionState::ReadyAtMenu(target))
            }
            Err(err) => {
                log::warn!("action failed: {err}");
                self.console.say(format!("action failed: {err}"))?;
                Ok(SessionState::ReadyAtMenu(target))
            }
        }
    }

    /// EOF on stdin reads as "no" so the session winds down instead of
    /// erroring out.
    fn confirm_or_no(&mut self, question: &str) -> io::Result<bool> {
        match self.console.confirm(question) {
            Ok(answer) => Ok(answer),
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Consumes the controller, handing back the console writer so tests
    /// can inspect everything the session printed.
    pub fn into_output(self) -> W {
        self.console.into_output()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::io::Cursor;
    use std::os::unix::fs::PermissionsExt;

    use crate::provision::PlatformTag;

    struct FakeProcs {
        alive: Cell<bool>,
    }

    impl ProcessControl for FakeProcs {
        fn is_alive(&self, _pid: Pid) -> bool {
            self.alive.get()
        }

        fn send_term(&self, _pid: Pid) -> io::Result<()> {
            self.alive.set(false);
            Ok(())
        }

        fn send_kill(&self, _pid: Pid) -> io::Result<()> {
            self.alive.set(false);
            Ok(())
        }
    }

    fn fake_tool(dir: &Path) -> ToolInstallation {
        ToolInstallation {
            platform: PlatformTag::LinuxX64,
            version: TOOL_VERSION.to_string(),
            install_root: dir.to_path_buf(),
            current: dir.join("current"),
            source_url: String::new(),
            verified: false,
        }
    }

    fn controller(
        input: &str,
        alive: bool,
        bin: &Path,
    ) -> SessionController<Cursor<Vec<u8>>, Vec<u8>, FakeProcs> {
        SessionController::new(
            Console::new(Cursor::new(input.as_bytes().to_vec()), Vec::new()),
            FakeProcs { alive: Cell::new(alive) },
            JdkTools::from_dir(bin),
            Provisioner::new(bin.join("cache")),
            SessionConfig::default(),
        )
    }

    fn script(dir: &Path, name: &str, body: &str) {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn target() -> TargetProcess {
        TargetProcess::from_candidate(Candidate {
            pid: Pid(3_999_991),
            display_name: "com.example.Api".to_string(),
            command_line: "java com.example.Api".to_string(),
        })
    }

    #[test]
    fn dead_target_with_no_replacement_terminates() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = controller("", false, dir.path());
        let next = session.at_menu(target(), Pid(1), None).unwrap();
        assert!(matches!(next, SessionState::Terminated));
        let output = String::from_utf8(session.console.into_output()).unwrap();
        assert!(output.contains("no longer running"));
        assert!(output.contains("no same-named JVM"));
    }

    #[test]
    fn dead_target_with_replacement_offers_reselection() {
        let dir = tempfile::tempdir().unwrap();
        script(dir.path(), "jps", r#"echo "3999992 com.example.Api""#);
        let mut session = controller("y\n", false, dir.path());
        let next = session.at_menu(target(), Pid(1), None).unwrap();
        assert!(matches!(next, SessionState::SelectingProcess));
        let output = String::from_utf8(session.console.into_output()).unwrap();
        assert!(output.contains("same name is up: 3999992"));
    }

    #[test]
    fn action_on_dead_target_goes_back_to_menu() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = controller("", false, dir.path());
        let tool = fake_tool(dir.path());
        let next = session
            .run_action(target(), ProfilingAction::ThreadDump, &tool, dir.path())
            .unwrap();
        assert!(matches!(next, SessionState::ReadyAtMenu(_)));
    }

    #[test]
    fn failed_action_reports_and_returns_to_menu() {
        let dir = tempfile::tempdir().unwrap();
        // Alive target, but no jstack and no asprof: every dump strategy fails.
        let mut session = controller("", true, dir.path());
        let tool = fake_tool(dir.path());
        let next = session
            .run_action(target(), ProfilingAction::ThreadDump, &tool, dir.path())
            .unwrap();
        assert!(matches!(next, SessionState::ReadyAtMenu(_)));
        let output = String::from_utf8(session.console.into_output()).unwrap();
        assert!(output.contains("action failed:"));
    }

    #[test]
    fn eof_at_the_menu_ends_the_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = controller("", true, dir.path());
        let next = session.at_menu(target(), Pid(1), None).unwrap();
        assert!(matches!(next, SessionState::Terminated));
        let output = String::from_utf8(session.console.into_output()).unwrap();
        assert!(output.contains("input closed"));
    }
}
