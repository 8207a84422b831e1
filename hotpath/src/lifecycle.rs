//! Target lifecycle control: liveness probes and interactive termination.
//!
//! Graceful first. SIGTERM lets shutdown hooks, connection draining and
//! flight-recorder dumps finish; SIGKILL is only reachable through explicit
//! escalation or a double-confirmed forced path.

#![allow(unsafe_code)] // kill(2) has no safe wrapper in std

use std::io::{self, BufRead, Write};
use std::thread;
use std::time::{Duration, Instant};

use crate::console::Console;
use crate::domain::{LifecycleError, Pid, TargetProcess};

/// Signal and liveness access to the host, separated so termination flows
/// can run against a fake in tests.
pub trait ProcessControl {
    fn is_alive(&self, pid: Pid) -> bool;
    fn send_term(&self, pid: Pid) -> io::Result<()>;
    fn send_kill(&self, pid: Pid) -> io::Result<()>;
}

pub struct HostProcesses;

impl ProcessControl for HostProcesses {
    fn is_alive(&self, pid: Pid) -> bool {
        // Signal 0 probes existence. EPERM still means the process exists,
        // it just belongs to someone else.
        let rc = unsafe { libc::kill(pid.0, 0) };
        rc == 0 || io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }

    fn send_term(&self, pid: Pid) -> io::Result<()> {
        send_signal(pid, libc::SIGTERM)
    }

    fn send_kill(&self, pid: Pid) -> io::Result<()> {
        send_signal(pid, libc::SIGKILL)
    }
}

fn send_signal(pid: Pid, signal: libc::c_int) -> io::Result<()> {
    if unsafe { libc::kill(pid.0, signal) } == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// Wait windows and poll cadence for termination. Tests shrink these to
/// milliseconds.
#[derive(Debug, Clone, Copy)]
pub struct TerminatePacing {
    pub graceful_wait: Duration,
    pub forced_wait: Duration,
    pub poll_tick: Duration,
}

impl Default for TerminatePacing {
    fn default() -> Self {
        Self {
            graceful_wait: Duration::from_secs(10),
            forced_wait: Duration::from_secs(2),
            poll_tick: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminateOutcome {
    /// Exited within the graceful window after SIGTERM.
    Graceful,
    /// Needed SIGKILL, either by escalation or the forced path.
    Forced,
    /// Operator declined escalation, or the process survived SIGKILL.
    StillAlive,
    Cancelled,
}

/// Walks the operator through terminating the target.
///
/// Every path ends with an explicit report of what happened; signal
/// delivery failures surface as [`LifecycleError::SignalFailed`] with a
/// permission hint rather than being swallowed.
pub fn terminate_interactive<P: ProcessControl, R: BufRead, W: Write>(
    procs: &P,
    target: &TargetProcess,
    console: &mut Console<R, W>,
    pacing: TerminatePacing,
) -> Result<TerminateOutcome, LifecycleError> {
    console.say(format!("terminate {target}"))?;
    console.say("  1) graceful stop (SIGTERM, lets shutdown hooks run)")?;
    console.say("  2) forced kill (SIGKILL, immediate, skips all cleanup)")?;
    console.say("  0) cancel")?;
    match console.select_index("mode: ", 2)? {
        0 => {
            console.say("cancelled")?;
            Ok(TerminateOutcome::Cancelled)
        }
        1 => graceful_stop(procs, target, console, pacing),
        _ => forced_kill(procs, target, console, pacing),
    }
}

fn graceful_stop<P: ProcessControl, R: BufRead, W: Write>(
    procs: &P,
    target: &TargetProcess,
    console: &mut Console<R, W>,
    pacing: TerminatePacing,
) -> Result<TerminateOutcome, LifecycleError> {
    if !console.confirm(&format!("send SIGTERM to {}?", target.pid))? {
        console.say("cancelled")?;
        return Ok(TerminateOutcome::Cancelled);
    }
    procs
        .send_term(target.pid)
        .map_err(|source| signal_failed(target.pid, "SIGTERM", source))?;
    console.say(format!(
        "  SIGTERM sent; waiting up to {}s for exit",
        pacing.graceful_wait.as_secs()
    ))?;

    if wait_for_exit(procs, target.pid, pacing.graceful_wait, pacing.poll_tick, console)? {
        console.say("  process exited cleanly")?;
        return Ok(TerminateOutcome::Graceful);
    }

    console.say(format!(
        "  still alive after {}s",
        pacing.graceful_wait.as_secs()
    ))?;
    if !console.confirm("escalate to SIGKILL?")? {
        console.say("  leaving the process running")?;
        return Ok(TerminateOutcome::StillAlive);
    }
    kill_and_report(procs, target, console, pacing)
}

fn forced_kill<P: ProcessControl, R: BufRead, W: Write>(
    procs: &P,
    target: &TargetProcess,
    console: &mut Console<R, W>,
    pacing: TerminatePacing,
) -> Result<TerminateOutcome, LifecycleError> {
    if !console.confirm(&format!("send SIGKILL to {}?", target.pid))? {
        console.say("cancelled")?;
        return Ok(TerminateOutcome::Cancelled);
    }
    if !console.confirm("SIGKILL skips shutdown hooks and can lose in-flight work; really force kill?")? {
        console.say("cancelled")?;
        return Ok(TerminateOutcome::Cancelled);
    }
    kill_and_report(procs, target, console, pacing)
}

fn kill_and_report<P: ProcessControl, R: BufRead, W: Write>(
    procs: &P,
    target: &TargetProcess,
    console: &mut Console<R, W>,
    pacing: TerminatePacing,
) -> Result<TerminateOutcome, LifecycleError> {
    procs
        .send_kill(target.pid)
        .map_err(|source| signal_failed(target.pid, "SIGKILL", source))?;
    if wait_for_exit(procs, target.pid, pacing.forced_wait, pacing.poll_tick, console)? {
        console.say("  process killed")?;
        return Ok(TerminateOutcome::Forced);
    }
    console.say(format!(
        "  process survived SIGKILL (likely stuck in the kernel); inspect with: ps -p {}",
        target.pid
    ))?;
    Ok(TerminateOutcome::StillAlive)
}

fn wait_for_exit<P: ProcessControl, R: BufRead, W: Write>(
    procs: &P,
    pid: Pid,
    window: Duration,
    tick: Duration,
    console: &mut Console<R, W>,
) -> io::Result<bool> {
    let start = Instant::now();
    while start.elapsed() < window {
        thread::sleep(tick);
        if !procs.is_alive(pid) {
            console.end_progress()?;
            return Ok(true);
        }
        console.tick_progress(start.elapsed().as_secs(), window.as_secs())?;
    }
    console.end_progress()?;
    Ok(false)
}

fn signal_failed(pid: Pid, signal: &'static str, source: io::Error) -> LifecycleError {
    let hint = match source.raw_os_error() {
        Some(code) if code == libc::EPERM => {
            "the target runs as another user; rerun as that user or with sudo".to_string()
        }
        Some(code) if code == libc::ESRCH => "the process is already gone".to_string(),
        _ => format!("check the pid with: ps -p {pid}"),
    };
    LifecycleError::SignalFailed {
        pid,
        signal,
        source,
        hint,
    }
}
