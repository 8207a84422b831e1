//! GC log collection with an ordered strategy chain.
//!
//! Preferred: reconfigure the target's unified logging to stream `gc*` into
//! the artifact for the window. Fallback: sample `jstat -gc` counters into a
//! timestamped table. Both write the same artifact path; the first strategy
//! that produces non-empty output wins, and an empty leftover after a double
//! failure is deleted.

use std::fs;
use std::io::{self, BufRead, Write as IoWrite};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use crate::actions::{artifact_path, remove_if_empty, verify_output, wait_with_progress, ActionContext};
use crate::console::Console;
use crate::domain::{ActionError, Pid};
use crate::lifecycle::ProcessControl;
use crate::tools::JdkTools;

pub trait GcLogStrategy {
    fn name(&self) -> &'static str;

    /// Collects into `out` for `secs`, reporting progress through `progress`.
    /// Must leave non-empty output on success.
    fn collect(
        &self,
        pid: Pid,
        out: &Path,
        secs: u32,
        progress: &mut dyn FnMut(u64, u64) -> io::Result<()>,
    ) -> anyhow::Result<()>;
}

/// `jcmd VM.log`: points unified logging at the artifact, waits, disables.
pub struct DynamicUnifiedLog<'a> {
    pub jdk: &'a JdkTools,
    pub tick: Duration,
}

impl GcLogStrategy for DynamicUnifiedLog<'_> {
    fn name(&self) -> &'static str {
        "dynamic unified logging (jcmd VM.log)"
    }

    fn collect(
        &self,
        pid: Pid,
        out: &Path,
        secs: u32,
        progress: &mut dyn FnMut(u64, u64) -> io::Result<()>,
    ) -> anyhow::Result<()> {
        self.jdk.jcmd(
            pid,
            &[
                "VM.log".to_string(),
                format!("output={}", out.display()),
                "what=gc*".to_string(),
                "decorators=time,uptime,level,tags".to_string(),
            ],
        )?;

        let waited = wait_with_progress(secs, self.tick, |elapsed, total| progress(elapsed, total));

        // Stop the stream even if the wait errored; the window is over.
        if let Err(err) = self.jdk.jcmd(pid, &["VM.log".to_string(), "disable".to_string()]) {
            log::warn!("could not disable dynamic GC logging on {pid}: {err}");
        }
        waited?;

        let written = fs::metadata(out).map(|m| m.len()).unwrap_or(0);
        anyhow::ensure!(
            written > 0,
            "the JVM accepted the log configuration but wrote nothing"
        );
        Ok(())
    }
}

/// `jstat -gc` polling: one counter row per interval under the tool's own
/// header. Coarser than real GC logs but works on any JVM jstat can see.
pub struct CounterPolling<'a> {
    pub jdk: &'a JdkTools,
    pub interval: Duration,
}

impl GcLogStrategy for CounterPolling<'_> {
    fn name(&self) -> &'static str {
        "memory-counter polling (jstat -gc)"
    }

    fn collect(
        &self,
        pid: Pid,
        out: &Path,
        secs: u32,
        progress: &mut dyn FnMut(u64, u64) -> io::Result<()>,
    ) -> anyhow::Result<()> {
        let mut file = fs::File::create(out)?;
        let total = Duration::from_secs(u64::from(secs));
        let start = Instant::now();
        let mut wrote_header = false;
        let mut wrote_rows = false;

        while start.elapsed() < total {
            match self.jdk.jstat_gc(pid) {
                Ok(snapshot) => {
                    for (index, line) in snapshot.lines().enumerate() {
                        if index == 0 {
                            if !wrote_header {
                                writeln!(file, "elapsed  {line}")?;
                                wrote_header = true;
                            }
                        } else if !line.trim().is_empty() {
                            writeln!(file, "{:>6.1}s  {line}", start.elapsed().as_secs_f64())?;
                            wrote_rows = true;
                        }
                    }
                }
                Err(err) if wrote_rows => {
                    // Keep the partial table; the counters up to now are real.
                    log::warn!("jstat polling ended early: {err}");
                    break;
                }
                Err(err) => return Err(err.into()),
            }
            progress(
                start.elapsed().as_secs().min(u64::from(secs)),
                u64::from(secs),
            )?;
            let remaining = total.saturating_sub(start.elapsed());
            thread::sleep(self.interval.min(remaining));
        }
        file.flush()?;
        anyhow::ensure!(wrote_rows, "jstat produced no counter rows");
        Ok(())
    }
}

/// Runs strategies in order until one leaves non-empty output.
pub(crate) fn run_chain<R: BufRead, W: IoWrite>(
    action: &'static str,
    strategies: &[&dyn GcLogStrategy],
    console: &mut Console<R, W>,
    pid: Pid,
    out: &Path,
    secs: u32,
) -> Result<&'static str, ActionError> {
    let mut failures = Vec::new();
    for strategy in strategies {
        console.say(format!("collecting via {}", strategy.name()))?;
        let mut progress = |elapsed, total| console.tick_progress(elapsed, total);
        let result = strategy.collect(pid, out, secs, &mut progress);
        console.end_progress()?;
        match result {
            Ok(()) => return Ok(strategy.name()),
            Err(err) => {
                log::warn!("{} failed: {err:#}", strategy.name());
                console.say(format!("  {} failed: {err:#}", strategy.name()))?;
                failures.push(format!("{}: {err:#}", strategy.name()));
            }
        }
    }
    remove_if_empty(out);
    Err(ActionError::AllStrategiesFailed {
        action,
        detail: failures.join("\n"),
    })
}

pub fn collect<R: BufRead, W: IoWrite, P: ProcessControl>(
    ctx: &mut ActionContext<'_, R, W, P>,
    secs: u32,
    stamp: &str,
) -> Result<PathBuf, ActionError> {
    let out = artifact_path(ctx.results_dir, "gc", stamp, "log");
    let jdk = ctx.jdk;
    let tick = ctx.progress_tick;
    let dynamic = DynamicUnifiedLog { jdk, tick };
    let polling = CounterPolling { jdk, interval: tick };
    let strategies: [&dyn GcLogStrategy; 2] = [&dynamic, &polling];

    let winner = run_chain(
        "GC log collection",
        &strategies,
        ctx.console,
        ctx.target.pid,
        &out,
        secs,
    )?;
    let path = verify_output(&out, winner)?;
    ctx.console
        .say(format!("  saved: {} (via {winner})", path.display()))?;
    Ok(path)
}
