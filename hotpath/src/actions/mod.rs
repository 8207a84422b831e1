//! The profiling action catalog and its executor.
//!
//! Each menu entry constructs one [`ProfilingAction`] value carrying every
//! parameter it needs; [`execute`] dispatches to exactly one handler per
//! variant. Handlers write artifacts as `{action}-{timestamp}.{ext}` into
//! the results directory and report progress through the session console.
//! A failing action returns an [`ActionError`] for the controller to print;
//! it never tears down the session.

pub mod gclog;
pub mod recording;
pub mod sampler;
pub mod telemetry;
pub mod threaddump;

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use hotpath_common::RecordingSpec;

use crate::artifacts;
use crate::console::Console;
use crate::domain::{ActionError, TargetProcess};
use crate::lifecycle::{self, ProcessControl, TerminateOutcome, TerminatePacing};
use crate::provision::ToolInstallation;
use crate::tools::JdkTools;

pub const DEFAULT_SAMPLE_SECS: u32 = 30;
pub const DEFAULT_RECORDING_SECS: u32 = 60;
pub const DEFAULT_GC_LOG_SECS: u32 = 60;

/// One fully parameterized profiling action. Immutable once built; consumed
/// by [`execute`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProfilingAction {
    /// Fixed-window CPU flame graph.
    CpuSample { secs: u32 },
    AllocSample { secs: u32 },
    LockSample { secs: u32 },
    /// Wall-clock sampling; includes time blocked off-CPU.
    WallClock { secs: u32 },
    /// Native allocations (malloc paths), not Java heap.
    NativeMemory { secs: u32 },
    /// Reversed (icicle) CPU flame graph, callees on top.
    InvertedFlame { secs: u32 },
    /// Same sampler as `CpuSample` with an operator-chosen window.
    CustomDurationCpu { secs: u32 },
    /// Allocation sampling restricted to objects still live at the end.
    LeakDetection { secs: u32 },
    /// Allocation, leak and native-memory graphs plus a memory recording,
    /// all under one timestamp token.
    CompositeMemoryWorkflow { secs: u32 },
    StructuredRecording { secs: u32 },
    /// CPU heatmap (time on x, stacks by color density).
    Heatmap { secs: u32 },
    /// Everything-on recording via the `profile` settings preset.
    AllEvents { secs: u32 },
    /// Short telemetry capture exported as JSON.
    TelemetryExport { secs: u32 },
    EnhancedMemoryRecording { secs: u32 },
    /// Timer-based CPU sampling; works where perf events are blocked.
    CpuTimeSampling { secs: u32 },
    MethodTracing { pattern: String, secs: u32 },
    AdvancedCustomRecording { spec: RecordingSpec, secs: u32 },
    /// Allocation-buffer (TLAB) recording with old-object tracking.
    AllocationBufferLeakAnalysis { secs: u32 },
    GcLogCollection { secs: u32 },
    ThreadDump,
    ListArtifacts,
    TerminateProcess,
    Exit,
}

/// Everything a handler needs, borrowed from the session for one execution.
pub struct ActionContext<'a, R, W, P> {
    pub target: &'a TargetProcess,
    pub tool: &'a ToolInstallation,
    pub jdk: &'a JdkTools,
    pub results_dir: &'a Path,
    pub console: &'a mut Console<R, W>,
    pub procs: &'a P,
    pub pacing: TerminatePacing,
    /// Sleep granularity for timed waits; tests shrink it to milliseconds.
    pub progress_tick: Duration,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Files written into the results directory.
    Artifacts(Vec<PathBuf>),
    /// Interaction finished without producing new files.
    Done,
    /// The target was (or was asked to be) signalled.
    Signalled(TerminateOutcome),
    ExitRequested,
}

/// Runs one action to completion.
///
/// # Errors
///
/// Returns [`ActionError`] for the controller to report; the session loop
/// continues regardless.
pub fn execute<R: BufRead, W: Write, P: ProcessControl>(
    action: ProfilingAction,
    ctx: &mut ActionContext<'_, R, W, P>,
) -> Result<ActionOutcome, ActionError> {
    let stamp = stamp_now();
    match action {
        ProfilingAction::CpuSample { secs } => one(sampler::cpu_flame_graph(ctx, secs, &stamp)?),
        ProfilingAction::AllocSample { secs } => {
            one(sampler::alloc_flame_graph(ctx, secs, &stamp)?)
        }
        ProfilingAction::LockSample { secs } => one(sampler::lock_flame_graph(ctx, secs, &stamp)?),
        ProfilingAction::WallClock { secs } => {
            one(sampler::wall_clock_flame_graph(ctx, secs, &stamp)?)
        }
        ProfilingAction::NativeMemory { secs } => {
            one(sampler::native_memory_flame_graph(ctx, secs, &stamp)?)
        }
        ProfilingAction::InvertedFlame { secs } => {
            one(sampler::inverted_cpu_flame_graph(ctx, secs, &stamp)?)
        }
        ProfilingAction::CustomDurationCpu { secs } => {
            one(sampler::cpu_flame_graph(ctx, secs, &stamp)?)
        }
        ProfilingAction::LeakDetection { secs } => one(sampler::leak_flame_graph(ctx, secs, &stamp)?),
        ProfilingAction::CompositeMemoryWorkflow { secs } => memory_workflow(ctx, secs, &stamp),
        ProfilingAction::StructuredRecording { secs } => {
            one(recording::structured(ctx, secs, &stamp)?)
        }
        ProfilingAction::Heatmap { secs } => one(sampler::cpu_heatmap(ctx, secs, &stamp)?),
        ProfilingAction::AllEvents { secs } => one(recording::all_events(ctx, secs, &stamp)?),
        ProfilingAction::TelemetryExport { secs } => one(telemetry::export(ctx, secs, &stamp)?),
        ProfilingAction::EnhancedMemoryRecording { secs } => {
            one(recording::enhanced_memory(ctx, secs, &stamp)?)
        }
        ProfilingAction::CpuTimeSampling { secs } => {
            one(sampler::cpu_time_flame_graph(ctx, secs, &stamp)?)
        }
        ProfilingAction::MethodTracing { pattern, secs } => {
            one(sampler::method_trace(ctx, &pattern, secs, &stamp)?)
        }
        ProfilingAction::AdvancedCustomRecording { spec, secs } => {
            one(recording::custom(ctx, &spec, secs, &stamp)?)
        }
        ProfilingAction::AllocationBufferLeakAnalysis { secs } => {
            one(recording::tlab_analysis(ctx, secs, &stamp)?)
        }
        ProfilingAction::GcLogCollection { secs } => one(gclog::collect(ctx, secs, &stamp)?),
        ProfilingAction::ThreadDump => one(threaddump::capture(ctx, &stamp)?),
        ProfilingAction::ListArtifacts => {
            match artifacts::browse(ctx.console, ctx.results_dir, &ctx.tool.jfrconv()) {
                Ok(()) => Ok(ActionOutcome::Done),
                Err(crate::domain::ArtifactError::Io(err)) => Err(ActionError::Io(err)),
                Err(degraded) => {
                    ctx.console.say(format!("{degraded}"))?;
                    Ok(ActionOutcome::Done)
                }
            }
        }
        ProfilingAction::TerminateProcess => {
            match lifecycle::terminate_interactive(ctx.procs, ctx.target, ctx.console, ctx.pacing) {
                Ok(outcome) => Ok(ActionOutcome::Signalled(outcome)),
                Err(err) => {
                    log::warn!("termination failed: {err}");
                    ctx.console.say(format!("termination failed: {err}"))?;
                    Ok(ActionOutcome::Signalled(TerminateOutcome::StillAlive))
                }
            }
        }
        ProfilingAction::Exit => Ok(ActionOutcome::ExitRequested),
    }
}

fn one(path: PathBuf) -> Result<ActionOutcome, ActionError> {
    Ok(ActionOutcome::Artifacts(vec![path]))
}

/// Allocation, leak and native-memory graphs plus an enhanced memory
/// recording, sharing one timestamp so the files sort together. A failing
/// step is reported and skipped; only all four failing is an error.
fn memory_workflow<R: BufRead, W: Write, P: ProcessControl>(
    ctx: &mut ActionContext<'_, R, W, P>,
    secs: u32,
    stamp: &str,
) -> Result<ActionOutcome, ActionError> {
    type Step<R, W, P> =
        fn(&mut ActionContext<'_, R, W, P>, u32, &str) -> Result<PathBuf, ActionError>;
    let steps: [(&str, Step<R, W, P>); 4] = [
        ("allocation flame graph", sampler::alloc_flame_graph),
        ("leak flame graph", sampler::leak_flame_graph),
        ("native-memory flame graph", sampler::native_memory_flame_graph),
        ("memory recording", recording::enhanced_memory),
    ];

    ctx.console.say(format!(
        "memory workflow: {} steps of {secs}s each, one shared timestamp",
        steps.len()
    ))?;
    let mut collected = Vec::new();
    let mut failures = Vec::new();
    for (label, step) in steps {
        ctx.console.say(format!("→ {label}"))?;
        match step(ctx, secs, stamp) {
            Ok(path) => collected.push(path),
            Err(err) => {
                log::warn!("memory workflow step '{label}' failed: {err}");
                ctx.console.say(format!("  {label} failed: {err}"))?;
                ctx.console.say("  continuing with the remaining steps")?;
                failures.push(format!("{label}: {err}"));
            }
        }
    }
    if collected.is_empty() {
        return Err(ActionError::AllStrategiesFailed {
            action: "memory workflow",
            detail: failures.join("\n"),
        });
    }
    Ok(ActionOutcome::Artifacts(collected))
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Parses an operator-entered duration. Blank means "take the default"
/// silently; anything non-numeric or below 1 falls back with `warned` set so
/// the caller prints a notice.
pub fn parse_duration_secs(raw: &str, default: u32) -> (u32, bool) {
    let raw = raw.trim();
    if raw.is_empty() {
        return (default, false);
    }
    match raw.parse::<u32>() {
        Ok(secs) if secs >= 1 => (secs, false),
        _ => (default, true),
    }
}

/// Second-resolution timestamp token shared across an action's artifacts.
pub fn stamp_now() -> String {
    chrono::Local::now().format("%Y%m%d-%H%M%S").to_string()
}

pub fn artifact_path(dir: &Path, action: &str, stamp: &str, ext: &str) -> PathBuf {
    dir.join(format!("{action}-{stamp}.{ext}"))
}

/// Blocks for `total_secs`, invoking `on_tick(elapsed, total)` once per tick.
pub fn wait_with_progress(
    total_secs: u32,
    tick: Duration,
    mut on_tick: impl FnMut(u64, u64) -> io::Result<()>,
) -> io::Result<()> {
    let total = Duration::from_secs(u64::from(total_secs));
    let start = Instant::now();
    while start.elapsed() < total {
        let remaining = total - start.elapsed();
        thread::sleep(tick.min(remaining));
        on_tick(
            start.elapsed().as_secs().min(u64::from(total_secs)),
            u64::from(total_secs),
        )?;
    }
    Ok(())
}

/// Confirms the tool actually wrote something; success with an empty or
/// missing file is reported as `NoOutput`.
pub(crate) fn verify_output(path: &Path, tool: &str) -> Result<PathBuf, ActionError> {
    match fs::metadata(path) {
        Ok(metadata) if metadata.len() > 0 => Ok(path.to_path_buf()),
        _ => Err(ActionError::NoOutput {
            tool: tool.to_string(),
            path: path.to_path_buf(),
        }),
    }
}

/// Removes a zero-byte leftover so failed collections do not masquerade as
/// artifacts.
pub(crate) fn remove_if_empty(path: &Path) {
    if let Ok(metadata) = fs::metadata(path) {
        if metadata.len() == 0 {
            let _ = fs::remove_file(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_duration_takes_the_default_silently() {
        assert_eq!(parse_duration_secs("", 30), (30, false));
        assert_eq!(parse_duration_secs("   ", 60), (60, false));
    }

    #[test]
    fn bad_durations_fall_back_with_a_warning() {
        assert_eq!(parse_duration_secs("abc", 30), (30, true));
        assert_eq!(parse_duration_secs("0", 30), (30, true));
        assert_eq!(parse_duration_secs("-5", 30), (30, true));
        assert_eq!(parse_duration_secs("12.5", 30), (30, true));
    }

    #[test]
    fn valid_durations_pass_through() {
        assert_eq!(parse_duration_secs("45", 30), (45, false));
        assert_eq!(parse_duration_secs(" 1 ", 30), (1, false));
    }

    #[test]
    fn stamps_are_second_resolution_tokens() {
        let stamp = stamp_now();
        assert_eq!(stamp.len(), "20260822-153000".len());
        assert_eq!(stamp.as_bytes()[8], b'-');
        assert!(stamp.chars().enumerate().all(|(i, c)| if i == 8 {
            c == '-'
        } else {
            c.is_ascii_digit()
        }));
    }

    #[test]
    fn artifact_paths_compose_action_stamp_and_extension() {
        let path = artifact_path(Path::new("/tmp/results"), "cpu-flamegraph", "20260101-120000", "html");
        assert_eq!(
            path,
            Path::new("/tmp/results/cpu-flamegraph-20260101-120000.html")
        );
    }

    #[test]
    fn wait_reports_monotonic_progress_and_returns_on_time() {
        let mut seen = Vec::new();
        wait_with_progress(1, Duration::from_millis(200), |elapsed, total| {
            seen.push((elapsed, total));
            Ok(())
        })
        .unwrap();
        assert!(!seen.is_empty());
        assert!(seen.windows(2).all(|w| w[0].0 <= w[1].0));
        assert!(seen.iter().all(|&(elapsed, total)| elapsed <= total && total == 1));
    }

    #[test]
    fn verify_output_rejects_missing_and_empty_files() {
        let tmp = tempfile::TempDir::new().unwrap();
        let missing = tmp.path().join("missing.html");
        assert!(matches!(
            verify_output(&missing, "asprof"),
            Err(ActionError::NoOutput { .. })
        ));

        let empty = tmp.path().join("empty.html");
        fs::write(&empty, "").unwrap();
        assert!(matches!(
            verify_output(&empty, "asprof"),
            Err(ActionError::NoOutput { .. })
        ));

        let full = tmp.path().join("full.html");
        fs::write(&full, "<html>").unwrap();
        assert_eq!(verify_output(&full, "asprof").unwrap(), full);
    }

    #[test]
    fn remove_if_empty_only_touches_zero_byte_files() {
        let tmp = tempfile::TempDir::new().unwrap();
        let empty = tmp.path().join("gc-1.log");
        let full = tmp.path().join("gc-2.log");
        fs::write(&empty, "").unwrap();
        fs::write(&full, "[gc] pause").unwrap();

        remove_if_empty(&empty);
        remove_if_empty(&full);
        assert!(!empty.exists());
        assert!(full.exists());
    }
}
