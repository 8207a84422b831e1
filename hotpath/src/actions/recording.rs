//! Structured flight-recording actions.
//!
//! Each one is a named recording driven over the runtime control channel:
//! `JFR.start` with the requested event toggles and retention, a synchronous
//! wait with progress ticks, then an explicit `JFR.stop` into the artifact
//! path. The JVM writes the file itself, so verification happens after stop.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use hotpath_common::RecordingSpec;

use crate::actions::{artifact_path, verify_output, wait_with_progress, ActionContext};
use crate::artifacts;
use crate::domain::ActionError;
use crate::lifecycle::ProcessControl;

/// Starts, waits out and stops one named recording targeting `out`.
pub(crate) fn record_to<R: BufRead, W: Write, P: ProcessControl>(
    ctx: &mut ActionContext<'_, R, W, P>,
    spec: &RecordingSpec,
    out: &Path,
    secs: u32,
    stamp: &str,
) -> Result<(), ActionError> {
    let name = format!("hotpath-{stamp}");
    let mut start_args = vec!["JFR.start".to_string()];
    start_args.extend(spec.jcmd_start_options(&name));
    ctx.jdk.jcmd(ctx.target.pid, &start_args)?;

    ctx.console
        .say(format!("recording {name} started; capturing for {secs}s"))?;
    let tick = ctx.progress_tick;
    wait_with_progress(secs, tick, |elapsed, total| {
        ctx.console.tick_progress(elapsed, total)
    })?;
    ctx.console.end_progress()?;

    // Stop failures keep the remediation's manual command: the recording is
    // still running in the target until someone stops it.
    let stop_args = vec![
        "JFR.stop".to_string(),
        format!("name={name}"),
        format!("filename={}", out.display()),
    ];
    ctx.jdk.jcmd(ctx.target.pid, &stop_args)?;
    Ok(())
}

fn run<R: BufRead, W: Write, P: ProcessControl>(
    ctx: &mut ActionContext<'_, R, W, P>,
    spec: &RecordingSpec,
    action: &str,
    secs: u32,
    stamp: &str,
) -> Result<PathBuf, ActionError> {
    let out = artifact_path(ctx.results_dir, action, stamp, "jfr");
    record_to(ctx, spec, &out, secs, stamp)?;
    let path = verify_output(&out, "jcmd")?;
    ctx.console.say(format!("  saved: {}", path.display()))?;
    Ok(path)
}

/// Curated default recording: execution samples, contention and allocation.
pub fn structured<R: BufRead, W: Write, P: ProcessControl>(
    ctx: &mut ActionContext<'_, R, W, P>,
    secs: u32,
    stamp: &str,
) -> Result<PathBuf, ActionError> {
    run(ctx, &RecordingSpec::structured_default(), "recording", secs, stamp)
}

/// Everything the `profile` preset enables. Heavier; for short windows.
pub fn all_events<R: BufRead, W: Write, P: ProcessControl>(
    ctx: &mut ActionContext<'_, R, W, P>,
    secs: u32,
    stamp: &str,
) -> Result<PathBuf, ActionError> {
    run(ctx, &RecordingSpec::profile_settings(), "all-events", secs, stamp)
}

pub fn enhanced_memory<R: BufRead, W: Write, P: ProcessControl>(
    ctx: &mut ActionContext<'_, R, W, P>,
    secs: u32,
    stamp: &str,
) -> Result<PathBuf, ActionError> {
    run(ctx, &RecordingSpec::enhanced_memory(), "memory-recording", secs, stamp)
}

/// Operator-assembled event list and retention.
pub fn custom<R: BufRead, W: Write, P: ProcessControl>(
    ctx: &mut ActionContext<'_, R, W, P>,
    spec: &RecordingSpec,
    secs: u32,
    stamp: &str,
) -> Result<PathBuf, ActionError> {
    run(ctx, spec, "custom-recording", secs, stamp)
}

/// Allocation-buffer leak analysis: records TLAB traffic with GC-root paths,
/// then summarizes how many sampled objects survived into old generation.
pub fn tlab_analysis<R: BufRead, W: Write, P: ProcessControl>(
    ctx: &mut ActionContext<'_, R, W, P>,
    secs: u32,
    stamp: &str,
) -> Result<PathBuf, ActionError> {
    let path = run(ctx, &RecordingSpec::tlab_analysis(), "tlab-analysis", secs, stamp)?;
    match ctx.jdk.jfr_print_json(&["jdk.OldObjectSample"], &path) {
        Ok(json) => {
            if let Some((survivors, _)) = artifacts::summarize_events_str(&json) {
                if survivors == 0 {
                    ctx.console
                        .say("  no sampled allocations survived to old generation")?;
                } else {
                    ctx.console.say(format!(
                        "  {survivors} sampled allocation(s) survived to old generation; \
                         their GC-root paths are in the recording"
                    ))?;
                }
            }
        }
        // The recording itself is the artifact; the summary is best-effort.
        Err(err) => log::debug!("old-object summary skipped: {err}"),
    }
    Ok(path)
}
