//! Sampler-based actions: every flame graph variant plus the heatmap.
//!
//! All of them are one `asprof` invocation that blocks for the sampling
//! window and writes the artifact itself; the only differences are the event
//! selector, output format and modifier flags.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use crate::actions::{artifact_path, verify_output, ActionContext};
use crate::domain::{ActionError, Pid};
use crate::lifecycle::ProcessControl;
use crate::provision::PlatformTag;
use crate::tools::AsprofCommand;

struct SamplerRun<'a> {
    /// `asprof -e` selector, or a qualified method name for tracing.
    event: &'a str,
    /// Artifact name prefix.
    action: &'a str,
    output_format: Option<&'a str>,
    /// Restrict allocation samples to objects still live at the end.
    live: bool,
    /// Icicle orientation (callees on top).
    reverse: bool,
}

impl<'a> SamplerRun<'a> {
    fn new(event: &'a str, action: &'a str) -> Self {
        Self {
            event,
            action,
            output_format: None,
            live: false,
            reverse: false,
        }
    }
}

fn build_command(
    asprof: PathBuf,
    pid: Pid,
    platform: PlatformTag,
    run: &SamplerRun<'_>,
    secs: u32,
    out: &Path,
) -> AsprofCommand {
    let mut command = AsprofCommand::new(asprof, pid)
        .duration(secs)
        .event(run.event)
        .file(out);
    if let Some(format) = run.output_format {
        command = command.output_format(format);
    }
    if run.live {
        command = command.flag("--live");
    }
    if run.reverse {
        command = command.flag("--reverse");
    }
    if !platform.supports_kernel_sampling() {
        command = command.flag("--all-user");
    }
    command
}

fn sample<R: BufRead, W: Write, P: ProcessControl>(
    ctx: &mut ActionContext<'_, R, W, P>,
    run: &SamplerRun<'_>,
    secs: u32,
    stamp: &str,
) -> Result<PathBuf, ActionError> {
    let out = artifact_path(ctx.results_dir, run.action, stamp, "html");
    let command = build_command(
        ctx.tool.asprof(),
        ctx.target.pid,
        ctx.tool.platform,
        run,
        secs,
        &out,
    );
    ctx.console
        .say(format!("sampling {} on {} for {secs}s", run.event, ctx.target.pid))?;
    log::debug!("{}", command.rendered());
    command.run()?;
    let path = verify_output(&out, "asprof")?;
    ctx.console.say(format!("  saved: {}", path.display()))?;
    Ok(path)
}

pub fn cpu_flame_graph<R: BufRead, W: Write, P: ProcessControl>(
    ctx: &mut ActionContext<'_, R, W, P>,
    secs: u32,
    stamp: &str,
) -> Result<PathBuf, ActionError> {
    sample(ctx, &SamplerRun::new("cpu", "cpu-flamegraph"), secs, stamp)
}

pub fn alloc_flame_graph<R: BufRead, W: Write, P: ProcessControl>(
    ctx: &mut ActionContext<'_, R, W, P>,
    secs: u32,
    stamp: &str,
) -> Result<PathBuf, ActionError> {
    sample(ctx, &SamplerRun::new("alloc", "alloc-flamegraph"), secs, stamp)
}

pub fn lock_flame_graph<R: BufRead, W: Write, P: ProcessControl>(
    ctx: &mut ActionContext<'_, R, W, P>,
    secs: u32,
    stamp: &str,
) -> Result<PathBuf, ActionError> {
    sample(ctx, &SamplerRun::new("lock", "lock-flamegraph"), secs, stamp)
}

pub fn wall_clock_flame_graph<R: BufRead, W: Write, P: ProcessControl>(
    ctx: &mut ActionContext<'_, R, W, P>,
    secs: u32,
    stamp: &str,
) -> Result<PathBuf, ActionError> {
    sample(ctx, &SamplerRun::new("wall", "wall-flamegraph"), secs, stamp)
}

pub fn native_memory_flame_graph<R: BufRead, W: Write, P: ProcessControl>(
    ctx: &mut ActionContext<'_, R, W, P>,
    secs: u32,
    stamp: &str,
) -> Result<PathBuf, ActionError> {
    sample(
        ctx,
        &SamplerRun::new("nativemem", "nativemem-flamegraph"),
        secs,
        stamp,
    )
}

pub fn inverted_cpu_flame_graph<R: BufRead, W: Write, P: ProcessControl>(
    ctx: &mut ActionContext<'_, R, W, P>,
    secs: u32,
    stamp: &str,
) -> Result<PathBuf, ActionError> {
    let mut run = SamplerRun::new("cpu", "cpu-icicle");
    run.reverse = true;
    sample(ctx, &run, secs, stamp)
}

/// Allocation sampling filtered to objects still reachable when the window
/// closes; what survives is leak-shaped.
pub fn leak_flame_graph<R: BufRead, W: Write, P: ProcessControl>(
    ctx: &mut ActionContext<'_, R, W, P>,
    secs: u32,
    stamp: &str,
) -> Result<PathBuf, ActionError> {
    let mut run = SamplerRun::new("alloc", "leak-flamegraph");
    run.live = true;
    sample(ctx, &run, secs, stamp)
}

pub fn cpu_heatmap<R: BufRead, W: Write, P: ProcessControl>(
    ctx: &mut ActionContext<'_, R, W, P>,
    secs: u32,
    stamp: &str,
) -> Result<PathBuf, ActionError> {
    let mut run = SamplerRun::new("cpu", "cpu-heatmap");
    run.output_format = Some("heatmap");
    sample(ctx, &run, secs, stamp)
}

/// Timer-based sampling; the fallback of choice when perf events are blocked.
pub fn cpu_time_flame_graph<R: BufRead, W: Write, P: ProcessControl>(
    ctx: &mut ActionContext<'_, R, W, P>,
    secs: u32,
    stamp: &str,
) -> Result<PathBuf, ActionError> {
    sample(ctx, &SamplerRun::new("ctimer", "cputime-flamegraph"), secs, stamp)
}

/// Traces every invocation of one method, e.g. `com.example.Repo.findAll`.
pub fn method_trace<R: BufRead, W: Write, P: ProcessControl>(
    ctx: &mut ActionContext<'_, R, W, P>,
    pattern: &str,
    secs: u32,
    stamp: &str,
) -> Result<PathBuf, ActionError> {
    sample(ctx, &SamplerRun::new(pattern, "method-trace"), secs, stamp)
}
