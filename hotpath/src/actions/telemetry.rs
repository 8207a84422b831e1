//! Telemetry export: a short metrics recording rendered as JSON.
//!
//! The capture lands in a scratch directory and only the JSON export becomes
//! an artifact. When the `jfr` tool is missing the raw recording is kept
//! instead of losing the capture.

use std::fs;
use std::io::{BufRead, Write};
use std::path::PathBuf;

use hotpath_common::RecordingSpec;

use crate::actions::{artifact_path, recording, verify_output, ActionContext};
use crate::artifacts;
use crate::domain::ActionError;
use crate::lifecycle::ProcessControl;

const EXPORT_EVENTS: &[&str] = &["jdk.CPULoad", "jdk.GCHeapSummary", "jdk.ThreadCPULoad"];

pub fn export<R: BufRead, W: Write, P: ProcessControl>(
    ctx: &mut ActionContext<'_, R, W, P>,
    secs: u32,
    stamp: &str,
) -> Result<PathBuf, ActionError> {
    let scratch = tempfile::tempdir()?;
    let capture = scratch.path().join(format!("telemetry-{stamp}.jfr"));
    ctx.console
        .say(format!("capturing {secs}s of runtime telemetry"))?;
    recording::record_to(ctx, &RecordingSpec::telemetry(), &capture, secs, stamp)?;
    verify_output(&capture, "jcmd")?;

    match ctx.jdk.jfr_print_json(EXPORT_EVENTS, &capture) {
        Ok(json) => {
            let out = artifact_path(ctx.results_dir, "telemetry-export", stamp, "json");
            fs::write(&out, &json)?;
            if let Some((total, counts)) = artifacts::summarize_events_str(&json) {
                ctx.console.say(format!("  exported {total} events:"))?;
                for (kind, count) in counts {
                    ctx.console.say(format!("    {count:>6}  {kind}"))?;
                }
            }
            ctx.console.say(format!("  saved: {}", out.display()))?;
            ctx.console
                .say("  structured JSON; feed it to jq or your metrics pipeline")?;
            Ok(out)
        }
        Err(err @ ActionError::ToolUnavailable { .. }) => {
            // Degrade to the raw recording rather than discarding the capture.
            let fallback = artifact_path(ctx.results_dir, "telemetry-export", stamp, "jfr");
            fs::copy(&capture, &fallback)?;
            ctx.console.say(format!("  {err}"))?;
            ctx.console
                .say(format!("  kept the raw recording: {}", fallback.display()))?;
            ctx.console
                .say("  convert later with: jfr print --json <file>")?;
            Ok(fallback)
        }
        Err(err) => Err(err),
    }
}
