//! Thread dump capture with a sampler fallback.
//!
//! `jstack -l` gives the richest dump (locks, ownership). When it is missing
//! or refuses to attach, a short text-mode sampling run still recovers the
//! hot stacks, which is usually enough to spot a stall.

use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use crate::actions::{artifact_path, remove_if_empty, verify_output, ActionContext};
use crate::domain::{ActionError, Pid};
use crate::lifecycle::ProcessControl;
use crate::provision::ToolInstallation;
use crate::tools::{AsprofCommand, JdkTools};

/// Window for the sampler fallback; long enough to catch every runnable
/// thread at least once.
const SAMPLER_DUMP_SECS: u32 = 5;

pub trait DumpStrategy {
    fn name(&self) -> &'static str;

    /// Writes a non-empty dump to `out` or fails.
    fn dump(&self, pid: Pid, out: &Path) -> anyhow::Result<()>;
}

pub struct JstackDump<'a> {
    pub jdk: &'a JdkTools,
}

impl DumpStrategy for JstackDump<'_> {
    fn name(&self) -> &'static str {
        "jstack"
    }

    fn dump(&self, pid: Pid, out: &Path) -> anyhow::Result<()> {
        let text = self.jdk.jstack(pid)?;
        anyhow::ensure!(!text.trim().is_empty(), "jstack printed nothing");
        fs::write(out, text)?;
        Ok(())
    }
}

pub struct SamplerTextDump<'a> {
    pub tool: &'a ToolInstallation,
}

impl DumpStrategy for SamplerTextDump<'_> {
    fn name(&self) -> &'static str {
        "asprof text sampling"
    }

    fn dump(&self, pid: Pid, out: &Path) -> anyhow::Result<()> {
        AsprofCommand::new(self.tool.asprof(), pid)
            .duration(SAMPLER_DUMP_SECS)
            .event("cpu")
            .output_format("traces")
            .file(out)
            .run()?;
        let written = fs::metadata(out).map(|m| m.len()).unwrap_or(0);
        anyhow::ensure!(written > 0, "sampler wrote no traces");
        Ok(())
    }
}

pub(crate) fn dump_with(
    strategies: &[&dyn DumpStrategy],
    pid: Pid,
    out: &Path,
) -> Result<&'static str, ActionError> {
    let mut failures = Vec::new();
    for strategy in strategies {
        match strategy.dump(pid, out) {
            Ok(()) => return Ok(strategy.name()),
            Err(err) => {
                log::warn!("{} dump failed: {err:#}", strategy.name());
                failures.push(format!("{}: {err:#}", strategy.name()));
            }
        }
    }
    remove_if_empty(out);
    Err(ActionError::AllStrategiesFailed {
        action: "thread dump",
        detail: failures.join("\n"),
    })
}

pub fn capture<R: BufRead, W: Write, P: ProcessControl>(
    ctx: &mut ActionContext<'_, R, W, P>,
    stamp: &str,
) -> Result<PathBuf, ActionError> {
    let out = artifact_path(ctx.results_dir, "thread-dump", stamp, "txt");
    let jdk = ctx.jdk;
    let tool = ctx.tool;
    let jstack = JstackDump { jdk };
    let sampler = SamplerTextDump { tool };
    let strategies: [&dyn DumpStrategy; 2] = [&jstack, &sampler];

    ctx.console
        .say(format!("capturing a thread dump of {}", ctx.target.pid))?;
    let winner = dump_with(&strategies, ctx.target.pid, &out)?;
    let path = verify_output(&out, winner)?;
    ctx.console
        .say(format!("  saved: {} (via {winner})", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Scripted {
        name: &'static str,
        write: Option<&'static str>,
    }

    impl DumpStrategy for Scripted {
        fn name(&self) -> &'static str {
            self.name
        }

        fn dump(&self, _pid: Pid, out: &Path) -> anyhow::Result<()> {
            match self.write {
                Some(content) => {
                    fs::write(out, content)?;
                    Ok(())
                }
                None => anyhow::bail!("attach refused"),
            }
        }
    }

    #[test]
    fn falls_back_to_the_second_strategy() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("thread-dump-x.txt");
        let broken = Scripted { name: "jstack", write: None };
        let sampler = Scripted { name: "sampler", write: Some("\"main\" runnable\n") };

        let winner = dump_with(&[&broken, &sampler], Pid(1), &out).unwrap();
        assert_eq!(winner, "sampler");
        assert!(fs::read_to_string(&out).unwrap().contains("main"));
    }

    #[test]
    fn reports_both_failures_when_nothing_works() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("thread-dump-x.txt");
        let a = Scripted { name: "jstack", write: None };
        let b = Scripted { name: "sampler", write: None };

        let err = dump_with(&[&a, &b], Pid(1), &out).unwrap_err();
        match err {
            ActionError::AllStrategiesFailed { action, detail } => {
                assert_eq!(action, "thread dump");
                assert!(detail.contains("jstack:"));
                assert!(detail.contains("sampler:"));
            }
            other => panic!("expected AllStrategiesFailed, got {other:?}"),
        }
        assert!(!out.exists());
    }
}
