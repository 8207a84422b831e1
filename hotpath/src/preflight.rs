//! Pre-session checks.
//!
//! Fatal problems (unsupported platform, unwritable results directory) stop
//! the session before any target interaction. Missing JDK tools are only
//! warnings: each one names what degrades without it, and the affected
//! actions fall back or fail individually later.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::{env, fs};

use anyhow::Context;

use crate::console::Console;
use crate::provision::PlatformTag;
use crate::tools::JdkTools;

/// Fatal checks first, then tool-presence warnings. Returns the detected
/// platform tag so the caller does not probe twice.
///
/// # Errors
///
/// Unsupported os/arch pair, or a results directory that cannot be created
/// or written.
pub fn run_checks<R: BufRead, W: Write>(
    results_dir: &Path,
    jdk: &JdkTools,
    console: &mut Console<R, W>,
) -> anyhow::Result<PlatformTag> {
    let platform = PlatformTag::detect()?;

    fs::create_dir_all(results_dir)
        .with_context(|| format!("creating {}", results_dir.display()))?;
    probe_writable(results_dir).with_context(|| {
        format!("results directory {} is not writable", results_dir.display())
    })?;

    for warning in tool_warnings(jdk, &path_entries()) {
        log::warn!("{warning}");
        console.say(format!("warning: {warning}"))?;
    }

    Ok(platform)
}

fn probe_writable(dir: &Path) -> io::Result<()> {
    let probe = dir.join(".hotpath-write-probe");
    fs::write(&probe, b"probe")?;
    fs::remove_file(&probe)
}

fn path_entries() -> Vec<PathBuf> {
    env::var_os("PATH")
        .map(|raw| env::split_paths(&raw).collect())
        .unwrap_or_default()
}

/// True when `tool` resolves to a file: explicit paths are checked
/// directly, bare names are looked up in `paths`.
fn resolves(tool: &Path, paths: &[PathBuf]) -> bool {
    if tool.components().count() > 1 {
        return tool.is_file();
    }
    paths.iter().any(|dir| dir.join(tool).is_file())
}

/// One warning per missing tool, naming the consequence.
fn tool_warnings(jdk: &JdkTools, paths: &[PathBuf]) -> Vec<String> {
    let checks: [(&Path, &str); 5] = [
        (&jdk.jps, "process discovery falls back to /proc scanning"),
        (&jdk.jcmd, "flight recordings and dynamic GC logging are unavailable"),
        (&jdk.jstack, "thread dumps fall back to the sampler"),
        (&jdk.jstat, "GC counter polling is unavailable"),
        (&jdk.jfr, "telemetry export degrades to a raw recording"),
    ];
    checks
        .into_iter()
        .filter(|(tool, _)| !resolves(tool, paths))
        .map(|(tool, consequence)| format!("{} not found; {consequence}", tool.display()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn touch(path: &Path) {
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn explicit_paths_are_checked_directly() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("jps"));
        touch(&dir.path().join("jcmd"));

        let jdk = JdkTools::from_dir(dir.path());
        let warnings = tool_warnings(&jdk, &[]);
        assert_eq!(warnings.len(), 3);
        assert!(warnings[0].contains("jstack"));
        assert!(warnings[0].contains("fall back to the sampler"));
        assert!(warnings[2].contains("telemetry export degrades"));
    }

    #[test]
    fn bare_names_are_looked_up_in_path_entries() {
        let dir = tempfile::tempdir().unwrap();
        for tool in ["jps", "jcmd", "jstack", "jstat", "jfr"] {
            touch(&dir.path().join(tool));
        }

        let jdk = JdkTools {
            jps: "jps".into(),
            jcmd: "jcmd".into(),
            jstack: "jstack".into(),
            jstat: "jstat".into(),
            jfr: "jfr".into(),
        };
        assert!(tool_warnings(&jdk, &[dir.path().to_path_buf()]).is_empty());
        assert_eq!(tool_warnings(&jdk, &[]).len(), 5);
    }

    #[test]
    fn checks_create_the_results_directory() {
        let dir = tempfile::tempdir().unwrap();
        let results = dir.path().join("out").join("nested");
        let mut console = Console::new(Cursor::new(Vec::new()), Vec::new());

        let jdk = JdkTools::from_dir(dir.path());
        run_checks(&results, &jdk, &mut console).unwrap();
        assert!(results.is_dir());
    }
}
