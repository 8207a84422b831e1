//! Target process discovery and selection.
//!
//! `jps -l` is the primary lister because it sees exactly the JVMs the
//! serviceability tools can attach to. When it is missing or broken the
//! fallback walks `/proc` looking for `java` executables. Both produce the
//! same [`Candidate`] shape so selection does not care which one ran.

use std::fs;
use std::io::{BufRead, Write};
use std::path::Path;

use crate::console::Console;
use crate::domain::{Candidate, DiscoveryError, Pid, TargetProcess};
use crate::lifecycle::ProcessControl;
use crate::tools::JdkTools;

/// The listing helper `jps` spawns for itself; never a profiling target.
const JPS_HELPER_CLASS: &str = "sun.tools.jps.Jps";

/// Lists candidate JVMs, excluding our own helper processes.
///
/// # Errors
///
/// `ListingFailed` only when both listers fail; an empty listing is not an
/// error here (selection turns it into `NoProcessFound`).
pub fn discover(jdk: &JdkTools, own_pid: Pid) -> Result<Vec<Candidate>, DiscoveryError> {
    match jdk.jps_lines() {
        Ok(listing) => {
            let mut candidates = candidates_from_jps_listing(&listing, own_pid);
            for candidate in &mut candidates {
                if let Some(cmdline) = read_proc_cmdline(candidate.pid) {
                    candidate.command_line = cmdline.replace('\0', " ").trim().to_string();
                }
            }
            log::debug!("jps listed {} candidate(s)", candidates.len());
            Ok(candidates)
        }
        Err(jps_err) => {
            log::warn!("jps listing failed ({jps_err}); scanning /proc instead");
            proc_candidates(own_pid).map_err(|proc_err| {
                DiscoveryError::ListingFailed(format!("jps: {jps_err}; /proc: {proc_err}"))
            })
        }
    }
}

/// Builds a candidate for a manually entered pid.
pub fn candidate_from_pid(jdk: &JdkTools, pid: Pid) -> Result<Candidate, DiscoveryError> {
    if let Some(cmdline) = read_proc_cmdline(pid) {
        if !exe_is_java(pid) && !cmdline.split('\0').next().is_some_and(|t| base_name(t) == "java") {
            return Err(DiscoveryError::NotTargetRuntime(pid));
        }
        return Ok(Candidate {
            pid,
            display_name: display_name_from_cmdline(&cmdline),
            command_line: cmdline.replace('\0', " ").trim().to_string(),
        });
    }
    // No /proc entry readable; fall back to the jps listing.
    let listing = jdk
        .jps_lines()
        .map_err(|e| DiscoveryError::ListingFailed(e.to_string()))?;
    candidates_from_jps_listing(&listing, Pid(-1))
        .into_iter()
        .find(|c| c.pid == pid)
        .ok_or(DiscoveryError::ProcessNotFound(pid))
}

/// Re-checks that `pid` is still a live JVM. Runs before every action.
pub fn validate(
    procs: &impl ProcessControl,
    jdk: &JdkTools,
    pid: Pid,
) -> Result<(), DiscoveryError> {
    if !procs.is_alive(pid) {
        return Err(DiscoveryError::ProcessNotFound(pid));
    }
    if looks_like_jvm(jdk, pid) == Some(false) {
        return Err(DiscoveryError::NotTargetRuntime(pid));
    }
    Ok(())
}

/// Finds a live process with the same display name, for reattach offers
/// after the original target died. Plain string equality: a restarted JVM
/// keeps its jar or main class, anything fancier guesses.
pub fn rediscover_by_name(jdk: &JdkTools, own_pid: Pid, name: &str) -> Option<Candidate> {
    discover(jdk, own_pid)
        .ok()?
        .into_iter()
        .find(|c| c.display_name == name)
}

/// Walks the operator through picking one target.
///
/// Zero candidates is an error; one candidate is offered with a confirmation;
/// several get a numbered menu with a manual pid escape hatch. `resolve_manual`
/// validates typed pids so tests can script it.
pub fn select_target<R: BufRead, W: Write>(
    candidates: &[Candidate],
    console: &mut Console<R, W>,
    resolve_manual: impl Fn(Pid) -> Result<Candidate, DiscoveryError>,
) -> Result<TargetProcess, DiscoveryError> {
    if candidates.is_empty() {
        return Err(DiscoveryError::NoProcessFound);
    }

    if let [only] = candidates {
        console.say(format!("found one JVM: {} ({})", only.pid, only.display_name))?;
        console.say(format!("  {}", only.command_line))?;
        if console.confirm("profile this process?")? {
            return Ok(TargetProcess::from_candidate(only.clone()));
        }
        return Err(DiscoveryError::NothingSelected);
    }

    loop {
        console.say("running JVMs:")?;
        for (index, candidate) in candidates.iter().enumerate() {
            console.say(format!(
                "  {}) {:>7}  {}",
                index + 1,
                candidate.pid,
                candidate.display_name
            ))?;
        }
        console.say("  0) enter a PID manually")?;
        let choice = console.select_index("select a target: ", candidates.len())?;

        if choice == 0 {
            loop {
                let raw = console.prompt("PID (blank to go back): ")?;
                if raw.is_empty() {
                    break;
                }
                let Ok(pid) = raw.parse::<i32>() else {
                    console.say(format!("  not a number: {raw}"))?;
                    continue;
                };
                match resolve_manual(Pid(pid)) {
                    Ok(candidate) => return Ok(TargetProcess::from_candidate(candidate)),
                    Err(err) => console.say(format!("  {err}"))?,
                }
            }
            continue;
        }
        return Ok(TargetProcess::from_candidate(candidates[choice - 1].clone()));
    }
}

// ============================================================================
// Listing parsers
// ============================================================================

/// One `jps -l` line: `<pid> <qualified-main-or-jar>`.
fn parse_jps_line(line: &str) -> Option<(i32, String)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (pid_token, name) = line.split_once(' ').unwrap_or((line, ""));
    let pid = pid_token.parse::<i32>().ok()?;
    let name = name.trim();
    let name = if name.is_empty() { "(unnamed)" } else { name };
    Some((pid, name.to_string()))
}

fn candidates_from_jps_listing(listing: &str, own_pid: Pid) -> Vec<Candidate> {
    listing
        .lines()
        .filter_map(parse_jps_line)
        .filter(|(pid, name)| Pid(*pid) != own_pid && !name.ends_with(JPS_HELPER_CLASS))
        .map(|(pid, name)| Candidate {
            pid: Pid(pid),
            display_name: shorten_jar_path(&name),
            command_line: name,
        })
        .collect()
}

/// `/proc` scan for processes whose executable is `java`.
fn proc_candidates(own_pid: Pid) -> Result<Vec<Candidate>, DiscoveryError> {
    let mut candidates = Vec::new();
    for entry in fs::read_dir("/proc")? {
        let entry = entry?;
        let Some(pid) = entry
            .file_name()
            .to_str()
            .and_then(|name| name.parse::<i32>().ok())
        else {
            continue;
        };
        let pid = Pid(pid);
        if pid == own_pid || !exe_is_java(pid) {
            continue;
        }
        let Some(cmdline) = read_proc_cmdline(pid) else {
            continue;
        };
        candidates.push(Candidate {
            pid,
            display_name: display_name_from_cmdline(&cmdline),
            command_line: cmdline.replace('\0', " ").trim().to_string(),
        });
    }
    candidates.sort_by_key(|c| c.pid);
    Ok(candidates)
}

fn exe_is_java(pid: Pid) -> bool {
    fs::read_link(format!("/proc/{pid}/exe"))
        .ok()
        .and_then(|exe| exe.file_name().map(|n| n == "java"))
        .unwrap_or(false)
}

fn read_proc_cmdline(pid: Pid) -> Option<String> {
    let raw = fs::read(format!("/proc/{pid}/cmdline")).ok()?;
    if raw.is_empty() {
        return None;
    }
    Some(String::from_utf8_lossy(&raw).into_owned())
}

/// `Some(is_jvm)` when determinable, `None` when neither `/proc` nor `jps`
/// can answer. Indeterminate never blocks an action.
fn looks_like_jvm(jdk: &JdkTools, pid: Pid) -> Option<bool> {
    if Path::new(&format!("/proc/{pid}/exe")).read_link().is_ok() {
        return Some(exe_is_java(pid));
    }
    let listing = jdk.jps_lines().ok()?;
    Some(
        listing
            .lines()
            .filter_map(parse_jps_line)
            .any(|(listed, _)| listed == pid.0),
    )
}

/// Derives a short identity from a NUL-separated `/proc/<pid>/cmdline`:
/// the jar name after `-jar`, the module after `-m`, or the first
/// non-option token (the main class).
fn display_name_from_cmdline(cmdline: &str) -> String {
    let tokens: Vec<&str> = cmdline.split('\0').filter(|t| !t.is_empty()).collect();
    let mut iter = tokens.iter().skip(1).peekable();
    while let Some(token) = iter.next() {
        match *token {
            "-jar" => {
                if let Some(jar) = iter.next() {
                    return base_name(jar).to_string();
                }
            }
            "-m" | "--module" => {
                if let Some(module) = iter.next() {
                    return (*module).to_string();
                }
            }
            "-cp" | "-classpath" | "--class-path" | "-p" | "--module-path" => {
                iter.next();
            }
            _ if token.starts_with('-') => {}
            main_class => return main_class.to_string(),
        }
    }
    tokens.first().map_or_else(|| "java".to_string(), |t| base_name(t).to_string())
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn shorten_jar_path(name: &str) -> String {
    if name.contains('/') && name.ends_with(".jar") {
        base_name(name).to_string()
    } else {
        name.to_string()
    }
}
