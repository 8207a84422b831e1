//! Collected artifact management.
//!
//! Everything an action produces lands in one flat results directory with
//! `{action}-{timestamp}.{ext}` names. The browser classifies purely by
//! extension, newest first, and offers a per-kind inspection: open flame
//! graphs, convert recordings, preview text, summarize telemetry exports.

use std::collections::BTreeMap;
use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::SystemTime;

use serde::Deserialize;

use crate::console::Console;
use crate::domain::ArtifactError;

const PREVIEW_HEAD_LINES: usize = 20;
const PREVIEW_TAIL_LINES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    FlameGraph,
    Recording,
    ThreadDump,
    GcLog,
    TelemetryExport,
}

impl ArtifactKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "html" => Some(Self::FlameGraph),
            "jfr" => Some(Self::Recording),
            "txt" => Some(Self::ThreadDump),
            "log" => Some(Self::GcLog),
            "json" => Some(Self::TelemetryExport),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::FlameGraph => "flame graphs",
            Self::Recording => "recordings",
            Self::ThreadDump => "thread dumps",
            Self::GcLog => "gc logs",
            Self::TelemetryExport => "telemetry exports",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Artifact {
    pub path: PathBuf,
    pub kind: ArtifactKind,
    pub size: u64,
    pub modified: SystemTime,
}

/// Lists recognized artifacts, newest first.
pub fn scan(results_dir: &Path) -> std::io::Result<Vec<Artifact>> {
    let mut artifacts = Vec::new();
    if !results_dir.is_dir() {
        return Ok(artifacts);
    }
    for entry in fs::read_dir(results_dir)? {
        let entry = entry?;
        let path = entry.path();
        let Some(kind) = ArtifactKind::from_path(&path) else {
            continue;
        };
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }
        artifacts.push(Artifact {
            path,
            kind,
            size: metadata.len(),
            modified: metadata.modified()?,
        });
    }
    artifacts.sort_by(|a, b| b.modified.cmp(&a.modified));
    Ok(artifacts)
}

/// `flame graphs: 2, recordings: 1` style count line, stable order.
pub fn summary_line(artifacts: &[Artifact]) -> String {
    let order = [
        ArtifactKind::FlameGraph,
        ArtifactKind::Recording,
        ArtifactKind::ThreadDump,
        ArtifactKind::GcLog,
        ArtifactKind::TelemetryExport,
    ];
    let mut parts = Vec::new();
    for kind in order {
        let count = artifacts.iter().filter(|a| a.kind == kind).count();
        if count > 0 {
            parts.push(format!("{}: {count}", kind.label()));
        }
    }
    parts.join(", ")
}

/// Interactive artifact browser. Re-scans on every pass so conversions show
/// up immediately; inspection failures are reported and the browser stays up.
pub fn browse<R: BufRead, W: Write>(
    console: &mut Console<R, W>,
    results_dir: &Path,
    jfrconv: &Path,
) -> Result<(), ArtifactError> {
    loop {
        let artifacts = scan(results_dir)?;
        if artifacts.is_empty() {
            console.say(format!("no artifacts in {} yet", results_dir.display()))?;
            return Ok(());
        }
        console.blank()?;
        console.say(format!(
            "artifacts in {} ({})",
            results_dir.display(),
            summary_line(&artifacts)
        ))?;
        for (index, artifact) in artifacts.iter().enumerate() {
            let name = artifact
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            console.say(format!(
                "  {}) {:>9}  {name}",
                index + 1,
                human_size(artifact.size)
            ))?;
        }
        console.say("  0) back to the action menu")?;
        let choice = console.select_index("inspect which? ", artifacts.len())?;
        if choice == 0 {
            return Ok(());
        }
        if let Err(err) = inspect(console, &artifacts[choice - 1], jfrconv) {
            console.say(format!("  {err}"))?;
        }
    }
}

fn inspect<R: BufRead, W: Write>(
    console: &mut Console<R, W>,
    artifact: &Artifact,
    jfrconv: &Path,
) -> Result<(), ArtifactError> {
    match artifact.kind {
        ArtifactKind::FlameGraph => {
            if open_in_viewer(&artifact.path).is_ok() {
                console.say("  opened in your browser")?;
            } else {
                console.say(format!("  no desktop opener; open manually: {}", artifact.path.display()))?;
            }
            Ok(())
        }
        ArtifactKind::Recording => {
            if console.confirm("convert to a flame graph with jfrconv?")? {
                match convert_recording(jfrconv, &artifact.path) {
                    Ok(out) => console.say(format!("  wrote {}", out.display()))?,
                    Err(err) => {
                        console.say(format!("  {err}"))?;
                        console.say(format!(
                            "  inspect instead with: jfr print --events jdk.ExecutionSample {}",
                            artifact.path.display()
                        ))?;
                    }
                }
            } else {
                console.say(format!(
                    "  inspect with: jfr print {} or open it in JDK Mission Control",
                    artifact.path.display()
                ))?;
            }
            Ok(())
        }
        ArtifactKind::ThreadDump | ArtifactKind::GcLog => preview(console, &artifact.path),
        ArtifactKind::TelemetryExport => {
            console.say(format!("  {} of JSON", human_size(artifact.size)))?;
            match telemetry_summary(&artifact.path) {
                Some((total, counts)) => {
                    console.say(format!("  {total} events:"))?;
                    for (kind, count) in counts {
                        console.say(format!("    {count:>6}  {kind}"))?;
                    }
                }
                None => console.say("  (not parseable as a jfr JSON export)")?,
            }
            console.say("  feed it to jq, a notebook, or your metrics pipeline")?;
            Ok(())
        }
    }
}

/// Runs the bundled converter on a recording; output lands next to it with
/// the same stem and an `.html` extension.
pub fn convert_recording(jfrconv: &Path, recording: &Path) -> Result<PathBuf, ArtifactError> {
    let out = recording.with_extension("html");
    let result = Command::new(jfrconv)
        .arg("--cpu")
        .arg(recording)
        .arg(&out)
        .output();
    match result {
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(
            ArtifactError::ConverterUnavailable(format!("jfrconv not found at {}", jfrconv.display())),
        ),
        Err(err) => Err(ArtifactError::Io(err)),
        Ok(output) if output.status.success() && out.is_file() => Ok(out),
        Ok(output) => Err(ArtifactError::ConversionFailed(format!(
            "jfrconv exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ))),
    }
}

/// Event counts from a `jfr print --json` export, sorted by event type.
/// `None` when the file does not parse; callers print guidance instead.
pub fn telemetry_summary(path: &Path) -> Option<(usize, Vec<(String, usize)>)> {
    summarize_events_str(&fs::read_to_string(path).ok()?)
}

/// Same as [`telemetry_summary`] for an in-memory `jfr print --json` blob.
pub(crate) fn summarize_events_str(raw: &str) -> Option<(usize, Vec<(String, usize)>)> {
    let doc: TelemetryDocument = serde_json::from_str(raw).ok()?;
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for event in &doc.recording.events {
        *counts.entry(event.kind.clone()).or_default() += 1;
    }
    Some((doc.recording.events.len(), counts.into_iter().collect()))
}

#[derive(Deserialize)]
struct TelemetryDocument {
    recording: TelemetryRecording,
}

#[derive(Deserialize)]
struct TelemetryRecording {
    events: Vec<TelemetryEvent>,
}

#[derive(Deserialize)]
struct TelemetryEvent {
    #[serde(rename = "type")]
    kind: String,
}

fn preview<R: BufRead, W: Write>(
    console: &mut Console<R, W>,
    path: &Path,
) -> Result<(), ArtifactError> {
    let text = fs::read_to_string(path).map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            ArtifactError::Missing(path.to_path_buf())
        } else {
            ArtifactError::Io(err)
        }
    })?;
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() <= PREVIEW_HEAD_LINES + PREVIEW_TAIL_LINES {
        for line in lines {
            console.say(format!("  | {line}"))?;
        }
        return Ok(());
    }
    for line in &lines[..PREVIEW_HEAD_LINES] {
        console.say(format!("  | {line}"))?;
    }
    console.say(format!(
        "  … {} lines skipped …",
        lines.len() - PREVIEW_HEAD_LINES - PREVIEW_TAIL_LINES
    ))?;
    for line in &lines[lines.len() - PREVIEW_TAIL_LINES..] {
        console.say(format!("  | {line}"))?;
    }
    Ok(())
}

fn open_in_viewer(path: &Path) -> std::io::Result<()> {
    let opener = if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    };
    Command::new(opener)
        .arg(path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
}

fn human_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;
    use tempfile::TempDir;

    fn scripted(input: &str) -> Console<Cursor<Vec<u8>>, Vec<u8>> {
        Console::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn kinds_classify_by_extension_only() {
        let cases = [
            ("cpu-flamegraph-20260101-010101.html", Some(ArtifactKind::FlameGraph)),
            ("recording-20260101-010101.jfr", Some(ArtifactKind::Recording)),
            ("thread-dump-20260101-010101.txt", Some(ArtifactKind::ThreadDump)),
            ("gc-20260101-010101.log", Some(ArtifactKind::GcLog)),
            ("telemetry-export-20260101-010101.json", Some(ArtifactKind::TelemetryExport)),
            ("notes.md", None),
            ("README", None),
        ];
        for (name, expected) in cases {
            assert_eq!(ArtifactKind::from_path(Path::new(name)), expected, "{name}");
        }
    }

    #[test]
    fn scan_lists_newest_first_and_skips_unknown_files() {
        let tmp = TempDir::new().unwrap();
        let old = tmp.path().join("old-dump.txt");
        let new = tmp.path().join("new-dump.txt");
        fs::write(&old, "old").unwrap();
        fs::write(&new, "new").unwrap();
        fs::write(tmp.path().join("ignore.bin"), "x").unwrap();

        let earlier = SystemTime::now() - Duration::from_secs(120);
        fs::File::options()
            .write(true)
            .open(&old)
            .unwrap()
            .set_modified(earlier)
            .unwrap();

        let artifacts = scan(tmp.path()).unwrap();
        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[0].path, new);
        assert_eq!(artifacts[1].path, old);
    }

    #[test]
    fn scan_of_missing_directory_is_empty_not_an_error() {
        let tmp = TempDir::new().unwrap();
        let artifacts = scan(&tmp.path().join("nope")).unwrap();
        assert!(artifacts.is_empty());
    }

    #[test]
    fn summary_line_counts_per_kind() {
        let tmp = TempDir::new().unwrap();
        for name in ["a.html", "b.html", "c.jfr", "d.log"] {
            fs::write(tmp.path().join(name), "x").unwrap();
        }
        let line = summary_line(&scan(tmp.path()).unwrap());
        assert_eq!(line, "flame graphs: 2, recordings: 1, gc logs: 1");
    }

    #[test]
    fn long_previews_are_clipped_head_and_tail() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("dump.txt");
        let body: String = (1..=50).map(|i| format!("line {i}\n")).collect();
        fs::write(&path, body).unwrap();

        let mut console = scripted("");
        preview(&mut console, &path).unwrap();
        let output = String::from_utf8(console.into_output()).unwrap();
        assert!(output.contains("| line 1\n"));
        assert!(output.contains("| line 50\n"));
        assert!(output.contains("… 20 lines skipped …"));
        assert!(!output.contains("| line 25\n"));
    }

    #[test]
    fn telemetry_summary_counts_event_types() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("telemetry-export-x.json");
        fs::write(
            &path,
            r#"{"recording":{"events":[
                {"type":"jdk.CPULoad","values":{"machineTotal":0.5}},
                {"type":"jdk.CPULoad","values":{"machineTotal":0.6}},
                {"type":"jdk.GCHeapSummary","values":{"heapUsed":1024}}
            ]}}"#,
        )
        .unwrap();

        let (total, counts) = telemetry_summary(&path).unwrap();
        assert_eq!(total, 3);
        assert_eq!(
            counts,
            vec![("jdk.CPULoad".to_string(), 2), ("jdk.GCHeapSummary".to_string(), 1)]
        );
    }

    #[test]
    fn telemetry_summary_rejects_non_export_json() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("other.json");
        fs::write(&path, r#"{"hello":"world"}"#).unwrap();
        assert!(telemetry_summary(&path).is_none());
    }

    #[test]
    fn missing_converter_is_reported_as_unavailable() {
        let tmp = TempDir::new().unwrap();
        let recording = tmp.path().join("r.jfr");
        fs::write(&recording, "jfr").unwrap();
        let err = convert_recording(&tmp.path().join("no-such-jfrconv"), &recording).unwrap_err();
        assert!(matches!(err, ArtifactError::ConverterUnavailable(_)));
    }

    #[test]
    fn browser_previews_and_returns_to_menu() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("thread-dump-1.txt"), "main waiting\n").unwrap();

        let mut console = scripted("1\n0\n");
        browse(&mut console, tmp.path(), Path::new("jfrconv")).unwrap();
        let output = String::from_utf8(console.into_output()).unwrap();
        assert!(output.contains("thread dumps: 1"));
        assert!(output.contains("| main waiting"));
        assert!(output.contains("back to the action menu"));
    }

    #[test]
    fn human_sizes_read_naturally() {
        assert_eq!(human_size(412), "412 B");
        assert_eq!(human_size(2048), "2.0 KB");
        assert_eq!(human_size(5 * 1024 * 1024), "5.0 MB");
    }
}
