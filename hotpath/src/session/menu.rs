//! The action menu: a fixed catalog with stable numbers, an optional
//! problem-category hint that reorders (never hides) entries, and the
//! prompts that turn a chosen number into a fully parameterized
//! [`ProfilingAction`].

use std::io::{self, BufRead, Write};

use hotpath_common::{EventToggle, RecordingSpec, RetentionPolicy};

use crate::actions::{
    parse_duration_secs, ProfilingAction, DEFAULT_GC_LOG_SECS, DEFAULT_RECORDING_SECS,
    DEFAULT_SAMPLE_SECS,
};
use crate::console::Console;

/// What the operator is chasing. Only affects menu ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemCategory {
    Cpu,
    Memory,
    Latency,
    Gc,
}

pub struct MenuEntry {
    /// Stable number; remediation texts reference these, so renumbering is
    /// an interface change.
    pub number: usize,
    pub title: &'static str,
    pub recommended_for: &'static [ProblemCategory],
}

use ProblemCategory::{Cpu, Gc, Latency, Memory};

pub const CATALOG: &[MenuEntry] = &[
    MenuEntry { number: 1, title: "CPU flame graph (30s)", recommended_for: &[Cpu] },
    MenuEntry { number: 2, title: "allocation flame graph (30s)", recommended_for: &[Memory] },
    MenuEntry { number: 3, title: "lock contention flame graph (30s)", recommended_for: &[Latency] },
    MenuEntry { number: 4, title: "wall-clock flame graph (30s, includes blocked time)", recommended_for: &[Latency] },
    MenuEntry { number: 5, title: "native memory flame graph (30s)", recommended_for: &[Memory] },
    MenuEntry { number: 6, title: "inverted CPU flame graph (30s, callees on top)", recommended_for: &[Cpu] },
    MenuEntry { number: 7, title: "CPU flame graph, custom duration", recommended_for: &[Cpu] },
    MenuEntry { number: 8, title: "leak-detection flame graph (30s, live objects only)", recommended_for: &[Memory] },
    MenuEntry { number: 9, title: "full memory workflow (three graphs + a recording)", recommended_for: &[Memory] },
    MenuEntry { number: 10, title: "structured recording (curated events)", recommended_for: &[Cpu, Latency] },
    MenuEntry { number: 11, title: "CPU heatmap (time on the x-axis)", recommended_for: &[Cpu] },
    MenuEntry { number: 12, title: "all-events recording (profile preset, heavier)", recommended_for: &[] },
    MenuEntry { number: 13, title: "telemetry export (JSON metrics capture)", recommended_for: &[] },
    MenuEntry { number: 14, title: "enhanced memory recording", recommended_for: &[Memory] },
    MenuEntry { number: 15, title: "CPU-time flame graph (timer-based, no perf events)", recommended_for: &[Cpu] },
    MenuEntry { number: 16, title: "method trace (one method, every invocation)", recommended_for: &[Latency] },
    MenuEntry { number: 17, title: "custom recording (pick events and retention)", recommended_for: &[] },
    MenuEntry { number: 18, title: "allocation-buffer leak analysis (TLAB + old objects)", recommended_for: &[Memory, Gc] },
    MenuEntry { number: 19, title: "GC log collection", recommended_for: &[Gc] },
    MenuEntry { number: 20, title: "thread dump", recommended_for: &[Latency] },
    MenuEntry { number: 21, title: "browse collected artifacts", recommended_for: &[] },
    MenuEntry { number: 22, title: "terminate the target process", recommended_for: &[] },
];

/// Catalog order for display: recommended entries first (catalog order
/// within each half). Every entry is always present.
pub fn display_order(hint: Option<ProblemCategory>) -> Vec<&'static MenuEntry> {
    let Some(category) = hint else {
        return CATALOG.iter().collect();
    };
    let (recommended, rest): (Vec<_>, Vec<_>) = CATALOG
        .iter()
        .partition(|entry| entry.recommended_for.contains(&category));
    recommended.into_iter().chain(rest).collect()
}

pub fn prompt_problem_category<R: BufRead, W: Write>(
    console: &mut Console<R, W>,
) -> io::Result<Option<ProblemCategory>> {
    console.say("what are you chasing? (reorders the menu, hides nothing)")?;
    console.say("  1) CPU usage")?;
    console.say("  2) memory growth")?;
    console.say("  3) latency or stalls")?;
    console.say("  4) GC pressure")?;
    console.say("  0) skip")?;
    Ok(match console.select_index("category: ", 4)? {
        1 => Some(Cpu),
        2 => Some(Memory),
        3 => Some(Latency),
        4 => Some(Gc),
        _ => None,
    })
}

pub fn print_menu<R: BufRead, W: Write>(
    console: &mut Console<R, W>,
    hint: Option<ProblemCategory>,
) -> io::Result<()> {
    console.blank()?;
    console.say("actions:")?;
    for entry in display_order(hint) {
        let marker = if hint.is_some_and(|h| entry.recommended_for.contains(&h)) {
            "  ← recommended"
        } else {
            ""
        };
        console.say(format!("  {:>2}) {}{marker}", entry.number, entry.title))?;
    }
    console.say("   0) end session")?;
    Ok(())
}

/// Reads one action number and collects that action's parameters.
pub fn prompt_action<R: BufRead, W: Write>(
    console: &mut Console<R, W>,
) -> io::Result<ProfilingAction> {
    let choice = console.select_index("action: ", CATALOG.len())?;
    build_action(choice, console)
}

fn build_action<R: BufRead, W: Write>(
    choice: usize,
    console: &mut Console<R, W>,
) -> io::Result<ProfilingAction> {
    use ProfilingAction::{
        AdvancedCustomRecording, AllEvents, AllocSample, AllocationBufferLeakAnalysis,
        CompositeMemoryWorkflow, CpuSample, CpuTimeSampling, CustomDurationCpu,
        EnhancedMemoryRecording, Exit, GcLogCollection, Heatmap, InvertedFlame, LeakDetection,
        ListArtifacts, LockSample, MethodTracing, NativeMemory, StructuredRecording,
        TelemetryExport, TerminateProcess, ThreadDump, WallClock,
    };

    Ok(match choice {
        0 => Exit,
        1 => CpuSample { secs: DEFAULT_SAMPLE_SECS },
        2 => AllocSample { secs: DEFAULT_SAMPLE_SECS },
        3 => LockSample { secs: DEFAULT_SAMPLE_SECS },
        4 => WallClock { secs: DEFAULT_SAMPLE_SECS },
        5 => NativeMemory { secs: DEFAULT_SAMPLE_SECS },
        6 => InvertedFlame { secs: DEFAULT_SAMPLE_SECS },
        7 => CustomDurationCpu {
            secs: prompt_secs(console, "sampling duration", DEFAULT_SAMPLE_SECS)?,
        },
        8 => LeakDetection { secs: DEFAULT_SAMPLE_SECS },
        9 => CompositeMemoryWorkflow {
            secs: prompt_secs(console, "per-step duration", DEFAULT_SAMPLE_SECS)?,
        },
        10 => StructuredRecording {
            secs: prompt_secs(console, "recording duration", DEFAULT_RECORDING_SECS)?,
        },
        11 => Heatmap {
            secs: prompt_secs(console, "sampling duration", DEFAULT_RECORDING_SECS)?,
        },
        12 => AllEvents {
            secs: prompt_secs(console, "recording duration", DEFAULT_RECORDING_SECS)?,
        },
        13 => TelemetryExport {
            secs: prompt_secs(console, "capture duration", DEFAULT_SAMPLE_SECS)?,
        },
        14 => EnhancedMemoryRecording {
            secs: prompt_secs(console, "recording duration", DEFAULT_RECORDING_SECS)?,
        },
        15 => CpuTimeSampling { secs: DEFAULT_SAMPLE_SECS },
        16 => {
            let pattern = prompt_method_pattern(console)?;
            let secs = prompt_secs(console, "tracing duration", DEFAULT_SAMPLE_SECS)?;
            MethodTracing { pattern, secs }
        }
        17 => {
            let spec = prompt_recording_spec(console)?;
            let secs = prompt_secs(console, "recording duration", DEFAULT_RECORDING_SECS)?;
            AdvancedCustomRecording { spec, secs }
        }
        18 => AllocationBufferLeakAnalysis {
            secs: prompt_secs(console, "recording duration", DEFAULT_RECORDING_SECS)?,
        },
        19 => GcLogCollection {
            secs: prompt_secs(console, "collection window", DEFAULT_GC_LOG_SECS)?,
        },
        20 => ThreadDump,
        21 => ListArtifacts,
        22 => TerminateProcess,
        _ => unreachable!("select_index is capped at the catalog size"),
    })
}

fn prompt_secs<R: BufRead, W: Write>(
    console: &mut Console<R, W>,
    label: &str,
    default: u32,
) -> io::Result<u32> {
    let raw = console.prompt(&format!("{label} [{default}s]: "))?;
    let (secs, warned) = parse_duration_secs(&raw, default);
    if warned {
        console.say(format!("  invalid duration {raw:?}; using {default}s"))?;
    }
    Ok(secs)
}

fn prompt_u32<R: BufRead, W: Write>(
    console: &mut Console<R, W>,
    label: &str,
    default: u32,
) -> io::Result<u32> {
    let raw = console.prompt(&format!("{label} [{default}]: "))?;
    let (value, warned) = parse_duration_secs(&raw, default);
    if warned {
        console.say(format!("  invalid number {raw:?}; using {default}"))?;
    }
    Ok(value)
}

fn prompt_method_pattern<R: BufRead, W: Write>(
    console: &mut Console<R, W>,
) -> io::Result<String> {
    loop {
        let raw = console.prompt("method to trace (e.g. com.example.OrderService.submit): ")?;
        if !raw.is_empty() {
            return Ok(raw);
        }
        console.say("  a fully qualified method name is required")?;
    }
}

fn prompt_recording_spec<R: BufRead, W: Write>(
    console: &mut Console<R, W>,
) -> io::Result<RecordingSpec> {
    console.say("events, comma separated (blank takes the curated default set)")?;
    let raw = console.prompt("events: ")?;
    if raw.is_empty() {
        console.say("  using the curated default events and retention")?;
        return Ok(RecordingSpec::structured_default());
    }

    let threshold = console.prompt("threshold for these events (e.g. 10ms, blank for none): ")?;
    let stacks = console.confirm("record stack traces for them?")?;
    let max_size_mb = prompt_u32(console, "max recording size in MB", 250)?;
    let max_age = console.prompt("max event age (e.g. 4h, blank for none): ")?;

    let events = raw
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            let mut toggle = EventToggle::enabled(name).with_stack_trace(stacks);
            if !threshold.is_empty() {
                toggle = toggle.with_threshold(&threshold);
            }
            toggle
        })
        .collect();

    Ok(RecordingSpec {
        settings: None,
        events,
        retention: RetentionPolicy {
            max_size_mb: Some(max_size_mb),
            max_age: if max_age.is_empty() { None } else { Some(max_age) },
        },
        gc_roots: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn scripted(input: &str) -> Console<Cursor<Vec<u8>>, Vec<u8>> {
        Console::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn catalog_numbers_are_dense_and_stable() {
        assert_eq!(CATALOG.len(), 22);
        for (index, entry) in CATALOG.iter().enumerate() {
            assert_eq!(entry.number, index + 1);
        }
    }

    #[test]
    fn hints_reorder_without_dropping_entries() {
        let ordered = display_order(Some(Memory));
        assert_eq!(ordered.len(), CATALOG.len());

        let recommended: Vec<usize> = ordered
            .iter()
            .take_while(|e| e.recommended_for.contains(&Memory))
            .map(|e| e.number)
            .collect();
        assert_eq!(recommended, vec![2, 5, 8, 9, 14, 18]);

        let mut numbers: Vec<usize> = ordered.iter().map(|e| e.number).collect();
        numbers.sort_unstable();
        assert_eq!(numbers, (1..=22).collect::<Vec<_>>());
    }

    #[test]
    fn no_hint_keeps_catalog_order() {
        let ordered = display_order(None);
        let numbers: Vec<usize> = ordered.iter().map(|e| e.number).collect();
        assert_eq!(numbers, (1..=22).collect::<Vec<_>>());
    }

    #[test]
    fn recommended_marker_follows_the_hint() {
        let mut console = scripted("");
        print_menu(&mut console, Some(Gc)).unwrap();
        let output = String::from_utf8(console.into_output()).unwrap();
        assert!(output.contains("19) GC log collection  ← recommended"));
        assert!(output.contains("1) CPU flame graph (30s)\n"));
    }

    #[test]
    fn fixed_duration_actions_need_no_prompts() {
        let mut console = scripted("");
        assert_eq!(
            build_action(1, &mut console).unwrap(),
            ProfilingAction::CpuSample { secs: 30 }
        );
        assert_eq!(build_action(20, &mut console).unwrap(), ProfilingAction::ThreadDump);
        assert_eq!(build_action(0, &mut console).unwrap(), ProfilingAction::Exit);
    }

    #[test]
    fn custom_duration_prompts_and_validates() {
        let mut console = scripted("45\n");
        assert_eq!(
            build_action(7, &mut console).unwrap(),
            ProfilingAction::CustomDurationCpu { secs: 45 }
        );

        let mut console = scripted("abc\n");
        assert_eq!(
            build_action(7, &mut console).unwrap(),
            ProfilingAction::CustomDurationCpu { secs: 30 }
        );
        let output = String::from_utf8(console.into_output()).unwrap();
        assert!(output.contains("invalid duration \"abc\"; using 30s"));
    }

    #[test]
    fn method_tracing_requires_a_pattern() {
        let mut console = scripted("\ncom.example.OrderService.submit\n\n");
        let action = build_action(16, &mut console).unwrap();
        assert_eq!(
            action,
            ProfilingAction::MethodTracing {
                pattern: "com.example.OrderService.submit".to_string(),
                secs: 30,
            }
        );
        let output = String::from_utf8(console.into_output()).unwrap();
        assert!(output.contains("fully qualified method name is required"));
    }

    #[test]
    fn custom_recording_collects_events_and_retention() {
        let mut console = scripted("jdk.FileRead, jdk.SocketRead\n10ms\ny\n100\n2h\n90\n");
        let action = build_action(17, &mut console).unwrap();
        let ProfilingAction::AdvancedCustomRecording { spec, secs } = action else {
            panic!("wrong variant");
        };
        assert_eq!(secs, 90);
        let options = spec.jcmd_start_options("r");
        assert!(options.contains(&"jdk.FileRead#enabled=true".to_string()));
        assert!(options.contains(&"jdk.FileRead#threshold=10ms".to_string()));
        assert!(options.contains(&"jdk.SocketRead#stackTrace=true".to_string()));
        assert!(options.contains(&"maxsize=100M".to_string()));
        assert!(options.contains(&"maxage=2h".to_string()));
    }

    #[test]
    fn blank_custom_recording_takes_the_curated_default() {
        let mut console = scripted("\n60\n");
        let action = build_action(17, &mut console).unwrap();
        let ProfilingAction::AdvancedCustomRecording { spec, .. } = action else {
            panic!("wrong variant");
        };
        assert!(spec
            .jcmd_start_options("r")
            .contains(&"jdk.ExecutionSample#enabled=true".to_string()));
    }

    #[test]
    fn category_prompt_maps_numbers_and_skip() {
        let mut console = scripted("2\n");
        assert_eq!(prompt_problem_category(&mut console).unwrap(), Some(Memory));
        let mut console = scripted("0\n");
        assert_eq!(prompt_problem_category(&mut console).unwrap(), None);
    }
}
