//! # Shared JVM Contract Types
//!
//! Defines the option syntax hotpath speaks to the JVM toolchain, shared by
//! both CLI surfaces:
//!
//! - **Launch flag model** — [`LaunchSpec`] renders a `java` command line with
//!   instrumentation-friendly flags (accurate sampling needs
//!   `-XX:+DebugNonSafepoints`, see async-profiler docs).
//! - **Recording option model** — [`RecordingSpec`] renders the option list for
//!   `jcmd <pid> JFR.start`: per-event toggles (enable / threshold / stack
//!   trace), retention bounds (max size / max age), and optional settings
//!   presets.
//!
//! Everything here is pure string construction so both surfaces can be unit
//! tested without a JVM.

use std::fmt;
use std::str::FromStr;

// ============================================================================
// Launch flag model
// ============================================================================

/// Garbage collector selection, rendered as the matching `-XX:+Use*GC` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcAlgorithm {
    G1,
    Zgc,
    Parallel,
    Serial,
    Shenandoah,
}

impl GcAlgorithm {
    /// The JVM flag enabling this collector.
    pub fn flag(self) -> &'static str {
        match self {
            GcAlgorithm::G1 => "-XX:+UseG1GC",
            GcAlgorithm::Zgc => "-XX:+UseZGC",
            GcAlgorithm::Parallel => "-XX:+UseParallelGC",
            GcAlgorithm::Serial => "-XX:+UseSerialGC",
            GcAlgorithm::Shenandoah => "-XX:+UseShenandoahGC",
        }
    }
}

impl FromStr for GcAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "g1" => Ok(GcAlgorithm::G1),
            "zgc" => Ok(GcAlgorithm::Zgc),
            "parallel" => Ok(GcAlgorithm::Parallel),
            "serial" => Ok(GcAlgorithm::Serial),
            "shenandoah" => Ok(GcAlgorithm::Shenandoah),
            other => Err(format!(
                "unknown GC algorithm '{other}' (expected g1, zgc, parallel, serial or shenandoah)"
            )),
        }
    }
}

impl fmt::Display for GcAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GcAlgorithm::G1 => "g1",
            GcAlgorithm::Zgc => "zgc",
            GcAlgorithm::Parallel => "parallel",
            GcAlgorithm::Serial => "serial",
            GcAlgorithm::Shenandoah => "shenandoah",
        };
        f.write_str(name)
    }
}

/// Framework hint: decides which system property carries the active profile
/// and whether a virtual-thread toggle exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Framework {
    SpringBoot,
    Quarkus,
    #[default]
    Plain,
}

impl Framework {
    /// System property naming the active profile for this framework.
    ///
    /// Plain applications get the `app.profile` convention so the value is
    /// still visible in the target's system properties.
    pub fn profile_property(self) -> &'static str {
        match self {
            Framework::SpringBoot => "spring.profiles.active",
            Framework::Quarkus => "quarkus.profile",
            Framework::Plain => "app.profile",
        }
    }

    /// Property that switches request handling onto virtual threads, where the
    /// framework has a global toggle.
    pub fn virtual_threads_property(self) -> Option<&'static str> {
        match self {
            Framework::SpringBoot => Some("spring.threads.virtual.enabled"),
            Framework::Quarkus | Framework::Plain => None,
        }
    }
}

impl FromStr for Framework {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "spring-boot" | "spring" => Ok(Framework::SpringBoot),
            "quarkus" => Ok(Framework::Quarkus),
            "plain" | "none" => Ok(Framework::Plain),
            other => Err(format!(
                "unknown framework '{other}' (expected spring-boot, quarkus or plain)"
            )),
        }
    }
}

/// What to run: an executable jar or a main class on a classpath.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchMode {
    Jar(String),
    MainClass { class: String, classpath: Option<String> },
}

/// A fully described `java` launch.
///
/// `java_args` always injects `-XX:+UnlockDiagnosticVMOptions
/// -XX:+DebugNonSafepoints` so a later profiling session gets accurate stack
/// attribution without restarting the target.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub mode: LaunchMode,
    pub framework: Framework,
    /// Heap size applied to both `-Xms` and `-Xmx` (e.g. `512m`, `4g`).
    pub heap: Option<String>,
    /// Active profile, carried in the framework's profile property.
    pub profile: Option<String>,
    pub gc: Option<GcAlgorithm>,
    /// Unified GC logging to a rotating `gc-%t.log` next to the target.
    pub gc_log: bool,
    /// Virtual-thread request handling plus pinning diagnostics.
    pub virtual_threads: bool,
    pub enable_preview: bool,
    /// Arguments passed through to the application after the mode tokens.
    pub app_args: Vec<String>,
}

impl LaunchSpec {
    /// Render the argument vector for `java`, JVM options first, then the
    /// mode tokens, then the application arguments.
    pub fn java_args(&self) -> Vec<String> {
        let mut args = vec![
            "-XX:+UnlockDiagnosticVMOptions".to_string(),
            "-XX:+DebugNonSafepoints".to_string(),
        ];

        if let Some(heap) = &self.heap {
            args.push(format!("-Xms{heap}"));
            args.push(format!("-Xmx{heap}"));
        }
        if let Some(gc) = self.gc {
            args.push(gc.flag().to_string());
        }
        if self.gc_log {
            args.push(
                "-Xlog:gc*:file=gc-%t.log:time,uptime,level,tags:filecount=5,filesize=20m"
                    .to_string(),
            );
        }
        if self.enable_preview {
            args.push("--enable-preview".to_string());
        }
        if let Some(profile) = &self.profile {
            args.push(format!("-D{}={profile}", self.framework.profile_property()));
        }
        if self.virtual_threads {
            if let Some(prop) = self.framework.virtual_threads_property() {
                args.push(format!("-D{prop}=true"));
            }
            // Pinned carrier threads are the thing to look for when profiling
            // a virtual-thread workload.
            args.push("-Djdk.tracePinnedThreads=short".to_string());
        }

        match &self.mode {
            LaunchMode::Jar(path) => {
                args.push("-jar".to_string());
                args.push(path.clone());
            }
            LaunchMode::MainClass { class, classpath } => {
                args.push("-cp".to_string());
                args.push(classpath.clone().unwrap_or_else(|| ".".to_string()));
                args.push(class.clone());
            }
        }

        args.extend(self.app_args.iter().cloned());
        args
    }
}

// ============================================================================
// Recording option model (jcmd JFR.start syntax)
// ============================================================================

/// A single flight-recorder event toggle.
///
/// Rendered as `jcmd` event options, e.g.
/// `jdk.JavaMonitorEnter#threshold=10ms jdk.JavaMonitorEnter#stackTrace=true`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventToggle {
    pub name: String,
    pub enabled: bool,
    pub threshold: Option<String>,
    pub stack_trace: Option<bool>,
}

impl EventToggle {
    pub fn enabled(name: &str) -> Self {
        Self { name: name.to_string(), enabled: true, threshold: None, stack_trace: None }
    }

    #[must_use]
    pub fn with_threshold(mut self, threshold: &str) -> Self {
        self.threshold = Some(threshold.to_string());
        self
    }

    #[must_use]
    pub fn with_stack_trace(mut self, on: bool) -> Self {
        self.stack_trace = Some(on);
        self
    }

    fn render_into(&self, out: &mut Vec<String>) {
        out.push(format!("{}#enabled={}", self.name, self.enabled));
        if let Some(threshold) = &self.threshold {
            out.push(format!("{}#threshold={threshold}", self.name));
        }
        if let Some(on) = self.stack_trace {
            out.push(format!("{}#stackTrace={on}", self.name));
        }
    }
}

/// Recording retention bounds (`maxsize` / `maxage`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub max_size_mb: Option<u32>,
    /// jcmd age syntax, e.g. `4h`, `30m`.
    pub max_age: Option<String>,
}

impl RetentionPolicy {
    fn render_into(&self, out: &mut Vec<String>) {
        if let Some(mb) = self.max_size_mb {
            out.push(format!("maxsize={mb}M"));
        }
        if let Some(age) = &self.max_age {
            out.push(format!("maxage={age}"));
        }
    }
}

/// Everything needed to start one named flight recording.
///
/// When `settings` is `None` the JVM applies `default.jfc` and the event
/// toggles layer on top of it, which is how the curated presets below get
/// low-overhead baselines plus the events they actually care about.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordingSpec {
    /// Built-in settings preset (`default`, `profile`) or none.
    pub settings: Option<&'static str>,
    pub events: Vec<EventToggle>,
    pub retention: RetentionPolicy,
    /// Track allocation paths back to GC roots (expensive; leak analysis only).
    pub gc_roots: bool,
}

impl RecordingSpec {
    /// Option list for `jcmd <pid> JFR.start`, starting with `name=<name>`.
    pub fn jcmd_start_options(&self, name: &str) -> Vec<String> {
        let mut out = vec![format!("name={name}")];
        if let Some(settings) = self.settings {
            out.push(format!("settings={settings}"));
        }
        if self.gc_roots {
            out.push("path-to-gc-roots=true".to_string());
        }
        self.retention.render_into(&mut out);
        for toggle in &self.events {
            toggle.render_into(&mut out);
        }
        out
    }

    /// Curated default: execution samples, contended monitors and parks above
    /// 10ms with stacks, throttled allocation samples. Bounded at 250 MB / 4 h.
    pub fn structured_default() -> Self {
        Self {
            settings: None,
            events: vec![
                EventToggle::enabled("jdk.ExecutionSample"),
                EventToggle::enabled("jdk.JavaMonitorEnter")
                    .with_threshold("10ms")
                    .with_stack_trace(true),
                EventToggle::enabled("jdk.ThreadPark").with_threshold("10ms"),
                EventToggle::enabled("jdk.ObjectAllocationSample"),
            ],
            retention: RetentionPolicy { max_size_mb: Some(250), max_age: Some("4h".to_string()) },
            gc_roots: false,
        }
    }

    /// The JVM's own `profile` settings: every profiling event the runtime
    /// ships, at the overhead documented for that preset.
    pub fn profile_settings() -> Self {
        Self {
            settings: Some("profile"),
            events: Vec::new(),
            retention: RetentionPolicy { max_size_mb: Some(250), max_age: None },
            gc_roots: false,
        }
    }

    /// Memory-focused recording: allocation-buffer events with stacks plus
    /// old-object sampling over a default-settings baseline.
    pub fn enhanced_memory() -> Self {
        Self {
            settings: None,
            events: vec![
                EventToggle::enabled("jdk.ObjectAllocationInNewTLAB").with_stack_trace(true),
                EventToggle::enabled("jdk.ObjectAllocationOutsideTLAB").with_stack_trace(true),
                EventToggle::enabled("jdk.OldObjectSample"),
            ],
            retention: RetentionPolicy { max_size_mb: Some(500), max_age: None },
            gc_roots: false,
        }
    }

    /// Allocation-buffer leak analysis: TLAB events plus old-object samples
    /// with paths back to GC roots so survivors can be attributed.
    pub fn tlab_analysis() -> Self {
        Self {
            settings: None,
            events: vec![
                EventToggle::enabled("jdk.ObjectAllocationInNewTLAB").with_stack_trace(true),
                EventToggle::enabled("jdk.ObjectAllocationOutsideTLAB").with_stack_trace(true),
                EventToggle::enabled("jdk.OldObjectSample").with_stack_trace(true),
            ],
            retention: RetentionPolicy { max_size_mb: Some(500), max_age: None },
            gc_roots: true,
        }
    }

    /// Small capture of the runtime metrics worth exporting to a monitoring
    /// backend (CPU load, heap summaries, per-thread CPU).
    pub fn telemetry() -> Self {
        Self {
            settings: None,
            events: vec![
                EventToggle::enabled("jdk.CPULoad"),
                EventToggle::enabled("jdk.GCHeapSummary"),
                EventToggle::enabled("jdk.ThreadCPULoad"),
            ],
            retention: RetentionPolicy { max_size_mb: Some(50), max_age: None },
            gc_roots: false,
        }
    }
}
