//! # hotpath - Interactive JVM Profiling Sessions
//!
//! hotpath drives async-profiler and the JDK serviceability tools against a
//! running JVM through a guided, menu-driven session: pick a target, say
//! what you are chasing, collect flame graphs / flight recordings / GC logs
//! / thread dumps into one results directory, and optionally wind the
//! target down when you are done.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          Target JVM                              │
//! └────────┬───────────────────────┬───────────────────┬─────────────┘
//!          │ attach mechanism      │ attach socket     │ /proc, signals
//!          ▼                       ▼                   ▼
//! ┌────────────────┐   ┌─────────────────────┐   ┌─────────────┐
//! │ asprof         │   │ jcmd jstack jstat   │   │  lifecycle  │
//! │ (sampling)     │   │ jfr (serviceability)│   │ (terminate) │
//! └────────┬───────┘   └──────────┬──────────┘   └──────┬──────┘
//!          │ flame graphs         │ recordings,         │ outcome
//!          │ heatmaps             │ dumps, GC logs      │
//!          ▼                      ▼                     ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      hotpath (this crate)                        │
//! │                                                                  │
//! │  ┌───────────┐  ┌───────────┐  ┌──────────┐  ┌───────────┐   │
//! │  │ provision │─▶│ discovery │─▶│ session  │─▶│  actions  │   │
//! │  │ (install) │  │ (pick JVM)│  │ (menu)   │  │ (handlers)│   │
//! │  └───────────┘  └───────────┘  └──────────┘  └─────┬─────┘   │
//! │                                                      ▼          │
//! │                                               ┌───────────┐    │
//! │                                               │ artifacts │    │
//! │                                               │ (browse)  │    │
//! │                                               └───────────┘    │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`session`]: the interactive controller and its action menu
//!   - state machine: select target, menu loop, liveness re-checks, reattach
//!   - `menu`: fixed catalog with stable numbers, problem-category reordering
//!
//! - [`actions`]: one handler per catalog entry
//!   - `sampler`: asprof flame graphs, heatmaps, icicles, method tracing
//!   - `recording`: named flight recordings over `jcmd JFR.start/stop`
//!   - `gclog` / `threaddump`: ordered fallback strategies (dynamic unified
//!     logging, counter polling; jstack, sampler traces)
//!   - `telemetry`: short recording exported as JSON via `jfr print`
//!
//! - [`provision`]: download, verify and cache the async-profiler release
//!   for this platform (HTTP client with a curl fallback)
//!
//! - [`discovery`]: find JVMs via `jps -l` with a `/proc` fallback, validate
//!   targets, rediscover a restarted one by name
//!
//! - [`artifacts`]: scan the results directory, previews, conversions,
//!   telemetry summaries
//!
//! - [`lifecycle`]: guarded SIGTERM/SIGKILL flows with escalation prompts
//!
//! - [`tools`]: thin process wrappers around `asprof` and the JDK binaries,
//!   plus failure classification into actionable remediations
//!
//! - [`console`]: prompt/confirm/select primitives over generic reader and
//!   writer pairs so whole sessions run under test with scripted input
//!
//! - [`preflight`] / [`launch`] / [`cli`] / [`domain`]: checks, the
//!   instrumented launcher, argument definitions, shared types and errors
//!
//! ## Collection Methods
//!
//! Three complementary mechanisms, picked per menu entry:
//!
//! 1. **Native sampling** (asprof): perf-event or timer CPU samples,
//!    allocation and lock profiles, rendered as flame graphs. Low overhead,
//!    needs an attachable process and often kernel perf access.
//! 2. **Flight recording** (`jcmd JFR.start`): the JVM records itself, any
//!    event set, survives operator disconnects. Heavier formats, needs a
//!    full JDK on the target host.
//! 3. **Serviceability tools** (`jstack`, `jstat`, `VM.log`): thread dumps
//!    and GC visibility where neither sampler nor recorder is available.
//!
//! Actions that depend on an unavailable mechanism degrade with a printed
//! remediation instead of ending the session.
//!
//! ## Typical Usage
//!
//! ```bash
//! # Interactive session against a running JVM
//! hotpath
//!
//! # Launch an application ready for profiling, then attach from another shell
//! hotpath launch --jar app.jar --heap 2g --gc zgc
//!
//! # Just list attachable JVMs
//! hotpath list
//! ```
//!
//! ## Key Concepts
//!
//! - **Flame graph**: merged stack visualization; width = time (or bytes)
//! - **JFR**: JDK Flight Recorder, the JVM's built-in event recorder
//! - **TLAB**: thread-local allocation buffer; outside-TLAB allocations are
//!   the expensive ones worth watching
//! - **Attach mechanism**: the `/tmp/.java_pid<pid>` socket the JVM opens
//!   for same-user diagnostic clients
//! - **perf events**: kernel sampling interface; containers often block it,
//!   which is what the timer-based fallback is for

// Expose modules for testing
pub mod actions;
pub mod artifacts;
pub mod cli;
pub mod console;
pub mod discovery;
pub mod domain;
pub mod launch;
pub mod lifecycle;
pub mod preflight;
pub mod provision;
pub mod session;
pub mod tools;
