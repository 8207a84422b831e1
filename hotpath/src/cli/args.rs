//! CLI argument definitions

use std::str::FromStr;

use clap::{ArgGroup, Parser, Subcommand};

use hotpath_common::{Framework, GcAlgorithm, LaunchMode, LaunchSpec};

#[derive(Debug, Parser)]
#[command(
    name = "hotpath",
    version,
    about = "Interactive JVM profiling sessions built on async-profiler",
    after_help = "\
EXAMPLES:
    hotpath                                       Start a profiling session
    hotpath list                                  List running JVMs and exit
    hotpath launch --jar app.jar                  Launch a jar ready for profiling
    hotpath launch --class com.example.Main --classpath build/classes
    hotpath launch --jar app.jar --heap 2g --gc zgc -- --port=8080"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Interactive profiling session against a running JVM (the default)
    Session,
    /// Start a JVM with instrumentation-friendly flags
    Launch(LaunchArgs),
    /// List running JVMs and exit
    List,
}

#[derive(Debug, clap::Args)]
#[command(group(ArgGroup::new("what").required(true).args(["jar", "class"])))]
pub struct LaunchArgs {
    /// Executable jar to run
    #[arg(long, value_name = "PATH")]
    pub jar: Option<String>,

    /// Main class to run
    #[arg(long, value_name = "CLASS")]
    pub class: Option<String>,

    /// Classpath for --class (defaults to the current directory)
    #[arg(long, requires = "class", value_name = "PATH")]
    pub classpath: Option<String>,

    /// Framework hint: spring-boot, quarkus or plain
    #[arg(long, default_value = "plain", value_parser = Framework::from_str)]
    pub framework: Framework,

    /// Heap size for both -Xms and -Xmx (e.g. 512m, 4g)
    #[arg(long, value_name = "SIZE")]
    pub heap: Option<String>,

    /// Active profile, carried in the framework's profile property
    #[arg(long, value_name = "NAME")]
    pub profile: Option<String>,

    /// Garbage collector: g1, zgc, parallel, serial or shenandoah
    #[arg(long, value_parser = GcAlgorithm::from_str)]
    pub gc: Option<GcAlgorithm>,

    /// Write unified GC logs to a rotating file next to the target
    #[arg(long)]
    pub gc_log: bool,

    /// Virtual-thread request handling plus pinning diagnostics
    #[arg(long)]
    pub virtual_threads: bool,

    /// Pass --enable-preview to the JVM
    #[arg(long)]
    pub enable_preview: bool,

    /// Arguments passed through to the application (after --)
    #[arg(last = true, value_name = "ARGS")]
    pub app_args: Vec<String>,
}

impl LaunchArgs {
    /// Builds the launch description. The argument group guarantees exactly
    /// one of `--jar` / `--class`.
    pub fn into_spec(self) -> LaunchSpec {
        let mode = match (self.jar, self.class) {
            (Some(jar), _) => LaunchMode::Jar(jar),
            (None, Some(class)) => LaunchMode::MainClass {
                class,
                classpath: self.classpath,
            },
            (None, None) => unreachable!("clap enforces the jar/class group"),
        };
        LaunchSpec {
            mode,
            framework: self.framework,
            heap: self.heap,
            profile: self.profile,
            gc: self.gc,
            gc_log: self.gc_log,
            virtual_threads: self.virtual_threads,
            enable_preview: self.enable_preview,
            app_args: self.app_args,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_subcommand_means_session() {
        let cli = Cli::try_parse_from(["hotpath"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn launch_requires_jar_or_class() {
        assert!(Cli::try_parse_from(["hotpath", "launch"]).is_err());
        assert!(Cli::try_parse_from(["hotpath", "launch", "--jar", "a.jar"]).is_ok());
        assert!(
            Cli::try_parse_from(["hotpath", "launch", "--jar", "a.jar", "--class", "Main"])
                .is_err()
        );
    }

    #[test]
    fn classpath_needs_class() {
        assert!(Cli::try_parse_from([
            "hotpath", "launch", "--jar", "a.jar", "--classpath", "lib"
        ])
        .is_err());
    }

    #[test]
    fn launch_spec_carries_everything_through() {
        let cli = Cli::try_parse_from([
            "hotpath",
            "launch",
            "--jar",
            "app.jar",
            "--framework",
            "spring-boot",
            "--heap",
            "2g",
            "--gc",
            "zgc",
            "--gc-log",
            "--",
            "--port=8080",
        ])
        .unwrap();
        let Some(Commands::Launch(args)) = cli.command else {
            panic!("expected launch");
        };
        let spec = args.into_spec();
        assert_eq!(spec.mode, LaunchMode::Jar("app.jar".to_string()));
        assert_eq!(spec.framework, Framework::SpringBoot);
        assert_eq!(spec.heap.as_deref(), Some("2g"));
        assert_eq!(spec.gc, Some(GcAlgorithm::Zgc));
        assert!(spec.gc_log);
        assert_eq!(spec.app_args, ["--port=8080"]);
    }

    #[test]
    fn bad_gc_name_is_rejected_with_the_expected_hint() {
        let err = Cli::try_parse_from(["hotpath", "launch", "--jar", "a.jar", "--gc", "cms"])
            .unwrap_err();
        assert!(err.to_string().contains("unknown GC algorithm"));
    }
}
