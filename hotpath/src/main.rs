//! # hotpath - Main Entry Point
//!
//! Three entry points off one binary:
//! - **session** (the default): interactive profiling against a running JVM
//! - **launch**: start a JVM with instrumentation-friendly flags
//! - **list**: print attachable JVMs and exit

use anyhow::Result;
use clap::Parser;

use hotpath::cli::{Cli, Commands};
use hotpath::discovery;
use hotpath::domain::Pid;
use hotpath::launch;
use hotpath::session::SessionController;
use hotpath::tools::JdkTools;

// Exit codes; clap exits 2 on usage errors by itself
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_NOPERM: i32 = 77;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            exit_code_for(&e)
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    let msg = format!("{err:#}").to_lowercase();
    if msg.contains("permission denied") || msg.contains("operation not permitted") {
        EXIT_NOPERM
    } else {
        EXIT_ERROR
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        None | Some(Commands::Session) => SessionController::stdio().run(),
        Some(Commands::Launch(args)) => launch::run(&args.into_spec()),
        Some(Commands::List) => list_jvms(),
    }
}

/// `hotpath list`: one line per attachable JVM.
fn list_jvms() -> Result<()> {
    let jdk = JdkTools::from_path();
    let own_pid = Pid(i32::try_from(std::process::id()).unwrap_or(i32::MAX));
    let candidates = discovery::discover(&jdk, own_pid)?;
    if candidates.is_empty() {
        println!("no running JVMs found");
        return Ok(());
    }
    for candidate in candidates {
        println!("{:>7}  {}", candidate.pid, candidate.display_name);
    }
    Ok(())
}
