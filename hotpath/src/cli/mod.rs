//! Command-line surface.

mod args;

pub use args::{Cli, Commands, LaunchArgs};
