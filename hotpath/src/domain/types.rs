//! Core domain types shared across the session pipeline.

use std::fmt;
use std::time::SystemTime;

/// Operating-system process identifier of a profiling target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pid(pub i32);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A JVM process that was offered for selection but not yet confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub pid: Pid,
    /// Short human-readable identity: jar name, main class, or executable.
    pub display_name: String,
    /// Full command line when readable, otherwise same as `display_name`.
    pub command_line: String,
}

/// The confirmed profiling target for the rest of the session.
///
/// Liveness is a point-in-time observation. Holders must re-check through
/// [`crate::lifecycle::ProcessControl`] before acting on the pid.
#[derive(Debug, Clone)]
pub struct TargetProcess {
    pub pid: Pid,
    pub display_name: String,
    pub command_line: String,
    pub discovered_at: SystemTime,
}

impl TargetProcess {
    pub fn from_candidate(candidate: Candidate) -> Self {
        Self {
            pid: candidate.pid,
            display_name: candidate.display_name,
            command_line: candidate.command_line,
            discovered_at: SystemTime::now(),
        }
    }
}

impl fmt::Display for TargetProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.pid, self.display_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pid_displays_as_bare_number() {
        assert_eq!(Pid(4821).to_string(), "4821");
    }

    #[test]
    fn target_display_includes_pid_and_name() {
        let target = TargetProcess::from_candidate(Candidate {
            pid: Pid(77),
            display_name: "orders.jar".into(),
            command_line: "java -jar orders.jar".into(),
        });
        assert_eq!(target.to_string(), "77 (orders.jar)");
    }
}
