//! Domain model: target identity and the session error taxonomy.

pub mod errors;
pub mod types;

pub use errors::{
    ActionError, ArtifactError, DiscoveryError, LifecycleError, ProvisionError, Remediation,
};
pub use types::{Candidate, Pid, TargetProcess};
