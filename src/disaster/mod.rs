//! Annotation-driven disaster simulation
//!
//! A background poller reads this pod's own metadata from the Kubernetes API
//! and flips a shared flag whenever the `disaster` annotation appears or
//! disappears. Request handlers only ever read the flag.
//!
//! ```text
//! kubectl annotate pod <name> disaster=true     # start failing
//! kubectl annotate pod <name> disaster-         # recover
//! ```

mod flag;
mod poller;
mod source;

pub use flag::DisasterFlag;
pub use poller::{poll_once, run_poller, PollError};
pub use source::{has_disaster_marker, MetadataSource, PodMetadata, DISASTER_ANNOTATION};

#[cfg(test)]
#[path = "poller_test.rs"]
mod tests;
