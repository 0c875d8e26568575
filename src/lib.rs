pub mod config;
pub mod disaster;
pub mod lifecycle;
pub mod logging;
pub mod server;

// Re-export for main.rs and integration tests
pub use crate::config::{Config, ConfigError, LogFormat, Mode};
pub use crate::disaster::{DisasterFlag, MetadataSource};
pub use crate::lifecycle::{
    run, LifecycleError, LifecycleState, Phase, ShutdownSignals, Supervisor,
};
