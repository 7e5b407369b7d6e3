pub mod cli;
pub mod cluster;
pub mod config;
pub mod selector;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use cluster::{ContainerStatus, PodApi, PodPhase, PodSnapshot, Scope, TransportError};
pub use config::Configuration;
