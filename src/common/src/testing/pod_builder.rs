//! Fluent builder for pod snapshots used in tests.

use crate::cluster::{ContainerStatus, PodPhase, PodSnapshot};

#[derive(Debug, Clone)]
pub struct PodBuilder {
    pod: PodSnapshot,
}

impl PodBuilder {
    /// A `Running` pod with no labels and no container statuses.
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            pod: PodSnapshot {
                namespace: namespace.to_string(),
                name: name.to_string(),
                phase: PodPhase::Running,
                ..Default::default()
            },
        }
    }

    pub fn phase(mut self, phase: PodPhase) -> Self {
        self.pod.phase = phase;
        self
    }

    pub fn running(self) -> Self {
        self.phase(PodPhase::Running)
    }

    pub fn pending(self) -> Self {
        self.phase(PodPhase::Pending)
    }

    /// `Failed` phase with the given `status.reason` (may be empty).
    pub fn failed(mut self, reason: &str) -> Self {
        self.pod.phase = PodPhase::Failed;
        self.pod.reason = reason.to_string();
        self
    }

    pub fn label(mut self, key: &str, value: &str) -> Self {
        self.pod.labels.insert(key.to_string(), value.to_string());
        self
    }

    /// Add a container waiting with `reason`.
    pub fn waiting(mut self, container: &str, reason: &str) -> Self {
        self.pod.container_statuses.push(ContainerStatus {
            name: container.to_string(),
            waiting_reason: Some(reason.to_string()),
        });
        self
    }

    /// Add a container that is not waiting.
    pub fn ready(mut self, container: &str) -> Self {
        self.pod.container_statuses.push(ContainerStatus {
            name: container.to_string(),
            waiting_reason: None,
        });
        self
    }

    pub fn build(self) -> PodSnapshot {
        self.pod
    }
}
