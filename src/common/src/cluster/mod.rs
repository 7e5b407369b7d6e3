//! Cluster access for podsweep.
//!
//! The sweeper never talks to the Kubernetes API directly. It consumes the
//! [`PodApi`] capability, which exposes exactly two calls: list the pods
//! visible to a [`Scope`] and delete a single pod by namespace and name.
//!
//! - `kubernetes`: production implementation backed by `kube`
//! - `error`: transport error taxonomy shared by every implementation

pub mod error;
pub mod kubernetes;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use serde::{Deserialize, Serialize};

pub use error::TransportError;
pub use kubernetes::KubePodApi;

/// The set of pods a sweep is allowed to see.
///
/// An empty namespace selects every namespace; an empty label selector
/// disables label filtering.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scope {
    pub namespace: String,
    pub label_selector: String,
}

impl Scope {
    pub fn new(namespace: impl Into<String>, label_selector: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            label_selector: label_selector.into(),
        }
    }

    /// Scope covering every pod in the cluster.
    pub fn cluster_wide() -> Self {
        Self::default()
    }

    pub fn is_all_namespaces(&self) -> bool {
        self.namespace.is_empty()
    }

    pub fn has_label_selector(&self) -> bool {
        !self.label_selector.is_empty()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let namespace = if self.is_all_namespaces() {
            "<all namespaces>"
        } else {
            &self.namespace
        };
        if self.has_label_selector() {
            write!(f, "{namespace} [{}]", self.label_selector)
        } else {
            write!(f, "{namespace}")
        }
    }
}

/// Pod lifecycle phase as reported in `status.phase`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    #[default]
    Unknown,
}

impl PodPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            PodPhase::Pending => "Pending",
            PodPhase::Running => "Running",
            PodPhase::Succeeded => "Succeeded",
            PodPhase::Failed => "Failed",
            PodPhase::Unknown => "Unknown",
        }
    }
}

impl From<&str> for PodPhase {
    fn from(phase: &str) -> Self {
        match phase {
            "Pending" => PodPhase::Pending,
            "Running" => PodPhase::Running,
            "Succeeded" => PodPhase::Succeeded,
            "Failed" => PodPhase::Failed,
            _ => PodPhase::Unknown,
        }
    }
}

impl fmt::Display for PodPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of one regular container inside a pod.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStatus {
    pub name: String,
    /// Reason of the waiting sub-state; `None` unless the container is waiting.
    pub waiting_reason: Option<String>,
}

impl ContainerStatus {
    pub fn is_waiting_with(&self, reason: &str) -> bool {
        self.waiting_reason.as_deref() == Some(reason)
    }
}

/// Read-only view of a pod at fetch time.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodSnapshot {
    pub namespace: String,
    pub name: String,
    pub phase: PodPhase,
    /// `status.reason`, empty when the API server reports none.
    pub reason: String,
    pub labels: BTreeMap<String, String>,
    pub container_statuses: Vec<ContainerStatus>,
}

impl PodSnapshot {
    /// True if any container is waiting with the given reason.
    pub fn has_container_waiting_with(&self, reason: &str) -> bool {
        self.container_statuses
            .iter()
            .any(|status| status.is_waiting_with(reason))
    }

    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

impl TryFrom<Pod> for PodSnapshot {
    type Error = TransportError;

    fn try_from(pod: Pod) -> Result<Self, Self::Error> {
        let name = pod
            .metadata
            .name
            .ok_or_else(|| TransportError::Decode("pod without metadata.name".to_string()))?;
        let namespace = pod.metadata.namespace.ok_or_else(|| {
            TransportError::Decode(format!("pod {name} without metadata.namespace"))
        })?;

        let status = pod.status.unwrap_or_default();
        let container_statuses = status
            .container_statuses
            .unwrap_or_default()
            .into_iter()
            .map(|container| ContainerStatus {
                name: container.name,
                waiting_reason: container
                    .state
                    .and_then(|state| state.waiting)
                    .map(|waiting| waiting.reason.unwrap_or_default()),
            })
            .collect();

        Ok(Self {
            namespace,
            name,
            phase: status.phase.as_deref().map(PodPhase::from).unwrap_or_default(),
            reason: status.reason.unwrap_or_default(),
            labels: pod.metadata.labels.unwrap_or_default(),
            container_statuses,
        })
    }
}

/// Capability the sweeper needs from the cluster.
#[async_trait]
pub trait PodApi: Send + Sync {
    /// List every pod visible to `scope` in a single request.
    async fn list_pods(&self, scope: &Scope) -> Result<Vec<PodSnapshot>, TransportError>;

    /// Delete one pod by namespace and name.
    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{
        ContainerState, ContainerStateRunning, ContainerStateWaiting,
        ContainerStatus as K8sContainerStatus, PodStatus,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn container(name: &str, state: ContainerState) -> K8sContainerStatus {
        K8sContainerStatus {
            name: name.to_string(),
            state: Some(state),
            ..Default::default()
        }
    }

    #[test]
    fn test_pod_conversion_reads_phase_reason_and_waiting_states() {
        let pod = Pod {
            metadata: ObjectMeta {
                name: Some("web-0".to_string()),
                namespace: Some("shop".to_string()),
                labels: Some(BTreeMap::from([("app".to_string(), "web".to_string())])),
                ..Default::default()
            },
            status: Some(PodStatus {
                phase: Some("Failed".to_string()),
                reason: Some("Evicted".to_string()),
                container_statuses: Some(vec![
                    container(
                        "app",
                        ContainerState {
                            waiting: Some(ContainerStateWaiting {
                                reason: Some("CrashLoopBackOff".to_string()),
                                message: None,
                            }),
                            ..Default::default()
                        },
                    ),
                    container(
                        "sidecar",
                        ContainerState {
                            running: Some(ContainerStateRunning::default()),
                            ..Default::default()
                        },
                    ),
                ]),
                ..Default::default()
            }),
            ..Default::default()
        };

        let snapshot = PodSnapshot::try_from(pod).unwrap();

        assert_eq!(snapshot.qualified_name(), "shop/web-0");
        assert_eq!(snapshot.phase, PodPhase::Failed);
        assert_eq!(snapshot.reason, "Evicted");
        assert_eq!(snapshot.labels.get("app").map(String::as_str), Some("web"));
        assert_eq!(
            snapshot.container_statuses[0].waiting_reason.as_deref(),
            Some("CrashLoopBackOff")
        );
        assert_eq!(snapshot.container_statuses[1].waiting_reason, None);
        assert!(snapshot.has_container_waiting_with("CrashLoopBackOff"));
        assert!(!snapshot.has_container_waiting_with("ImagePullBackOff"));
    }

    #[test]
    fn test_pod_without_status_is_unknown_phase() {
        let pod = Pod {
            metadata: ObjectMeta {
                name: Some("pending".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        let snapshot = PodSnapshot::try_from(pod).unwrap();
        assert_eq!(snapshot.phase, PodPhase::Unknown);
        assert!(snapshot.reason.is_empty());
        assert!(snapshot.container_statuses.is_empty());
    }

    #[test]
    fn test_pod_without_name_is_rejected() {
        let result = PodSnapshot::try_from(Pod::default());
        assert!(matches!(result, Err(TransportError::Decode(_))));
    }

    #[test]
    fn test_unrecognised_phase_maps_to_unknown() {
        assert_eq!(PodPhase::from("Failed"), PodPhase::Failed);
        assert_eq!(PodPhase::from("Terminating"), PodPhase::Unknown);
        assert_eq!(PodPhase::from(""), PodPhase::Unknown);
    }

    #[test]
    fn test_scope_display() {
        assert_eq!(Scope::cluster_wide().to_string(), "<all namespaces>");
        assert_eq!(Scope::new("kube-system", "").to_string(), "kube-system");
        assert_eq!(
            Scope::new("", "app=web").to_string(),
            "<all namespaces> [app=web]"
        );
    }
}
