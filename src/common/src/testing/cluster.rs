//! In-memory cluster for exercising sweeps.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::cluster::{PodApi, PodSnapshot, Scope, TransportError};
use crate::selector::LabelSelector;

/// One recorded `delete_pod` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteCall {
    pub namespace: String,
    pub name: String,
    pub succeeded: bool,
}

#[derive(Debug, Default)]
struct ClusterState {
    pods: Vec<PodSnapshot>,
    /// Pods already deleted but still returned by listings
    stale: Vec<PodSnapshot>,
    list_calls: Vec<Scope>,
    delete_calls: Vec<DeleteCall>,
    failing_lists: usize,
    forbidden: HashSet<(String, String)>,
}

/// [`PodApi`] over a mutable pod list.
///
/// Listing applies namespace and label selector filtering like the API
/// server does. Deleting removes the pod; deleting an absent pod fails with
/// [`TransportError::NotFound`].
#[derive(Debug, Default)]
pub struct InMemoryPodApi {
    state: Mutex<ClusterState>,
    stale_listings: bool,
}

impl InMemoryPodApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pods(pods: impl IntoIterator<Item = PodSnapshot>) -> Self {
        Self {
            state: Mutex::new(ClusterState {
                pods: pods.into_iter().collect(),
                ..Default::default()
            }),
            stale_listings: false,
        }
    }

    /// Keep deleted pods visible to later listings, the way a pod lingers
    /// while it terminates. Deleting them again fails with not-found.
    pub fn with_stale_listings(mut self) -> Self {
        self.stale_listings = true;
        self
    }

    /// Make the next `count` list calls fail with a connection error.
    pub async fn fail_next_lists(&self, count: usize) {
        self.state.lock().await.failing_lists = count;
    }

    /// Make every delete of this pod fail with a permission error.
    pub async fn forbid_delete(&self, namespace: &str, name: &str) {
        self.state
            .lock()
            .await
            .forbidden
            .insert((namespace.to_string(), name.to_string()));
    }

    pub async fn add_pod(&self, pod: PodSnapshot) {
        self.state.lock().await.pods.push(pod);
    }

    /// Qualified names (`namespace/name`) of the pods still present.
    pub async fn pod_names(&self) -> Vec<String> {
        self.state
            .lock()
            .await
            .pods
            .iter()
            .map(PodSnapshot::qualified_name)
            .collect()
    }

    pub async fn list_calls(&self) -> Vec<Scope> {
        self.state.lock().await.list_calls.clone()
    }

    pub async fn delete_calls(&self) -> Vec<DeleteCall> {
        self.state.lock().await.delete_calls.clone()
    }

    /// Names (`namespace/name`) of successful deletions, in call order.
    pub async fn deleted(&self) -> Vec<String> {
        self.state
            .lock()
            .await
            .delete_calls
            .iter()
            .filter(|call| call.succeeded)
            .map(|call| format!("{}/{}", call.namespace, call.name))
            .collect()
    }
}

#[async_trait]
impl PodApi for InMemoryPodApi {
    async fn list_pods(&self, scope: &Scope) -> Result<Vec<PodSnapshot>, TransportError> {
        let mut state = self.state.lock().await;
        state.list_calls.push(scope.clone());

        if state.failing_lists > 0 {
            state.failing_lists -= 1;
            return Err(TransportError::Connection(
                "connection refused".to_string(),
            ));
        }

        let selector =
            LabelSelector::parse(&scope.label_selector).map_err(|e| TransportError::Api {
                code: 400,
                message: e.to_string(),
            })?;

        Ok(state
            .pods
            .iter()
            .chain(state.stale.iter())
            .filter(|pod| scope.is_all_namespaces() || pod.namespace == scope.namespace)
            .filter(|pod| selector.matches(&pod.labels))
            .cloned()
            .collect())
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;

        let result = if state
            .forbidden
            .contains(&(namespace.to_string(), name.to_string()))
        {
            Err(TransportError::Forbidden {
                message: format!("cannot delete pod {namespace}/{name}"),
            })
        } else if let Some(idx) = state
            .pods
            .iter()
            .position(|pod| pod.namespace == namespace && pod.name == name)
        {
            let pod = state.pods.remove(idx);
            if self.stale_listings {
                state.stale.push(pod);
            }
            Ok(())
        } else {
            Err(TransportError::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
        };

        state.delete_calls.push(DeleteCall {
            namespace: namespace.to_string(),
            name: name.to_string(),
            succeeded: result.is_ok(),
        });
        result
    }
}
