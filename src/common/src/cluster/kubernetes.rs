//! `PodApi` backed by a live Kubernetes API server.

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, DeleteParams, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};

use super::{PodApi, PodSnapshot, Scope, TransportError};
use crate::config::ClusterConfig;

pub struct KubePodApi {
    client: Client,
    request_timeout: Duration,
}

impl KubePodApi {
    /// Build a client from the configured kubeconfig (or the inferred
    /// environment) and probe the API server once.
    ///
    /// Any failure here is a startup failure; the caller is expected to exit.
    pub async fn connect(config: &ClusterConfig) -> Result<Self> {
        let mut kube_config = match &config.kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path).with_context(|| {
                    format!("Failed to read kubeconfig from {}", path.display())
                })?;
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .context("Failed to build client configuration from kubeconfig")?
            }
            None => Config::infer()
                .await
                .context("Failed to infer Kubernetes client configuration")?,
        };
        kube_config.connect_timeout = Some(config.connect_timeout);
        kube_config.read_timeout = Some(config.request_timeout);

        let cluster_url = kube_config.cluster_url.to_string();
        let client = Client::try_from(kube_config).context("Failed to create Kubernetes client")?;

        let version = tokio::time::timeout(config.request_timeout, client.apiserver_version())
            .await
            .with_context(|| format!("Timed out connecting to API server at {cluster_url}"))?
            .with_context(|| format!("Failed to reach API server at {cluster_url}"))?;

        tracing::info!(
            cluster_url = %cluster_url,
            server_version = %version.git_version,
            "Connected to Kubernetes API server"
        );

        Ok(Self::from_client(client, config.request_timeout))
    }

    pub fn from_client(client: Client, request_timeout: Duration) -> Self {
        Self {
            client,
            request_timeout,
        }
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        if namespace.is_empty() {
            Api::all(self.client.clone())
        } else {
            Api::namespaced(self.client.clone(), namespace)
        }
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, TransportError>
    where
        F: Future<Output = Result<T, TransportError>>,
    {
        tokio::time::timeout(self.request_timeout, call)
            .await
            .map_err(|_| TransportError::Timeout(self.request_timeout))?
    }
}

/// The selector is handed to the API server verbatim; an empty one means no
/// filter at all rather than `labelSelector=`.
fn list_params(scope: &Scope) -> ListParams {
    let params = ListParams::default();
    if scope.has_label_selector() {
        params.labels(&scope.label_selector)
    } else {
        params
    }
}

#[async_trait]
impl PodApi for KubePodApi {
    async fn list_pods(&self, scope: &Scope) -> Result<Vec<PodSnapshot>, TransportError> {
        let params = list_params(scope);
        let api = self.pods(&scope.namespace);
        let list = self
            .bounded(async {
                api.list(&params)
                    .await
                    .map_err(|e| TransportError::from_kube(e, None))
            })
            .await?;

        let mut pods = Vec::with_capacity(list.items.len());
        for pod in list.items {
            match PodSnapshot::try_from(pod) {
                Ok(snapshot) => pods.push(snapshot),
                Err(e) => {
                    tracing::warn!(scope = %scope, error = %e, "Skipping undecodable pod");
                }
            }
        }

        tracing::debug!(scope = %scope, pods = pods.len(), "Listed pods");
        Ok(pods)
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), TransportError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        self.bounded(async {
            api.delete(name, &DeleteParams::default())
                .await
                .map(|_| ())
                .map_err(|e| TransportError::from_kube(e, Some((namespace, name))))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_params_without_selector() {
        let params = list_params(&Scope::cluster_wide());
        assert_eq!(params.label_selector, None);

        let params = list_params(&Scope::new("a", ""));
        assert_eq!(params.label_selector, None);
    }

    #[test]
    fn test_list_params_pass_selector_through() {
        let params = list_params(&Scope::new("", "app=web,replicas>1"));
        assert_eq!(params.label_selector.as_deref(), Some("app=web,replicas>1"));
        assert_eq!(params.field_selector, None);
    }
}
