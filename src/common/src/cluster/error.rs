use std::time::Duration;

/// Failure of a single list or delete call against the cluster.
///
/// Nothing in a sweep treats these as fatal: the caller logs the error with
/// its rule and pod context and moves on.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("pod {namespace}/{name} not found")]
    NotFound { namespace: String, name: String },

    #[error("permission denied: {message}")]
    Forbidden { message: String },

    #[error("API server rejected request ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("failed to decode pod: {0}")]
    Decode(String),
}

impl TransportError {
    /// Map a `kube` error. `target` is the `(namespace, name)` of the pod a
    /// delete was aimed at, if any.
    pub fn from_kube(err: kube::Error, target: Option<(&str, &str)>) -> Self {
        match err {
            kube::Error::Api(response) => match (response.code, target) {
                (404, Some((namespace, name))) => TransportError::NotFound {
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                },
                (401 | 403, _) => TransportError::Forbidden {
                    message: response.message,
                },
                (code, _) => TransportError::Api {
                    code,
                    message: response.message,
                },
            },
            other => TransportError::Connection(other.to_string()),
        }
    }

    /// Deleting something that is already gone; expected when two rules
    /// match the same pod in one pass.
    pub fn is_not_found(&self) -> bool {
        matches!(self, TransportError::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;

    fn api_error(code: u16, message: &str) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: message.to_string(),
            reason: String::new(),
            code,
        })
    }

    #[test]
    fn test_not_found_with_target() {
        let error = TransportError::from_kube(
            api_error(404, "pods \"p1\" not found"),
            Some(("a", "p1")),
        );
        assert!(error.is_not_found());
        assert_eq!(error.to_string(), "pod a/p1 not found");
    }

    #[test]
    fn test_not_found_without_target_stays_api_error() {
        let error = TransportError::from_kube(api_error(404, "namespace gone"), None);
        assert!(!error.is_not_found());
        assert!(matches!(error, TransportError::Api { code: 404, .. }));
    }

    #[test]
    fn test_forbidden() {
        let error = TransportError::from_kube(api_error(403, "pods is forbidden"), None);
        assert!(matches!(error, TransportError::Forbidden { .. }));
        assert_eq!(error.to_string(), "permission denied: pods is forbidden");
    }

    #[test]
    fn test_timeout_display() {
        let error = TransportError::Timeout(Duration::from_secs(30));
        assert_eq!(error.to_string(), "request timed out after 30s");
    }
}
