//! Kubernetes REST client implementing the orchestrator contract.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use tracing::{debug, info};

use aiops_core::{BackendError, BackendResult, Orchestrator, WorkloadInstance};

use crate::error::KubeConfigError;
use crate::wire::{Deployment, PodList, ScalePatch};

/// Where the kubelet mounts the pod's service-account credentials.
pub const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

const MERGE_PATCH: &str = "application/merge-patch+json";

#[derive(Debug, Clone)]
pub struct KubeClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    timeout: Duration,
}

impl KubeClient {
    /// Client for an API server reachable at `base_url` (for example a
    /// `kubectl proxy` endpoint), optionally authenticating with a
    /// bearer token.
    pub fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, KubeConfigError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(KubeConfigError::Client)?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            timeout,
        })
    }

    /// Client using the pod's own service account.
    pub fn in_cluster(timeout: Duration) -> Result<Self, KubeConfigError> {
        Self::in_cluster_from(
            Path::new(SERVICE_ACCOUNT_DIR),
            |key| std::env::var(key).ok(),
            timeout,
        )
    }

    /// In-cluster construction with the credential directory and the
    /// environment supplied by the caller.
    pub fn in_cluster_from<F>(
        sa_dir: &Path,
        lookup: F,
        timeout: Duration,
    ) -> Result<Self, KubeConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("KUBERNETES_SERVICE_HOST")
            .ok_or(KubeConfigError::MissingEnv("KUBERNETES_SERVICE_HOST"))?;
        let port = lookup("KUBERNETES_SERVICE_PORT")
            .ok_or(KubeConfigError::MissingEnv("KUBERNETES_SERVICE_PORT"))?;

        let token = read_file(&sa_dir.join("token"))?;
        let ca = read_file(&sa_dir.join("ca.crt"))?;
        let cert =
            reqwest::Certificate::from_pem(ca.as_bytes()).map_err(KubeConfigError::Certificate)?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .add_root_certificate(cert)
            .build()
            .map_err(KubeConfigError::Client)?;

        // IPv6 service hosts need brackets.
        let base_url = if host.contains(':') {
            format!("https://[{host}]:{port}")
        } else {
            format!("https://{host}:{port}")
        };
        info!(%base_url, "using in-cluster kubernetes credentials");

        Ok(Self {
            http,
            base_url,
            token: Some(token.trim().to_string()),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self
            .http
            .request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Send `req`; map transport failures, 404 and other non-2xx answers
    /// into `BackendError`.
    async fn send(&self, req: RequestBuilder, what: &str) -> BackendResult<Response> {
        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout {
                    call: "kubernetes api",
                    after: self.timeout,
                }
            } else {
                BackendError::Transport(e.to_string())
            }
        })?;

        match resp.status() {
            s if s.is_success() => Ok(resp),
            StatusCode::NOT_FOUND => Err(BackendError::NotFound(what.to_string())),
            s => Err(BackendError::status(
                s.as_u16(),
                resp.text().await.unwrap_or_default(),
            )),
        }
    }

    async fn decode<T: serde::de::DeserializeOwned>(resp: Response) -> BackendResult<T> {
        resp.json::<T>()
            .await
            .map_err(|e| BackendError::Malformed(e.to_string()))
    }
}

fn deployment_path(name: &str, namespace: &str) -> String {
    format!("/apis/apps/v1/namespaces/{namespace}/deployments/{name}")
}

fn read_file(path: &Path) -> Result<String, KubeConfigError> {
    std::fs::read_to_string(path).map_err(|source| KubeConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })
}

#[async_trait]
impl Orchestrator for KubeClient {
    async fn deployment_replicas(&self, name: &str, namespace: &str) -> BackendResult<u32> {
        let what = format!("deployment {namespace}/{name}");
        let resp = self
            .send(self.request(Method::GET, &deployment_path(name, namespace)), &what)
            .await?;
        let deployment: Deployment = Self::decode(resp).await?;
        Ok(deployment.replicas())
    }

    async fn patch_deployment_replicas(
        &self,
        name: &str,
        namespace: &str,
        replicas: u32,
    ) -> BackendResult<u32> {
        let what = format!("deployment {namespace}/{name}");
        let body = serde_json::to_vec(&ScalePatch::replicas(replicas))
            .map_err(|e| BackendError::Malformed(e.to_string()))?;

        let req = self
            .request(Method::PATCH, &deployment_path(name, namespace))
            .header(CONTENT_TYPE, MERGE_PATCH)
            .body(body);
        let resp = self.send(req, &what).await?;
        let deployment: Deployment = Self::decode(resp).await?;

        debug!(%namespace, %name, replicas = deployment.replicas(), "deployment patched");
        Ok(deployment.replicas())
    }

    async fn list_pods(&self, namespace: &str) -> BackendResult<Vec<WorkloadInstance>> {
        let path = format!("/api/v1/namespaces/{namespace}/pods");
        let resp = self
            .send(self.request(Method::GET, &path), &format!("namespace {namespace}"))
            .await?;
        let list: PodList = Self::decode(resp).await?;
        Ok(list.items.into_iter().map(WorkloadInstance::from).collect())
    }

    async fn delete_pod(&self, id: &str, namespace: &str) -> BackendResult<()> {
        let path = format!("/api/v1/namespaces/{namespace}/pods/{id}");
        self.send(
            self.request(Method::DELETE, &path),
            &format!("pod {namespace}/{id}"),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aiops_core::error::MAX_ERROR_BODY;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DEPLOY_PATH: &str = "/apis/apps/v1/namespaces/default/deployments/quickchat-backend";

    async fn client_for(server: &MockServer) -> KubeClient {
        KubeClient::new(&server.uri(), Some("sa-token".to_string()), Duration::from_secs(2))
            .unwrap()
    }

    fn deployment(replicas: u32) -> serde_json::Value {
        serde_json::json!({
            "metadata": {"name": "quickchat-backend"},
            "spec": {"replicas": replicas}
        })
    }

    #[tokio::test]
    async fn reads_deployment_replicas_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(DEPLOY_PATH))
            .and(header("authorization", "Bearer sa-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(deployment(2)))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        assert_eq!(
            client
                .deployment_replicas("quickchat-backend", "default")
                .await
                .unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn patches_replicas_with_merge_patch() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path(DEPLOY_PATH))
            .and(header("content-type", MERGE_PATCH))
            .and(body_json(serde_json::json!({"spec": {"replicas": 3}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(deployment(3)))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let confirmed = client
            .patch_deployment_replicas("quickchat-backend", "default", 3)
            .await
            .unwrap();
        assert_eq!(confirmed, 3);
    }

    #[tokio::test]
    async fn missing_deployment_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "kind": "Status", "reason": "NotFound"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .deployment_replicas("quickchat-backend", "default")
            .await
            .unwrap_err();
        assert!(err.is_not_found(), "got {err:?}");
    }

    #[tokio::test]
    async fn forbidden_is_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .patch_deployment_replicas("quickchat-backend", "default", 4)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Status { code: 403, .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn oversized_error_body_is_capped() {
        let server = MockServer::start().await;
        let body = format!("{}€{}", "x".repeat(MAX_ERROR_BODY - 2), "y".repeat(4096));
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(500).set_body_string(body))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .delete_pod("backend-a", "default")
            .await
            .unwrap_err();
        match err {
            BackendError::Status { code, body } => {
                assert_eq!(code, 500);
                assert_eq!(body, "x".repeat(MAX_ERROR_BODY - 2));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn lists_pods_as_workload_instances() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/namespaces/default/pods"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "kind": "PodList",
                "items": [
                    {
                        "metadata": {"name": "backend-a", "labels": {"app": "backend"}},
                        "status": {"containerStatuses": [{"restartCount": 4}]}
                    },
                    {
                        "metadata": {"name": "frontend-a", "labels": {"app": "frontend"}},
                        "status": {}
                    }
                ]
            })))
            .mount(&server)
            .await;

        let pods = client_for(&server).await.list_pods("default").await.unwrap();
        assert_eq!(pods.len(), 2);
        assert_eq!(pods[0].id, "backend-a");
        assert_eq!(pods[0].restart_count, 4);
        assert_eq!(pods[1].restart_count, 0);
    }

    #[tokio::test]
    async fn deletes_pod() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/v1/namespaces/default/pods/backend-a"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .await
            .delete_pod("backend-a", "default")
            .await
            .unwrap();
    }

    #[test]
    fn in_cluster_requires_service_env() {
        let dir = tempfile::tempdir().unwrap();
        let err = KubeClient::in_cluster_from(dir.path(), |_| None, Duration::from_secs(5))
            .unwrap_err();
        assert!(matches!(
            err,
            KubeConfigError::MissingEnv("KUBERNETES_SERVICE_HOST")
        ));
    }

    #[test]
    fn in_cluster_requires_token_file() {
        let dir = tempfile::tempdir().unwrap();
        let env = |key: &str| match key {
            "KUBERNETES_SERVICE_HOST" => Some("10.0.0.1".to_string()),
            "KUBERNETES_SERVICE_PORT" => Some("443".to_string()),
            _ => None,
        };

        let err = KubeClient::in_cluster_from(dir.path(), env, Duration::from_secs(5))
            .unwrap_err();
        assert!(matches!(err, KubeConfigError::ReadFile { .. }), "got {err:?}");
    }
}
