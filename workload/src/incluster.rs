use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Certificate, Client};
use tracing::info;

use crate::{WorkloadApi, WorkloadError, WorkloadIdentity, WorkloadResult};

/// Mount point of the pod's serviceaccount credentials.
pub const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection parameters for the cluster API server.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL, e.g. `https://10.96.0.1:443`.
    pub api_server: String,
    /// Bearer token of the monitor's serviceaccount.
    pub token: String,
    /// Cluster CA bundle; `None` relies on the client's root store.
    pub ca_pem: Option<Vec<u8>>,
}

/// Workload collaborator backed by the in-cluster Kubernetes API. Restart
/// is actuated by deleting the pod: the owning controller brings up a
/// fresh replica from the untampered image.
#[derive(Debug)]
pub struct InClusterApi {
    client: Client,
    api_server: String,
    token: String,
    identity: WorkloadIdentity,
}

impl InClusterApi {
    pub fn new(config: ApiConfig, identity: WorkloadIdentity) -> WorkloadResult<Self> {
        let mut builder = Client::builder().timeout(REQUEST_TIMEOUT);
        if let Some(pem) = &config.ca_pem {
            let cert = Certificate::from_pem(pem)
                .map_err(|e| WorkloadError::Config(format!("cluster ca: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }
        let client = builder
            .build()
            .map_err(|e| WorkloadError::Config(format!("build http client: {e}")))?;
        Ok(Self {
            client,
            api_server: config.api_server,
            token: config.token,
            identity,
        })
    }

    /// Assemble identity and credentials from the standard in-cluster
    /// environment: serviceaccount files plus the downward-API variables.
    pub async fn discover(image: String) -> WorkloadResult<Self> {
        let pod_name = std::env::var("POD_NAME")
            .map_err(|_| WorkloadError::Config("POD_NAME is not set".into()))?;
        let workload_kind =
            std::env::var("DEPLOYMENT_TYPE").unwrap_or_else(|_| "Deployment".into());
        let host = std::env::var("KUBERNETES_SERVICE_HOST")
            .map_err(|_| WorkloadError::Config("KUBERNETES_SERVICE_HOST is not set".into()))?;
        let port = std::env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".into());
        Self::discover_with(
            Path::new(SERVICE_ACCOUNT_DIR),
            format!("https://{host}:{port}"),
            pod_name,
            workload_kind,
            image,
        )
        .await
    }

    /// `discover` with every ambient input explicit.
    pub async fn discover_with(
        service_account_dir: &Path,
        api_server: String,
        pod_name: String,
        workload_kind: String,
        image: String,
    ) -> WorkloadResult<Self> {
        let namespace = read_trimmed(&service_account_dir.join("namespace")).await?;
        let token = read_trimmed(&service_account_dir.join("token")).await?;
        let ca_pem = tokio::fs::read(service_account_dir.join("ca.crt")).await.ok();

        let identity = WorkloadIdentity {
            workload_name: derive_workload_name(&pod_name),
            namespace,
            pod_name,
            workload_kind,
            image,
        };
        Self::new(
            ApiConfig {
                api_server,
                token,
                ca_pem,
            },
            identity,
        )
    }
}

async fn read_trimmed(path: &Path) -> WorkloadResult<String> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| WorkloadError::Config(format!("read {}: {e}", path.display())))?;
    Ok(content.trim().to_string())
}

/// Pod names carry the replicaset hash and the pod suffix; dropping the
/// last two dash-separated segments yields the owning workload's name.
pub fn derive_workload_name(pod_name: &str) -> String {
    let segments: Vec<&str> = pod_name.split('-').collect();
    if segments.len() <= 2 {
        return pod_name.to_string();
    }
    segments
        .get(..segments.len() - 2)
        .map(|s| s.join("-"))
        .unwrap_or_else(|| pod_name.to_string())
}

#[async_trait]
impl WorkloadApi for InClusterApi {
    fn identity(&self) -> &WorkloadIdentity {
        &self.identity
    }

    async fn restart(&self) -> WorkloadResult<()> {
        let url = format!(
            "{}/api/v1/namespaces/{}/pods/{}",
            self.api_server, self.identity.namespace, self.identity.pod_name
        );
        let resp = self
            .client
            .delete(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| WorkloadError::Api(e.to_string()))?;

        // The API answers 200 for immediate deletes and 202 for deferred.
        if resp.status().is_success() {
            info!(
                pod = %self.identity.pod_name,
                workload = %self.identity.workload_name,
                "pod deletion requested, workload will restart"
            );
            return Ok(());
        }
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Err(WorkloadError::Status { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn workload_name_drops_replicaset_and_pod_suffix() {
        assert_eq!(derive_workload_name("myapp-7d9c5b4f6-x2x9z"), "myapp");
        assert_eq!(derive_workload_name("my-app-7d9c5b4f6-x2x9z"), "my-app");
    }

    #[test]
    fn short_pod_names_are_kept_as_is() {
        assert_eq!(derive_workload_name("myapp"), "myapp");
        assert_eq!(derive_workload_name("myapp-0"), "myapp-0");
    }

    fn identity() -> WorkloadIdentity {
        WorkloadIdentity {
            namespace: "default".into(),
            pod_name: "myapp-7d9c5b4f6-x2x9z".into(),
            workload_name: "myapp".into(),
            workload_kind: "Deployment".into(),
            image: "myapp:1.0".into(),
        }
    }

    #[tokio::test]
    async fn restart_deletes_the_pod() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(DELETE)
                .path("/api/v1/namespaces/default/pods/myapp-7d9c5b4f6-x2x9z")
                .header("Authorization", "Bearer sa-token");
            then.status(200).body("{}");
        });

        let api = InClusterApi::new(
            ApiConfig {
                api_server: server.base_url(),
                token: "sa-token".into(),
                ca_pem: None,
            },
            identity(),
        )
        .unwrap();
        api.restart().await.unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn restart_failure_surfaces_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(DELETE).path_contains("/pods/");
            then.status(403).body("forbidden");
        });

        let api = InClusterApi::new(
            ApiConfig {
                api_server: server.base_url(),
                token: "t".into(),
                ca_pem: None,
            },
            identity(),
        )
        .unwrap();
        let err = api.restart().await.unwrap_err();
        assert!(
            matches!(err, WorkloadError::Status { status: 403, .. }),
            "got: {err}"
        );
    }

    #[tokio::test]
    async fn discover_reads_serviceaccount_files() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("namespace"), "staging\n").await.unwrap();
        tokio::fs::write(dir.path().join("token"), "sa-token").await.unwrap();

        let api = InClusterApi::discover_with(
            dir.path(),
            "https://10.96.0.1:443".into(),
            "web-66b8c9d7f-abcde".into(),
            "Deployment".into(),
            "web:2.1".into(),
        )
        .await
        .unwrap();

        let id = api.identity();
        assert_eq!(id.namespace, "staging");
        assert_eq!(id.pod_name, "web-66b8c9d7f-abcde");
        assert_eq!(id.workload_name, "web");
        assert_eq!(id.image, "web:2.1");
    }

    #[tokio::test]
    async fn discover_fails_without_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let err = InClusterApi::discover_with(
            dir.path(),
            "https://10.96.0.1:443".into(),
            "web-1-2".into(),
            "Deployment".into(),
            "web:2.1".into(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, WorkloadError::Config(_)), "got: {err}");
    }
}
