use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method, Response, StatusCode};
use tracing::debug;

use crate::sign::{RequestSigner, uri_encode_path};
use crate::store::{SnapshotStore, StoreError, StoreResult};

const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct MinioConfig {
    /// `host:port` of the MinIO endpoint.
    pub host: String,
    pub access_key: String,
    pub secret_key: String,
    /// Use HTTPS when true; in-cluster MinIO usually speaks plain HTTP.
    pub secure: bool,
    /// Per-request timeout on the underlying HTTP client.
    pub timeout: Duration,
}

impl MinioConfig {
    pub fn new(host: impl Into<String>, access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            secure: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// S3-compatible object store client speaking path-style requests signed
/// with AWS signature V4.
pub struct MinioStore {
    client: Client,
    host: String,
    base_url: String,
    signer: RequestSigner,
}

impl std::fmt::Debug for MinioStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Credentials stay out of debug output.
        f.debug_struct("MinioStore").field("base_url", &self.base_url).finish()
    }
}

impl MinioStore {
    pub fn new(config: MinioConfig) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StoreError::Request(format!("build http client: {e}")))?;
        let scheme = if config.secure { "https" } else { "http" };
        Ok(Self {
            client,
            base_url: format!("{scheme}://{}", config.host),
            host: config.host,
            signer: RequestSigner {
                access_key: config.access_key,
                secret_key: config.secret_key,
                region: DEFAULT_REGION.to_string(),
            },
        })
    }

    async fn request(&self, method: Method, path: &str, payload: &[u8]) -> StoreResult<Response> {
        let encoded = uri_encode_path(path);
        let signed = self
            .signer
            .sign(method.as_str(), &self.host, &encoded, "", payload, Utc::now())
            .map_err(StoreError::Request)?;

        self.client
            .request(method, format!("{}{encoded}", self.base_url))
            .header("x-amz-date", signed.amz_date.as_str())
            .header("x-amz-content-sha256", signed.content_sha256.as_str())
            .header("Authorization", signed.authorization.as_str())
            .body(payload.to_vec())
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))
    }
}

async fn status_error(resp: Response) -> StoreError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    StoreError::Status { status, body }
}

#[async_trait]
impl SnapshotStore for MinioStore {
    async fn put(&self, bucket: &str, object: &str, data: Vec<u8>) -> StoreResult<()> {
        let path = format!("/{bucket}/{object}");
        let resp = self.request(Method::PUT, &path, &data).await?;
        if resp.status().is_success() {
            debug!(object, size = data.len(), "snapshot object uploaded");
            return Ok(());
        }
        Err(status_error(resp).await)
    }

    async fn get(&self, bucket: &str, object: &str) -> StoreResult<Vec<u8>> {
        let path = format!("/{bucket}/{object}");
        let resp = self.request(Method::GET, &path, b"").await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound {
                bucket: bucket.to_string(),
                object: object.to_string(),
            });
        }
        if !resp.status().is_success() {
            return Err(status_error(resp).await);
        }
        let body = resp
            .bytes()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;
        debug!(object, size = body.len(), "snapshot object loaded");
        Ok(body.to_vec())
    }

    async fn remove(&self, bucket: &str, object: &str) -> StoreResult<()> {
        let path = format!("/{bucket}/{object}");
        let resp = self.request(Method::DELETE, &path, b"").await?;
        // S3 DELETE is idempotent: 204 also covers an already-absent key.
        if resp.status().is_success() {
            return Ok(());
        }
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound {
                bucket: bucket.to_string(),
                object: object.to_string(),
            });
        }
        Err(status_error(resp).await)
    }

    async fn ensure_bucket(&self, bucket: &str) -> StoreResult<()> {
        let path = format!("/{bucket}");
        let head = self.request(Method::HEAD, &path, b"").await?;
        if head.status().is_success() {
            return Ok(());
        }
        if head.status() != StatusCode::NOT_FOUND {
            return Err(status_error(head).await);
        }

        let created = self.request(Method::PUT, &path, b"").await?;
        // 409 means another writer created it in between, which is fine.
        if created.status().is_success() || created.status() == StatusCode::CONFLICT {
            debug!(bucket, "bucket ready");
            return Ok(());
        }
        Err(status_error(created).await)
    }

    async fn list_buckets(&self) -> StoreResult<Vec<String>> {
        let resp = self.request(Method::GET, "/", b"").await?;
        if !resp.status().is_success() {
            return Err(status_error(resp).await);
        }
        let body = resp
            .text()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;
        Ok(parse_bucket_names(&body))
    }
}

/// Pull the `<Name>` elements out of a `ListAllMyBuckets` response. The
/// response shape is fixed by the S3 API and bucket names are restricted to
/// `[a-z0-9.-]`, so tag scanning is sufficient here.
fn parse_bucket_names(xml: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = xml;
    while let Some(start) = rest.find("<Name>") {
        let Some(after) = rest.get(start + "<Name>".len()..) else {
            break;
        };
        let Some(end) = after.find("</Name>") else {
            break;
        };
        if let Some(name) = after.get(..end) {
            names.push(name.to_string());
        }
        rest = after.get(end..).unwrap_or("");
    }
    names
}
