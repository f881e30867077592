use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::{Alert, Sink, SinkError};

const SINK_NAME: &str = "splunk";
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Structured-event forwarder posting one HEC record per alert.
#[derive(Debug)]
pub struct SplunkSink {
    client: Client,
    url: String,
    auth: String,
}

impl SplunkSink {
    pub fn new(url: impl Into<String>, token: &str, insecure_skip_verify: bool) -> Result<Self, SinkError> {
        let client = Client::builder()
            .timeout(SEND_TIMEOUT)
            .danger_accept_invalid_certs(insecure_skip_verify)
            .build()
            .map_err(|e| SinkError::new(SINK_NAME, format!("build http client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
            auth: format!("Splunk {token}"),
        })
    }
}

#[async_trait]
impl Sink for SplunkSink {
    fn name(&self) -> &str {
        SINK_NAME
    }

    async fn send(&self, alert: &Alert) -> Result<(), SinkError> {
        // Epoch seconds with a fractional part, the HEC "time" convention.
        let time = alert.time.timestamp_micros() as f64 / 1e6;
        let body = json!({
            "time": time,
            "event": {
                "message": alert.message,
                "reason": alert.reason,
                "path": alert.path,
            },
        });

        let resp = self
            .client
            .post(&self.url)
            .header("Authorization", self.auth.as_str())
            .json(&body)
            .send()
            .await
            .map_err(|e| SinkError::new(SINK_NAME, e.to_string()))?;

        if resp.status().is_success() {
            return Ok(());
        }
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        Err(SinkError::new(
            SINK_NAME,
            format!("unexpected status {status}: {body}"),
        ))
    }
}
