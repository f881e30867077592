use std::collections::HashMap;
use std::time::Duration;

use clap::Args;

use crate::error::{MonitorError, MonitorResult};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Hash algorithm for snapshots and checks
    #[arg(long, default_value = "SHA256", env = "ALGORITHM")]
    pub algorithm: String,

    /// Size of the hash worker pool (defaults to the CPU count)
    #[arg(long, env = "COUNT_WORKERS")]
    pub count_workers: Option<usize>,

    /// Interval between monitoring passes (e.g. "30s", "5m")
    #[arg(long, default_value = "30s", value_parser = parse_duration, env = "DURATION_TIME")]
    pub duration_time: Duration,

    /// Monitored processes and paths, e.g. "nginx=/etc,/usr/bin redis=/data"
    #[arg(long, env = "MONITORING_OPTIONS")]
    pub monitoring_options: String,

    /// Process name to image mapping, e.g. "nginx=nginx:1.25,redis=redis:7"
    #[arg(long, default_value = "", env = "PROCESS_IMAGE")]
    pub process_image: String,

    /// Cluster name carried in alert metadata
    #[arg(long, default_value = "", env = "CLUSTER_NAME")]
    pub cluster_name: String,

    /// Namespace carried in alert metadata (defaults to the pod's own)
    #[arg(long, default_value = "", env = "POD_NAMESPACE")]
    pub pod_namespace: String,

    /// Interval between heartbeat alerts
    #[arg(long, default_value = "1m", value_parser = parse_duration, env = "HEARTBEAT_INTERVAL")]
    pub heartbeat_interval: Duration,

    /// Enable the structured-event (Splunk HEC) alert sink
    #[arg(long, env = "SPLUNK_ENABLED")]
    pub splunk_enabled: bool,

    /// Splunk HEC endpoint URL
    #[arg(long, default_value = "", env = "SPLUNK_URL")]
    pub splunk_url: String,

    /// Splunk HEC token
    #[arg(long, default_value = "", env = "SPLUNK_TOKEN")]
    pub splunk_token: String,

    /// Skip TLS verification towards Splunk
    #[arg(long, env = "SPLUNK_INSECURE_SKIP_VERIFY")]
    pub splunk_insecure_skip_verify: bool,

    /// Enable the syslog alert sink
    #[arg(long, env = "SYSLOG_ENABLED")]
    pub syslog_enabled: bool,

    /// Syslog relay host
    #[arg(long, default_value = "localhost", env = "SYSLOG_HOST")]
    pub syslog_host: String,

    /// Syslog relay port
    #[arg(long, default_value_t = 514, env = "SYSLOG_PORT")]
    pub syslog_port: u16,

    /// Syslog transport: tcp or udp
    #[arg(long, default_value = "tcp", env = "SYSLOG_PROTO")]
    pub syslog_proto: String,

    /// Enable the MinIO snapshot store (the only store backend)
    #[arg(long, action = clap::ArgAction::Set, default_value_t = true, env = "MINIO_ENABLED")]
    pub minio_enabled: bool,

    /// MinIO host:port
    #[arg(long, default_value = "minio.minio.svc.cluster.local:9000", env = "MINIO_HOST")]
    pub minio_host: String,

    /// Bucket holding reference snapshots
    #[arg(long, default_value = snapshot::DEFAULT_BUCKET, env = "MINIO_BUCKET")]
    pub minio_bucket: String,

    /// MinIO access key
    #[arg(long, default_value = "", env = "MINIO_SERVER_USER", hide_env_values = true)]
    pub minio_access_key: String,

    /// MinIO secret key
    #[arg(long, default_value = "", env = "MINIO_SERVER_PASSWORD", hide_env_values = true)]
    pub minio_secret_key: String,
}

/// Parse `30s` / `5m` / `1h` style durations; a bare number is seconds.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    let (value, unit): (&str, &str) = match input.find(|c: char| c.is_ascii_alphabetic()) {
        Some(idx) => (
            input.get(..idx).unwrap_or_default(),
            input.get(idx..).unwrap_or_default(),
        ),
        None => (input, "s"),
    };
    let value: u64 = value
        .parse()
        .map_err(|_| format!("invalid duration {input:?}"))?;
    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 3600)),
        _ => Err(format!("invalid duration unit {unit:?} in {input:?}")),
    }
}

/// Parse the `proc=image,proc2=image2` mapping.
pub fn parse_process_images(input: &str) -> MonitorResult<HashMap<String, String>> {
    let mut images = HashMap::new();
    for entry in input.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (name, image) = entry.split_once('=').ok_or_else(|| {
            MonitorError::Config(format!("process-image entry {entry:?} is missing '='"))
        })?;
        let (name, image) = (name.trim(), image.trim());
        if name.is_empty() || image.is_empty() {
            return Err(MonitorError::Config(format!(
                "process-image entry {entry:?} is incomplete"
            )));
        }
        images.insert(name.to_string(), image.to_string());
    }
    Ok(images)
}
