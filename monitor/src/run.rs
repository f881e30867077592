use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use alerts::{DEFAULT_PRIORITY, Fanout, SplunkSink, SyslogConfig, SyslogProto, SyslogSink};
use scanner::{DigestRegistry, Scanner};
use snapshot::{MinioConfig, MinioStore};
use workload::{InClusterApi, WorkloadApi};

use crate::config::{RunArgs, parse_process_images};
use crate::engine::{Engine, EngineConfig, Target};
use crate::error::{MonitorError, MonitorResult};
use crate::graceful;
use crate::options::parse_monitoring_options;
use crate::procroot::ProcessRoots;

const LOG_TAG_SYSLOG: &str = "integrity-monitor";
const PUT_TIMEOUT: Duration = Duration::from_secs(3);

/// Assemble the collaborators from the CLI surface and run the engine
/// until a shutdown signal.
pub async fn run(args: RunArgs) -> MonitorResult<()> {
    let parsed_targets = parse_monitoring_options(&args.monitoring_options)?;
    let images = parse_process_images(&args.process_image)?;

    if !args.minio_enabled {
        return Err(MonitorError::Config(
            "a snapshot store is required; the MinIO store cannot be disabled".into(),
        ));
    }
    if args.minio_access_key.is_empty() || args.minio_secret_key.is_empty() {
        return Err(MonitorError::Config(
            "MinIO credentials are missing (MINIO_SERVER_USER / MINIO_SERVER_PASSWORD)".into(),
        ));
    }

    // The workload identity feeds snapshot keys and alert metadata, so it
    // is discovered before anything else.
    let primary_image = parsed_targets
        .first()
        .and_then(|t| images.get(&t.process_name))
        .cloned()
        .unwrap_or_default();
    let workload: Arc<dyn WorkloadApi> = Arc::new(InClusterApi::discover(primary_image).await?);
    let identity = workload.identity().clone();

    let mut targets = Vec::with_capacity(parsed_targets.len());
    for parsed in parsed_targets {
        let image = images
            .get(&parsed.process_name)
            .cloned()
            .unwrap_or_else(|| identity.image.clone());
        if image.is_empty() {
            return Err(MonitorError::Config(format!(
                "no image configured for process {:?}",
                parsed.process_name
            )));
        }
        targets.push(Target {
            process_name: parsed.process_name,
            relative_paths: parsed.paths,
            image,
        });
    }

    let store = Arc::new(MinioStore::new(MinioConfig::new(
        args.minio_host.clone(),
        args.minio_access_key.clone(),
        args.minio_secret_key.clone(),
    ))?);

    let mut fanout = Fanout::new();
    if args.splunk_enabled {
        if args.splunk_url.is_empty() || args.splunk_token.is_empty() {
            return Err(MonitorError::Config(
                "splunk sink enabled but splunk-url or splunk-token is missing".into(),
            ));
        }
        let sink = SplunkSink::new(
            &args.splunk_url,
            &args.splunk_token,
            args.splunk_insecure_skip_verify,
        )
        .map_err(|e| MonitorError::Config(e.to_string()))?;
        fanout.register(Box::new(sink));
    }
    if args.syslog_enabled {
        let proto: SyslogProto = args.syslog_proto.parse().map_err(MonitorError::Config)?;
        let namespace = if args.pod_namespace.is_empty() {
            identity.namespace.clone()
        } else {
            args.pod_namespace.clone()
        };
        fanout.register(Box::new(SyslogSink::new(SyslogConfig {
            host: args.syslog_host.clone(),
            port: args.syslog_port,
            proto,
            priority: DEFAULT_PRIORITY,
            tag: LOG_TAG_SYSLOG.into(),
            pod: identity.pod_name.clone(),
            namespace,
            cluster: args.cluster_name.clone(),
            images: images.clone(),
        })));
    }
    let fanout = Arc::new(fanout);

    let algorithm = DigestRegistry::with_defaults().resolve(&args.algorithm);
    let workers = args.count_workers.unwrap_or_else(Scanner::default_workers);
    let scanner = Scanner::new(algorithm, workers);

    let heartbeat_process = targets
        .first()
        .map(|t| t.process_name.clone())
        .unwrap_or_default();
    let engine = Engine::new(
        EngineConfig {
            interval: args.duration_time,
            bucket: args.minio_bucket.clone(),
            put_timeout: PUT_TIMEOUT,
        },
        scanner,
        store,
        Arc::clone(&fanout),
        workload,
        ProcessRoots::new(),
        targets,
    );

    info!(
        workload = %identity.workload_name,
        namespace = %identity.namespace,
        sinks = fanout.len(),
        interval = ?args.duration_time,
        "integrity monitor starting"
    );

    graceful::run_until_signalled(|token| async move {
        let heartbeat_token = token.child_token();
        let heartbeat = tokio::spawn(alerts::heartbeat_loop(
            Arc::clone(&fanout),
            args.heartbeat_interval,
            heartbeat_process,
            heartbeat_token.clone(),
        ));

        let result = engine.run(token).await;

        heartbeat_token.cancel();
        let _ = heartbeat.await;
        result
    })
    .await
}
