use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket};

use crate::{Alert, Sink, SinkError, event_type_code};

const SINK_NAME: &str = "syslog";

/// LOG_WARNING | LOG_DAEMON.
pub const DEFAULT_PRIORITY: u8 = 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyslogProto {
    Tcp,
    Udp,
}

impl FromStr for SyslogProto {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            other => Err(format!("unknown syslog protocol {other:?}")),
        }
    }
}

impl fmt::Display for SyslogProto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
            Self::Udp => write!(f, "udp"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyslogConfig {
    pub host: String,
    pub port: u16,
    pub proto: SyslogProto,
    pub priority: u8,
    /// Record tag, conventionally the program name.
    pub tag: String,
    /// Pod (host) name carried in each record.
    pub pod: String,
    pub namespace: String,
    pub cluster: String,
    /// Monitored process name → image reference, for the `image=` field.
    pub images: HashMap<String, String>,
}

/// Syslog forwarder writing one single-line record per alert. Dials per
/// send: monitored targets restart rarely and a held connection would go
/// stale across syslog relay restarts.
#[derive(Debug)]
pub struct SyslogSink {
    config: SyslogConfig,
}

impl SyslogSink {
    pub fn new(config: SyslogConfig) -> Self {
        Self { config }
    }

    fn address(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    fn format_record(&self, alert: &Alert) -> String {
        let header = format!(
            "<{}>{} {} {}[{}]:",
            self.config.priority,
            alert.time.format("%b %e %H:%M:%S"),
            self.config.pod,
            self.config.tag,
            std::process::id(),
        );
        let image = self
            .config
            .images
            .get(&alert.process_name)
            .map(String::as_str)
            .unwrap_or_default();
        format!(
            "{header} time={} event-type={:04} service={} pod={} image={} namespace={} \
             cluster={} message={} file={} reason={}\n",
            alert.time.format("%b %e %H:%M:%S"),
            event_type_code(&alert.reason),
            alert.process_name,
            self.config.pod,
            image,
            self.config.namespace,
            self.config.cluster,
            alert.message,
            alert.path,
            alert.reason,
        )
    }
}

#[async_trait]
impl Sink for SyslogSink {
    fn name(&self) -> &str {
        SINK_NAME
    }

    async fn send(&self, alert: &Alert) -> Result<(), SinkError> {
        let record = self.format_record(alert);
        let addr = self.address();
        match self.config.proto {
            SyslogProto::Tcp => {
                let mut stream = TcpStream::connect(addr.as_str())
                    .await
                    .map_err(|e| SinkError::new(SINK_NAME, format!("connect {addr}: {e}")))?;
                stream
                    .write_all(record.as_bytes())
                    .await
                    .map_err(|e| SinkError::new(SINK_NAME, format!("write {addr}: {e}")))?;
                stream
                    .shutdown()
                    .await
                    .map_err(|e| SinkError::new(SINK_NAME, format!("close {addr}: {e}")))?;
            }
            SyslogProto::Udp => {
                let socket = UdpSocket::bind("0.0.0.0:0")
                    .await
                    .map_err(|e| SinkError::new(SINK_NAME, format!("bind udp: {e}")))?;
                socket
                    .send_to(record.as_bytes(), addr.as_str())
                    .await
                    .map_err(|e| SinkError::new(SINK_NAME, format!("send {addr}: {e}")))?;
            }
        }
        Ok(())
    }
}
