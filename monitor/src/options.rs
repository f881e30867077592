use crate::error::{MonitorError, MonitorResult};

/// One monitored process and the path prefixes to watch beneath its root
/// filesystem, in configuration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoringTarget {
    pub process_name: String,
    pub paths: Vec<String>,
}

/// Parse the compact monitoring-options string:
/// `proc=path1,path2 proc2=path3`. Entries are whitespace-separated, paths
/// comma-separated; stray commas are ignored. A single layer of shell
/// quoting around the whole value is stripped.
pub fn parse_monitoring_options(input: &str) -> MonitorResult<Vec<MonitoringTarget>> {
    let input = strip_quotes(input.trim());
    if input.is_empty() {
        return Err(MonitorError::Config("monitoring options are empty".into()));
    }

    let mut targets = Vec::new();
    for entry in input.split_whitespace() {
        let (name, paths) = entry.split_once('=').ok_or_else(|| {
            MonitorError::Config(format!("monitoring entry {entry:?} is missing '='"))
        })?;
        let name = name.trim();
        if name.is_empty() {
            return Err(MonitorError::Config(format!(
                "monitoring entry {entry:?} has no process name"
            )));
        }
        let paths: Vec<String> = paths
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect();
        if paths.is_empty() {
            return Err(MonitorError::Config(format!(
                "no monitoring paths for process {name:?}"
            )));
        }
        targets.push(MonitoringTarget {
            process_name: name.to_string(),
            paths,
        });
    }
    Ok(targets)
}

fn strip_quotes(s: &str) -> &str {
    for quote in ['\'', '"'] {
        if let Some(inner) = s.strip_prefix(quote).and_then(|s| s.strip_suffix(quote)) {
            return inner;
        }
    }
    s
}
