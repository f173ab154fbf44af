use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Top-level configuration for the collector.
///
/// Loadable from a YAML file; the instance id and interval can instead be
/// supplied (or overridden) on the command line.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Database instance identifier to collect metrics for.
    #[serde(default)]
    pub instance_id: String,

    /// Aggregation window; also the tick period in daemon mode.
    /// Default: 1 minute.
    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// Log group holding Enhanced Monitoring snapshots.
    /// Default: "RDSOSMetrics".
    #[serde(default = "default_log_group")]
    pub log_group: String,

    /// Namespace for per-process metrics. Default: "RDS_OS_Metrics".
    #[serde(default = "default_os_namespace")]
    pub os_namespace: String,

    /// Namespace for CPU utilization metrics. Default: "RDS_CPU_Metrics".
    #[serde(default = "default_cpu_namespace")]
    pub cpu_namespace: String,
}

// --- Default value functions ---

fn default_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_log_group() -> String {
    "RDSOSMetrics".to_string()
}

fn default_os_namespace() -> String {
    crate::publish::OS_METRICS_NAMESPACE.to_string()
}

fn default_cpu_namespace() -> String {
    crate::publish::CPU_METRICS_NAMESPACE.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            instance_id: String::new(),
            interval: default_interval(),
            log_group: default_log_group(),
            os_namespace: default_os_namespace(),
            cpu_namespace: default_cpu_namespace(),
        }
    }
}

// --- Validation and loading ---

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;

        let cfg: Config = serde_yaml::from_str(&data)
            .with_context(|| format!("parsing config file {}", path.display()))?;

        Ok(cfg)
    }

    /// Validate the configuration for required fields and consistency.
    pub fn validate(&self) -> Result<()> {
        if self.instance_id.is_empty() {
            bail!("instance_id is required");
        }

        if self.interval.is_zero() {
            bail!("interval must be positive");
        }

        if self.log_group.is_empty() {
            bail!("log_group must not be empty");
        }

        if self.os_namespace.is_empty() || self.cpu_namespace.is_empty() {
            bail!("metric namespaces must not be empty");
        }

        Ok(())
    }
}
