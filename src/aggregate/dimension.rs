use crate::classify::ServiceCategory;

/// Which per-process percentage a statistic tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessMetric {
    Cpu,
    Memory,
}

impl ProcessMetric {
    /// Returns the published metric name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cpu => "CPU",
            Self::Memory => "Memory",
        }
    }
}

/// Dimension key for per-process metrics: one accumulator per
/// (instance, service bucket, CPU|Memory) combination.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProcessDimension {
    pub instance: String,
    pub service: ServiceCategory,
    pub metric: ProcessMetric,
}

/// Dimension key for host CPU utilization metrics: one accumulator per
/// (instance, utilization field) combination. The metric name is whatever
/// field the record carried (`user`, `system`, `idle`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CpuDimension {
    pub instance: String,
    pub metric: String,
}

/// A grouping key that renders as a published metric name plus the
/// dimension pairs preceding it.
pub trait MetricKey {
    /// The final key component: the metric name.
    fn metric_name(&self) -> &str;

    /// Every key component except the metric name, as (name, value) pairs
    /// in key order.
    fn dimensions(&self) -> Vec<(&'static str, &str)>;
}

impl MetricKey for ProcessDimension {
    fn metric_name(&self) -> &str {
        self.metric.as_str()
    }

    fn dimensions(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("rds_instance", self.instance.as_str()),
            ("service", self.service.as_str()),
        ]
    }
}

impl MetricKey for CpuDimension {
    fn metric_name(&self) -> &str {
        &self.metric
    }

    fn dimensions(&self) -> Vec<(&'static str, &str)> {
        vec![("rds_instance", self.instance.as_str())]
    }
}
