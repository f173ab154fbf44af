//! Metric publication to the metrics backend.
//!
//! Each finished (dimension key, accumulator) pair becomes one publish
//! call carrying the full statistic set. The sample count is the number of
//! records in the window, not the number of per-process observations, so
//! sum / sample count stays the per-interval average.

use anyhow::{Context, Result};
use aws_sdk_cloudwatch::primitives::DateTime;
use aws_sdk_cloudwatch::types::{Dimension, MetricDatum, StandardUnit, StatisticSet};
use tracing::debug;

use crate::aggregate::dimension::MetricKey;
use crate::aggregate::Pass;

/// Namespace for per-process metrics.
pub const OS_METRICS_NAMESPACE: &str = "RDS_OS_Metrics";

/// Namespace for host CPU utilization metrics.
pub const CPU_METRICS_NAMESPACE: &str = "RDS_CPU_Metrics";

/// One finished statistic ready for publication.
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticDatum {
    pub metric_name: String,
    pub dimensions: Vec<(String, String)>,
    pub sample_count: f64,
    pub sum: f64,
    pub minimum: f64,
    pub maximum: f64,
}

/// Metric publication boundary.
pub trait MetricPublisher: Send + Sync {
    /// Publish one statistic into the given namespace.
    fn publish(
        &self,
        namespace: &str,
        datum: StatisticDatum,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Render a finished pass into publishable statistics.
///
/// Accumulators with zero observations carry min/max sentinels and have no
/// defined mean; they are never emitted.
pub fn datums<K: MetricKey>(pass: &Pass<K>) -> Vec<StatisticDatum> {
    pass.table
        .iter()
        .filter(|(_, acc)| !acc.is_empty())
        .map(|(key, acc)| StatisticDatum {
            metric_name: key.metric_name().to_string(),
            dimensions: key
                .dimensions()
                .into_iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            sample_count: pass.records as f64,
            sum: acc.sum(),
            minimum: acc.min(),
            maximum: acc.max(),
        })
        .collect()
}

/// Publish every statistic of a finished pass. Returns how many were
/// published; fails on the first rejected call.
pub async fn publish_pass<K, P>(publisher: &P, namespace: &str, pass: &Pass<K>) -> Result<usize>
where
    K: MetricKey,
    P: MetricPublisher,
{
    let batch = datums(pass);

    for datum in batch.iter().cloned() {
        publisher
            .publish(namespace, datum)
            .await
            .with_context(|| format!("publishing to {namespace}"))?;
    }

    debug!(namespace, count = batch.len(), "published pass");

    Ok(batch.len())
}

/// CloudWatch-backed publisher.
pub struct CloudWatchPublisher {
    client: aws_sdk_cloudwatch::Client,
}

impl CloudWatchPublisher {
    pub fn new(client: aws_sdk_cloudwatch::Client) -> Self {
        Self { client }
    }
}

impl MetricPublisher for CloudWatchPublisher {
    async fn publish(&self, namespace: &str, datum: StatisticDatum) -> Result<()> {
        let stats = StatisticSet::builder()
            .sample_count(datum.sample_count)
            .sum(datum.sum)
            .minimum(datum.minimum)
            .maximum(datum.maximum)
            .build();

        let mut builder = MetricDatum::builder()
            .metric_name(&datum.metric_name)
            .timestamp(DateTime::from(std::time::SystemTime::now()))
            .unit(StandardUnit::Percent)
            .statistic_values(stats);

        for (name, value) in &datum.dimensions {
            builder = builder.dimensions(
                Dimension::builder()
                    .name(name)
                    .value(value)
                    .build(),
            );
        }

        let metric_datum = builder.build();

        self.client
            .put_metric_data()
            .namespace(namespace)
            .metric_data(metric_datum)
            .send()
            .await
            .with_context(|| format!("putting metric {} to {namespace}", datum.metric_name))?;

        Ok(())
    }
}
