//! Invocation orchestration.
//!
//! One invocation resolves the instance's resource id through the cache,
//! fetches the log window, decodes it (skipping malformed payloads), runs
//! both aggregation passes, and publishes both metric families. The two
//! families publish independently: a failure in one is caught at its pass
//! boundary and does not stop the other, but the invocation still reports
//! failure so a scheduler retries it.

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::aggregate::{aggregate_cpu, aggregate_processes};
use crate::config::Config;
use crate::logs::{LogSource, RawLogEvent};
use crate::metadata::{self, InstanceMetadata, ResourceIdCache};
use crate::publish::{publish_pass, MetricPublisher};
use crate::record::{parse_record, LogRecord};

/// Outcome of one collection over the log window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvocationSummary {
    /// Records decoded and aggregated.
    pub records: u64,
    /// Payloads skipped because they failed to decode.
    pub rejected: u64,
    /// Statistics published across both families.
    pub published: usize,
}

/// Decode raw log events, skipping and counting undecodable payloads.
pub fn decode_records(raw: &[RawLogEvent]) -> (Vec<LogRecord>, u64) {
    let mut records = Vec::with_capacity(raw.len());
    let mut rejected = 0u64;

    for event in raw {
        match parse_record(event.timestamp_millis, &event.message) {
            Ok(record) => records.push(record),
            Err(e) => {
                debug!(
                    timestamp = event.timestamp_millis,
                    error = %e,
                    "skipping malformed log record",
                );
                rejected += 1;
            }
        }
    }

    (records, rejected)
}

/// Run one full collection: fetch, decode, aggregate, publish.
pub async fn run_once<M, L, P>(
    cfg: &Config,
    metadata_client: &M,
    logs: &L,
    publisher: &P,
    cache: &mut ResourceIdCache,
) -> Result<InvocationSummary>
where
    M: InstanceMetadata,
    L: LogSource,
    P: MetricPublisher,
{
    // 1. Resolve the log stream name through the cross-invocation cache.
    let resource_id = metadata::resource_id_for(metadata_client, cache, &cfg.instance_id)
        .await
        .context("resolving resource id")?;

    // 2. Fetch the window of raw log events.
    let since_millis = window_start_millis(cfg)?;
    let raw = logs
        .fetch_since(&resource_id, since_millis)
        .await
        .context("fetching log window")?;

    // 3. Decode, tolerating per-record failures.
    let (records, rejected) = decode_records(&raw);
    if rejected > 0 {
        warn!(rejected, "skipped undecodable log records");
    }

    info!(
        instance_id = %cfg.instance_id,
        records = records.len(),
        rejected,
        "aggregating window",
    );

    // 4. Aggregate both metric families over the same record set.
    let process_pass = aggregate_processes(&cfg.instance_id, &records);
    let cpu_pass = aggregate_cpu(&cfg.instance_id, &records);

    // 5. Publish. The families are independent; attempt both even if the
    // first fails, then surface the first error.
    let mut published = 0usize;

    let os_result = publish_pass(publisher, &cfg.os_namespace, &process_pass).await;
    match &os_result {
        Ok(count) => published += count,
        Err(e) => error!(namespace = %cfg.os_namespace, error = %e, "publishing failed"),
    }

    let cpu_result = publish_pass(publisher, &cfg.cpu_namespace, &cpu_pass).await;
    match &cpu_result {
        Ok(count) => published += count,
        Err(e) => error!(namespace = %cfg.cpu_namespace, error = %e, "publishing failed"),
    }

    os_result?;
    cpu_result?;

    Ok(InvocationSummary {
        records: process_pass.records,
        rejected,
        published,
    })
}

/// Collect once per interval until cancelled. Per-tick failures are logged
/// and retried on the next tick.
pub async fn run_loop<M, L, P>(
    cfg: &Config,
    metadata_client: &M,
    logs: &L,
    publisher: &P,
    cancel: CancellationToken,
) -> Result<()>
where
    M: InstanceMetadata,
    L: LogSource,
    P: MetricPublisher,
{
    let mut cache = ResourceIdCache::new();
    let mut ticker = tokio::time::interval(cfg.interval);

    info!(
        instance_id = %cfg.instance_id,
        interval = ?cfg.interval,
        "collector loop started",
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("collector loop stopped");
                return Ok(());
            }
            _ = ticker.tick() => {
                match run_once(cfg, metadata_client, logs, publisher, &mut cache).await {
                    Ok(summary) => info!(
                        records = summary.records,
                        rejected = summary.rejected,
                        published = summary.published,
                        "collection complete",
                    ),
                    Err(e) => error!(error = %e, "collection failed, retrying next tick"),
                }
            }
        }
    }
}

/// Start of the aggregation window: now minus the configured interval.
fn window_start_millis(cfg: &Config) -> Result<i64> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock before epoch")?;

    let window = now.saturating_sub(cfg.interval);

    i64::try_from(window.as_millis()).context("window start does not fit in millis")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(message: &str) -> RawLogEvent {
        RawLogEvent {
            timestamp_millis: 1_700_000_000_000,
            message: message.to_string(),
        }
    }

    const VALID: &str = r#"{
        "processList": [{"name": "postgres", "cpuUsedPc": 1.0, "memoryUsedPc": 2.0}],
        "cpuUtilization": {"user": 3.0}
    }"#;

    #[test]
    fn test_decode_records_all_valid() {
        let raw = vec![event(VALID), event(VALID)];
        let (records, rejected) = decode_records(&raw);
        assert_eq!(records.len(), 2);
        assert_eq!(rejected, 0);
    }

    #[test]
    fn test_decode_records_skips_malformed() {
        let raw = vec![event(VALID), event("{broken"), event(VALID)];
        let (records, rejected) = decode_records(&raw);
        assert_eq!(records.len(), 2);
        assert_eq!(rejected, 1);
    }

    #[test]
    fn test_malformed_batch_matches_clean_batch() {
        // A batch with one bad payload must aggregate identically to the
        // batch with it removed; only the rejected count differs.
        let dirty = vec![event(VALID), event(r#"{"cpuUtilization": {}}"#), event(VALID)];
        let clean = vec![event(VALID), event(VALID)];

        let (dirty_records, dirty_rejected) = decode_records(&dirty);
        let (clean_records, clean_rejected) = decode_records(&clean);

        assert_eq!(dirty_rejected, clean_rejected + 1);

        let dirty_pass = aggregate_processes("db-1", &dirty_records);
        let clean_pass = aggregate_processes("db-1", &clean_records);
        assert_eq!(dirty_pass.records, clean_pass.records);
        assert_eq!(dirty_pass.table, clean_pass.table);
    }
}
