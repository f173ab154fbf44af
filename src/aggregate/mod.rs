//! Aggregation of decoded log records into per-dimension statistics.
//!
//! Two independent passes walk the same record window: one over the
//! per-process entries (grouped by service bucket, CPU and Memory
//! percentages), one over the host `cpuUtilization` fields. They stay
//! separate because they feed two metric namespaces with different
//! dimension shapes.

pub mod dimension;
pub mod stat;

use std::collections::HashMap;
use std::hash::Hash;

use tracing::debug;

use crate::classify::{classify, ServiceCategory};
use crate::record::LogRecord;

use dimension::{CpuDimension, ProcessDimension, ProcessMetric};
use stat::StatAccumulator;

/// Output of one aggregation pass: the finished table plus the number of
/// records that fed it.
///
/// The record count is the published sample count for every key in the
/// table. It counts time slices, not per-process observations, so
/// sum / sample count remains the per-interval average even when a record
/// contributes several processes to one key.
#[derive(Debug)]
pub struct Pass<K> {
    pub table: HashMap<K, StatAccumulator>,
    pub records: u64,
}

impl<K: Eq + Hash> Pass<K> {
    fn new() -> Self {
        Self {
            table: HashMap::new(),
            records: 0,
        }
    }

    fn update(&mut self, key: K, value: f64) {
        self.table.entry(key).or_default().update(value);
    }
}

/// Pass A: per-process CPU and memory percentages, grouped by service
/// bucket.
pub fn aggregate_processes(instance_id: &str, records: &[LogRecord]) -> Pass<ProcessDimension> {
    let mut pass = Pass::new();

    for record in records {
        for process in &record.processes {
            let service = classify(&process.name);
            if service == ServiceCategory::Unknown {
                debug!(name = %process.name, "process matched no known service");
            }

            pass.update(
                ProcessDimension {
                    instance: instance_id.to_string(),
                    service,
                    metric: ProcessMetric::Cpu,
                },
                process.cpu_used_pct,
            );
            pass.update(
                ProcessDimension {
                    instance: instance_id.to_string(),
                    service,
                    metric: ProcessMetric::Memory,
                },
                process.memory_used_pct,
            );
        }

        pass.records += 1;
    }

    pass
}

/// Pass B: host CPU utilization fields, one accumulator per field name.
pub fn aggregate_cpu(instance_id: &str, records: &[LogRecord]) -> Pass<CpuDimension> {
    let mut pass = Pass::new();

    for record in records {
        for (metric, value) in &record.cpu_utilization {
            pass.update(
                CpuDimension {
                    instance: instance_id.to_string(),
                    metric: metric.clone(),
                },
                *value,
            );
        }

        pass.records += 1;
    }

    pass
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::record::ProcessSample;

    fn record(processes: Vec<ProcessSample>, cpu: &[(&str, f64)]) -> LogRecord {
        LogRecord {
            timestamp_millis: 0,
            processes,
            cpu_utilization: cpu
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect::<HashMap<_, _>>(),
        }
    }

    fn postgres(cpu: f64, mem: f64) -> ProcessSample {
        ProcessSample {
            name: "postgres".to_string(),
            cpu_used_pct: cpu,
            memory_used_pct: mem,
        }
    }

    fn process_key(service: ServiceCategory, metric: ProcessMetric) -> ProcessDimension {
        ProcessDimension {
            instance: "db-1".to_string(),
            service,
            metric,
        }
    }

    #[test]
    fn test_process_pass_accumulates_per_service() {
        let records = vec![
            record(vec![postgres(10.0, 1.0)], &[]),
            record(vec![postgres(20.0, 2.0)], &[]),
            record(vec![postgres(30.0, 3.0)], &[]),
        ];

        let pass = aggregate_processes("db-1", &records);
        assert_eq!(pass.records, 3);

        let cpu = pass
            .table
            .get(&process_key(ServiceCategory::Postgres, ProcessMetric::Cpu))
            .expect("cpu accumulator");
        assert_eq!(cpu.count(), 3);
        assert_eq!(cpu.sum(), 60.0);
        assert_eq!(cpu.min(), 10.0);
        assert_eq!(cpu.max(), 30.0);
        assert_eq!(cpu.mean(), Some(20.0));

        let mem = pass
            .table
            .get(&process_key(
                ServiceCategory::Postgres,
                ProcessMetric::Memory,
            ))
            .expect("memory accumulator");
        assert_eq!(mem.sum(), 6.0);
    }

    #[test]
    fn test_record_count_is_per_record_not_per_sample() {
        // Two backends in one record: the accumulator sees two updates,
        // but only one time slice was observed.
        let records = vec![record(
            vec![postgres(10.0, 1.0), postgres(30.0, 3.0)],
            &[],
        )];

        let pass = aggregate_processes("db-1", &records);
        assert_eq!(pass.records, 1);

        let cpu = pass
            .table
            .get(&process_key(ServiceCategory::Postgres, ProcessMetric::Cpu))
            .expect("cpu accumulator");
        assert_eq!(cpu.count(), 2);
        assert_eq!(cpu.sum(), 40.0);
    }

    #[test]
    fn test_unknown_processes_still_aggregate() {
        let records = vec![record(
            vec![ProcessSample {
                name: "mystery-daemon".to_string(),
                cpu_used_pct: 4.0,
                memory_used_pct: 8.0,
            }],
            &[],
        )];

        let pass = aggregate_processes("db-1", &records);
        let acc = pass
            .table
            .get(&process_key(ServiceCategory::Unknown, ProcessMetric::Cpu))
            .expect("unknown bucket");
        assert_eq!(acc.sum(), 4.0);
    }

    #[test]
    fn test_cpu_pass_accumulates_per_field() {
        let records = vec![
            record(vec![], &[("user", 2.0), ("idle", 97.0)]),
            record(vec![], &[("user", 4.0), ("idle", 93.0)]),
        ];

        let pass = aggregate_cpu("db-1", &records);
        assert_eq!(pass.records, 2);

        let user = pass
            .table
            .get(&CpuDimension {
                instance: "db-1".to_string(),
                metric: "user".to_string(),
            })
            .expect("user accumulator");
        assert_eq!(user.count(), 2);
        assert_eq!(user.sum(), 6.0);
        assert_eq!(user.min(), 2.0);
        assert_eq!(user.max(), 4.0);
    }

    #[test]
    fn test_passes_see_equal_record_counts() {
        let records = vec![
            record(vec![postgres(1.0, 1.0)], &[("user", 2.0)]),
            record(vec![], &[]),
            record(vec![postgres(2.0, 2.0)], &[("user", 3.0)]),
        ];

        let a = aggregate_processes("db-1", &records);
        let b = aggregate_cpu("db-1", &records);
        assert_eq!(a.records, b.records);
        assert_eq!(a.records, 3);
    }

    #[test]
    fn test_empty_collections_contribute_nothing() {
        let records = vec![record(vec![], &[])];

        let a = aggregate_processes("db-1", &records);
        let b = aggregate_cpu("db-1", &records);

        assert_eq!(a.records, 1);
        assert_eq!(b.records, 1);
        assert!(a.table.is_empty());
        assert!(b.table.is_empty());
    }

    #[test]
    fn test_untouched_keys_never_appear() {
        let records = vec![record(vec![postgres(1.0, 1.0)], &[])];

        let pass = aggregate_processes("db-1", &records);
        // Only the postgres CPU and Memory keys exist; no other bucket
        // appears, and every entry holds at least one observation.
        assert_eq!(pass.table.len(), 2);
        assert!(pass.table.values().all(|acc| !acc.is_empty()));
    }
}
