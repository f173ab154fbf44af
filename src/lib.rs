//! Collector for RDS Enhanced Monitoring OS metrics.
//!
//! Reads per-process and per-CPU snapshots from the `RDSOSMetrics` log
//! stream, aggregates them over a configurable window, and republishes
//! summary statistics (sum, minimum, maximum, sample count) to CloudWatch.

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod logs;
pub mod metadata;
pub mod publish;
pub mod record;
pub mod runner;
