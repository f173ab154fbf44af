//! Process name classification.
//!
//! Enhanced Monitoring reports every OS process by its raw command-line
//! name. Published metrics group processes into a small set of service
//! buckets instead of tracking individual PIDs, so names are folded into
//! a [`ServiceCategory`] before aggregation.

/// Service bucket a raw process name folds into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceCategory {
    /// The main postgres server process and client backends.
    Postgres,
    /// Aurora/RDS-internal postgres sessions (rdsadmin, aurora workers).
    PostgresAurora,
    /// Background postgres workers (checkpointer, walwriter, etc.).
    PostgresBackground,
    /// The Aurora distributed storage daemon.
    AuroraStorage,
    /// The RDS management agent bucket.
    RdsProcesses,
    /// The host OS bucket.
    OsProcesses,
    /// Anything that matched no rule.
    Unknown,
}

impl ServiceCategory {
    /// Returns the canonical dimension value for publication.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::PostgresAurora => "postgres-aurora",
            Self::PostgresBackground => "postgres-background",
            Self::AuroraStorage => "aurora-storage",
            Self::RdsProcesses => "rds-processes",
            Self::OsProcesses => "os-processes",
            Self::Unknown => "unknown",
        }
    }
}

/// Classify a raw process name into its service bucket.
///
/// The `postgres:` prefix rules form a waterfall: the more specific
/// prefixes must be tested before the generic one, so a session name like
/// `postgres: rdsadmin idle` lands in [`ServiceCategory::PostgresAurora`]
/// and never reaches the catch-all background rule.
pub fn classify(name: &str) -> ServiceCategory {
    if name == "postgres" || name.starts_with("postgres: postgres") {
        return ServiceCategory::Postgres;
    }

    if name.starts_with("postgres: rdsadmin") || name.starts_with("postgres: aurora") {
        return ServiceCategory::PostgresAurora;
    }

    if name.starts_with("postgres: ") || name == "pg_controldata" {
        return ServiceCategory::PostgresBackground;
    }

    match name {
        "Aurora Storage Daemon" => ServiceCategory::AuroraStorage,
        "RDS processes" => ServiceCategory::RdsProcesses,
        "OS processes" => ServiceCategory::OsProcesses,
        _ => ServiceCategory::Unknown,
    }
}
