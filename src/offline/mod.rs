//! Offline (demo) data
//!
//! Used when a provider could not reach its backend at construction. Fixtures
//! are fixed; metric series are synthesized around a per-role baseline.

/// Fixed sample instances, status and console log
pub mod fixtures;

/// Seeded metric series synthesizer
pub mod synth;

pub use fixtures::{
    console_log, instance_status, sample_instances, INSTANCE_METRIC_NAMES, SAMPLE_BACKUP_ID,
    SAMPLE_DATABASE_ID, SAMPLE_WEB_ID,
};
pub use synth::{MetricFamily, Synthesizer};

/// Demo role of an instance, inferred from its identifier
///
/// Only synthetic data generation looks at this. Live inventory never infers roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Web,
    Database,
    Backup,
}

impl Role {
    /// Infer the role from an instance id or name by substring match
    pub fn infer(identifier: &str) -> Self {
        let lower = identifier.to_lowercase();
        if lower.contains("database") || lower.contains("0987654321") {
            Role::Database
        } else if lower.contains("backup") || lower.contains("abcdef1234") {
            Role::Backup
        } else {
            Role::Web
        }
    }

    /// Average CPU utilization (percent) the synthetic series centers on
    pub fn cpu_baseline(&self) -> f64 {
        match self {
            Role::Web => 45.0,
            Role::Database => 75.0,
            Role::Backup => 0.0,
        }
    }

    /// Bytes per period for network series
    pub fn network_baseline(&self) -> f64 {
        match self {
            Role::Web => 1_500_000.0,
            Role::Database => 4_000_000.0,
            Role::Backup => 0.0,
        }
    }

    /// Bytes per period for disk series
    pub fn disk_baseline(&self) -> f64 {
        match self {
            Role::Web => 800_000.0,
            Role::Database => 3_000_000.0,
            Role::Backup => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_inference() {
        assert_eq!(Role::infer(SAMPLE_DATABASE_ID), Role::Database);
        assert_eq!(Role::infer(SAMPLE_BACKUP_ID), Role::Backup);
        assert_eq!(Role::infer(SAMPLE_WEB_ID), Role::Web);
        assert_eq!(Role::infer("Nightly-Backup-Host"), Role::Backup);
        assert_eq!(Role::infer("orders-DATABASE-1"), Role::Database);
        assert_eq!(Role::infer("i-unknown"), Role::Web);
    }

    #[test]
    fn test_backup_role_is_idle() {
        assert_eq!(Role::Backup.cpu_baseline(), 0.0);
        assert_eq!(Role::Backup.network_baseline(), 0.0);
        assert_eq!(Role::Backup.disk_baseline(), 0.0);
        assert!(Role::Database.cpu_baseline() > Role::Web.cpu_baseline());
    }
}
