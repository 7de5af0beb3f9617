use crate::utils::error::{Result, RunbookError};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

/// osdmap flags the cluster understands (`ceph osd set <flag>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CephOsdFlag {
    /// cluster marked as full, stops serving writes
    Full,
    /// stop serving writes and reads
    Pause,
    /// avoid marking osds as up (serving traffic)
    Noup,
    /// avoid marking osds as down (stop serving traffic)
    Nodown,
    /// avoid marking osds as out (would trigger rebalancing)
    Noout,
    /// avoid marking osds as in (would trigger rebalancing)
    Noin,
    /// avoid backfills (asynchronous recovery from journal log)
    Nobackfill,
    /// avoid rebalancing
    Norebalance,
    /// avoid synchronous recovery of raw data
    Norecover,
    /// avoid running any scrub job
    Noscrub,
    /// avoid running any deep scrub job
    NodeepScrub,
    /// avoid cache tiering activity
    Notieragent,
    /// avoid async deletion of objects from deleted snapshots
    Nosnaptrim,
    /// explicit hard limit of the pg log (deprecated)
    PglogHardlimit,
}

impl CephOsdFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            CephOsdFlag::Full => "full",
            CephOsdFlag::Pause => "pause",
            CephOsdFlag::Noup => "noup",
            CephOsdFlag::Nodown => "nodown",
            CephOsdFlag::Noout => "noout",
            CephOsdFlag::Noin => "noin",
            CephOsdFlag::Nobackfill => "nobackfill",
            CephOsdFlag::Norebalance => "norebalance",
            CephOsdFlag::Norecover => "norecover",
            CephOsdFlag::Noscrub => "noscrub",
            CephOsdFlag::NodeepScrub => "nodeep-scrub",
            CephOsdFlag::Notieragent => "notieragent",
            CephOsdFlag::Nosnaptrim => "nosnaptrim",
            CephOsdFlag::PglogHardlimit => "pglog_hardlimit",
        }
    }

    pub fn parse(raw: &str) -> Option<CephOsdFlag> {
        match raw {
            "full" => Some(CephOsdFlag::Full),
            "pause" => Some(CephOsdFlag::Pause),
            "noup" => Some(CephOsdFlag::Noup),
            "nodown" => Some(CephOsdFlag::Nodown),
            "noout" => Some(CephOsdFlag::Noout),
            "noin" => Some(CephOsdFlag::Noin),
            "nobackfill" => Some(CephOsdFlag::Nobackfill),
            "norebalance" => Some(CephOsdFlag::Norebalance),
            "norecover" => Some(CephOsdFlag::Norecover),
            "noscrub" => Some(CephOsdFlag::Noscrub),
            "nodeep-scrub" => Some(CephOsdFlag::NodeepScrub),
            "notieragent" => Some(CephOsdFlag::Notieragent),
            "nosnaptrim" => Some(CephOsdFlag::Nosnaptrim),
            "pglog_hardlimit" => Some(CephOsdFlag::PglogHardlimit),
            _ => None,
        }
    }
}

impl fmt::Display for CephOsdFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsdClass {
    Hdd,
    Ssd,
    Unknown,
}

impl OsdClass {
    pub fn from_str_lenient(raw: &str) -> OsdClass {
        match raw {
            "hdd" => OsdClass::Hdd,
            "ssd" => OsdClass::Ssd,
            _ => OsdClass::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OsdClass::Hdd => "hdd",
            OsdClass::Ssd => "ssd",
            OsdClass::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsdStatus {
    Up,
    Down,
    Unknown,
}

impl OsdStatus {
    pub fn from_str_lenient(raw: &str) -> OsdStatus {
        match raw {
            "up" => OsdStatus::Up,
            "down" => OsdStatus::Down,
            _ => OsdStatus::Unknown,
        }
    }
}

/// `mgrmap` section of `ceph status -f json`.
#[derive(Debug, Clone, Deserialize)]
pub struct MgrMap {
    pub available: bool,
    #[serde(default)]
    pub num_standbys: u64,
    #[serde(default)]
    pub modules: Vec<String>,
    #[serde(default)]
    pub services: serde_json::Map<String, Value>,
}

// Health warnings from the insecure global_id reclaim advisory, they stay
// around during upgrades and are not a cluster problem.
// https://docs.ceph.com/en/latest/security/CVE-2021-20288/#recommendations
const IGNORED_AUTH_CHECKS: [&str; 2] = [
    "AUTH_INSECURE_GLOBAL_ID_RECLAIM",
    "AUTH_INSECURE_GLOBAL_ID_RECLAIM_ALLOWED",
];

const MAINTENANCE_FLAGS: [CephOsdFlag; 3] =
    [CephOsdFlag::Noout, CephOsdFlag::Norebalance, CephOsdFlag::Noin];

/// Status of a Ceph cluster, as reported by `ceph status -f json`.
#[derive(Debug, Clone)]
pub struct ClusterStatus {
    status: Value,
}

impl ClusterStatus {
    pub fn new(status: Value) -> Self {
        Self { status }
    }

    pub fn raw(&self) -> &Value {
        &self.status
    }

    fn checks(&self) -> serde_json::Map<String, Value> {
        self.status
            .pointer("/health/checks")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }

    fn health_status(&self) -> &str {
        self.status
            .pointer("/health/status")
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    /// Health checks with the temporary auth-reclaim warnings filtered out.
    /// Returns the effective health status alongside the remaining checks.
    fn filtered_health(&self) -> (String, serde_json::Map<String, Value>) {
        let mut checks = self.checks();
        let had_checks = !checks.is_empty();
        for ignored in IGNORED_AUTH_CHECKS {
            checks.remove(ignored);
        }

        let mut status = self.health_status().to_string();
        // if there were no health checks to start with, something was very
        // wrong in the cluster, don't upgrade the status then
        if had_checks && checks.is_empty() {
            status = "HEALTH_OK".to_string();
        }

        (status, checks)
    }

    /// Flags currently set on the osdmap, from the OSDMAP_FLAGS health check
    /// summary ("noout,norebalance flag(s) set").
    pub fn osdmap_set_flags(&self) -> HashSet<CephOsdFlag> {
        let message = self
            .status
            .pointer("/health/checks/OSDMAP_FLAGS/summary/message")
            .and_then(Value::as_str)
            .unwrap_or("");

        if !message.contains("flag(s) set") {
            return HashSet::new();
        }

        message
            .split(' ')
            .next()
            .unwrap_or("")
            .split(',')
            .filter_map(CephOsdFlag::parse)
            .collect()
    }

    /// True when the cluster is HEALTH_WARN only because the maintenance
    /// flags (noout/norebalance/noin) are set.
    pub fn is_in_maintenance(&self) -> bool {
        let (status, checks) = self.filtered_health();
        if status == "HEALTH_OK" {
            return false;
        }

        if checks.len() == 1 && checks.contains_key("OSDMAP_FLAGS") {
            let maintenance: HashSet<CephOsdFlag> = MAINTENANCE_FLAGS.iter().copied().collect();
            return self.osdmap_set_flags().is_subset(&maintenance);
        }

        false
    }

    /// Fail with `ClusterUnhealthy` unless the cluster is healthy.
    pub fn check_healthy(
        &self,
        consider_maintenance_healthy: bool,
        health_issues_to_ignore: &[&str],
    ) -> Result<()> {
        let (status, mut checks) = self.filtered_health();
        if status == "HEALTH_OK" {
            return Ok(());
        }

        for health_issue in health_issues_to_ignore {
            checks.remove(*health_issue);
            if checks.is_empty() {
                return Ok(());
            }
        }

        if consider_maintenance_healthy && self.is_in_maintenance() && checks.len() == 1 {
            return Ok(());
        }

        Err(RunbookError::ClusterUnhealthy {
            details: serde_json::to_string_pretty(
                self.status.pointer("/health").unwrap_or(&Value::Null),
            )
            .unwrap_or_default(),
        })
    }

    /// Current in-progress events (`progress_events` section).
    pub fn progress_events(&self) -> serde_json::Map<String, Value> {
        self.status
            .pointer("/progress_events")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }

    pub fn health_issues(&self) -> serde_json::Map<String, Value> {
        self.checks()
    }

    pub fn misplaced_objects(&self) -> u64 {
        self.status
            .pointer("/pgmap/misplaced_objects")
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }

    pub fn mgr_map(&self) -> Result<MgrMap> {
        let mgrmap = self.status.pointer("/mgrmap").cloned().ok_or_else(|| {
            RunbookError::MalformedOutput {
                command: "ceph status".to_string(),
                reason: "missing 'mgrmap' section".to_string(),
            }
        })?;

        Ok(serde_json::from_value(mgrmap)?)
    }

    pub fn health_details(&self) -> String {
        serde_json::to_string_pretty(self.status.pointer("/health").unwrap_or(&Value::Null))
            .unwrap_or_default()
    }
}
