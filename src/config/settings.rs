use crate::utils::error::{Result, RunbookError};
use crate::utils::validation::{validate_fqdn, validate_positive_number, validate_url, Validate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalSettings {
    #[serde(default = "default_sal_host")]
    pub host: String,
    #[serde(default = "default_sal_port")]
    pub port: u16,
    #[serde(default = "default_sal_channel")]
    pub channel: String,
}

fn default_sal_host() -> String {
    "wm-bot.wm-bot.wmcloud.org".to_string()
}

fn default_sal_port() -> u16 {
    64835
}

fn default_sal_channel() -> String {
    "#wikimedia-cloud-feed".to_string()
}

impl Default for SalSettings {
    fn default() -> Self {
        Self {
            host: default_sal_host(),
            port: default_sal_port(),
            channel: default_sal_channel(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertSettings {
    pub alertmanager_url: String,
    #[serde(default = "default_silence_hours")]
    pub default_silence_hours: u64,
}

fn default_silence_hours() -> u64 {
    4
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            alertmanager_url: "http://localhost:9093".to_string(),
            default_silence_hours: default_silence_hours(),
        }
    }
}

/// Static inventory of one Ceph cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CephClusterSettings {
    pub mon_nodes: Vec<String>,
    pub osd_drives_per_host: usize,
    pub domain: String,
}

/// Static inventory of one OpenStack deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenstackClusterSettings {
    pub control_node: String,
    pub domain: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSettings {
    pub master_node: String,
}

/// Runbook settings, the static replacement for the inventory service.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub sal: SalSettings,
    #[serde(default)]
    pub alerts: AlertSettings,
    #[serde(default)]
    pub ceph: HashMap<String, CephClusterSettings>,
    #[serde(default)]
    pub openstack: HashMap<String, OpenstackClusterSettings>,
    #[serde(default)]
    pub grid: HashMap<String, GridSettings>,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Settings> {
        let raw = std::fs::read_to_string(path)?;
        let settings = Settings::from_toml(&raw)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_toml(raw: &str) -> Result<Settings> {
        Ok(toml::from_str(raw)?)
    }

    pub fn ceph_cluster(&self, cluster_name: &str) -> Result<&CephClusterSettings> {
        self.ceph
            .get(cluster_name)
            .ok_or_else(|| RunbookError::ConfigError {
                message: format!(
                    "unknown ceph cluster '{}', configured ones: {:?}",
                    cluster_name,
                    self.ceph.keys().collect::<Vec<_>>()
                ),
            })
    }

    pub fn openstack_cluster(&self, cluster_name: &str) -> Result<&OpenstackClusterSettings> {
        self.openstack
            .get(cluster_name)
            .ok_or_else(|| RunbookError::ConfigError {
                message: format!(
                    "unknown openstack cluster '{}', configured ones: {:?}",
                    cluster_name,
                    self.openstack.keys().collect::<Vec<_>>()
                ),
            })
    }

    pub fn grid_project(&self, project: &str) -> Result<&GridSettings> {
        self.grid
            .get(project)
            .ok_or_else(|| RunbookError::ConfigError {
                message: format!(
                    "unknown grid project '{}', configured ones: {:?}",
                    project,
                    self.grid.keys().collect::<Vec<_>>()
                ),
            })
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        validate_url("alerts.alertmanager_url", &self.alerts.alertmanager_url)?;

        for (name, cluster) in &self.ceph {
            if cluster.mon_nodes.is_empty() {
                return Err(RunbookError::ConfigError {
                    message: format!("ceph cluster '{}' has no mon nodes", name),
                });
            }

            for mon_node in &cluster.mon_nodes {
                validate_fqdn(&format!("ceph.{}.mon_nodes", name), mon_node)?;
            }

            validate_positive_number(
                &format!("ceph.{}.osd_drives_per_host", name),
                cluster.osd_drives_per_host,
                1,
            )?;
        }

        for (name, cluster) in &self.openstack {
            validate_fqdn(&format!("openstack.{}.control_node", name), &cluster.control_node)?;
        }

        for (name, grid) in &self.grid {
            validate_fqdn(&format!("grid.{}.master_node", name), &grid.master_node)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [alerts]
        alertmanager_url = "http://alertmanager.svc:9093"

        [ceph.eqiad1]
        mon_nodes = ["cloudcephmon1001.eqiad.wmnet", "cloudcephmon1002.eqiad.wmnet"]
        osd_drives_per_host = 8
        domain = "eqiad.wmnet"

        [openstack.eqiad1]
        control_node = "cloudcontrol1005.eqiad.wmnet"
        domain = "eqiad.wmnet"

        [grid.tools]
        master_node = "tools-sgegrid-master.tools.eqiad1.wikimedia.cloud"
    "#;

    #[test]
    fn sample_settings_parse_and_validate() {
        let settings = Settings::from_toml(SAMPLE).unwrap();
        settings.validate().unwrap();

        let ceph = settings.ceph_cluster("eqiad1").unwrap();
        assert_eq!(ceph.mon_nodes.len(), 2);
        assert_eq!(ceph.osd_drives_per_host, 8);
        assert_eq!(settings.sal.port, 64835);
    }

    #[test]
    fn unknown_cluster_is_a_config_error() {
        let settings = Settings::from_toml(SAMPLE).unwrap();
        assert!(matches!(
            settings.ceph_cluster("codfw1dev"),
            Err(RunbookError::ConfigError { .. })
        ));
    }

    #[test]
    fn empty_mon_nodes_fail_validation() {
        let settings = Settings::from_toml(
            r#"
            [ceph.empty]
            mon_nodes = []
            osd_drives_per_host = 8
            domain = "eqiad.wmnet"
            "#,
        )
        .unwrap();

        assert!(settings.validate().is_err());
    }
}
