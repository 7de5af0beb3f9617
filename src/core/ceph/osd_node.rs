use crate::domain::model::RunParams;
use crate::domain::ports::{self, Prompter, RemoteExecutor};
use crate::utils::error::{Result, RunbookError};
use serde_json::Value;

/// Controller for a single Ceph OSD host.
pub struct CephOsdNodeController<'a> {
    executor: &'a dyn RemoteExecutor,
    pub node_fqdn: String,
}

impl<'a> CephOsdNodeController<'a> {
    pub fn new(executor: &'a dyn RemoteExecutor, node_fqdn: &str) -> Self {
        Self {
            executor,
            node_fqdn: node_fqdn.to_string(),
        }
    }

    fn is_device_available(device_info: &Value) -> bool {
        let is_disk = device_info.get("type").and_then(Value::as_str) == Some("disk");
        let has_partitions = device_info
            .get("children")
            .and_then(Value::as_array)
            .map(|children| !children.is_empty())
            .unwrap_or(false);
        let is_mounted = device_info
            .get("mountpoint")
            .map(|mountpoint| !mountpoint.is_null())
            .unwrap_or(false);

        is_disk && !has_partitions && !is_mounted
    }

    /// Block devices of the host, from `lsblk --json`.
    pub async fn lsblk(&self) -> Result<Vec<Value>> {
        let output = ports::run_json_object(
            self.executor,
            &self.node_fqdn,
            &["lsblk", "--json"],
            RunParams::SAFE,
        )
        .await?;

        match output.get("blockdevices").and_then(Value::as_array) {
            Some(devices) => Ok(devices.clone()),
            None => Err(RunbookError::MalformedOutput {
                command: "lsblk --json".to_string(),
                reason: format!(
                    "missing 'blockdevices' in: {}",
                    serde_json::to_string_pretty(&output).unwrap_or_default()
                ),
            }),
        }
    }

    /// Disks with no partitions and no mountpoint, candidates for new OSDs.
    pub async fn available_devices(&self) -> Result<Vec<String>> {
        Ok(self
            .lsblk()
            .await?
            .iter()
            .filter(|device_info| Self::is_device_available(device_info))
            .filter_map(|device_info| device_info.get("name").and_then(Value::as_str))
            .map(|name| format!("/dev/{}", name))
            .collect())
    }

    /// Zap the given device. This destroys all the data on it.
    pub async fn zap_device(&self, device_path: &str) -> Result<()> {
        ports::run_raw(
            self.executor,
            &self.node_fqdn,
            &["ceph-volume", "lvm", "zap", device_path],
            RunParams::UNSAFE,
        )
        .await?;
        Ok(())
    }

    /// Set up and start a new bluestore osd on the given device.
    pub async fn create_osd(&self, device_path: &str) -> Result<()> {
        ports::run_raw(
            self.executor,
            &self.node_fqdn,
            &["ceph-volume", "lvm", "create", "--bluestore", "--data", device_path],
            RunParams::UNSAFE,
        )
        .await?;
        Ok(())
    }

    /// Discover and add all the available devices of the node as new OSDs,
    /// asking for confirmation before each one.
    pub async fn add_all_available_devices(&self, prompter: &dyn Prompter) -> Result<()> {
        for device_path in self.available_devices().await? {
            prompter.confirm(&format!(
                "I'm going to destroy and create a new OSD on {}:{}.",
                self.node_fqdn, device_path
            ))?;

            self.zap_device(&device_path).await?;
            self.create_osd(&device_path).await?;
        }

        Ok(())
    }

    /// Check that a 9000-byte jumbo frame makes it to `dst_ip` unfragmented.
    pub async fn check_jumbo_frames_to(&self, dst_ip: &str) -> bool {
        // two probes, the first ping after a reboot is sometimes lost by the
        // router while resolving arp addresses
        let result = ports::run_raw(
            self.executor,
            &self.node_fqdn,
            &["ping", "-M", "do", "-4", "-c", "2", "-W", "1", "-s", "8972", dst_ip],
            RunParams::SAFE,
        )
        .await;

        if let Err(error) = result {
            tracing::warn!("Failed to ping {} with a jumbo frame: {}", dst_ip, error);
            return false;
        }

        true
    }

    /// Stop an osd daemon on this host.
    pub async fn stop_osd(&self, osd_id: i64) -> Result<String> {
        let unit = format!("ceph-osd@{}", osd_id);
        ports::run_raw(
            self.executor,
            &self.node_fqdn,
            &["systemctl", "stop", &unit],
            RunParams::UNSAFE,
        )
        .await
    }

    pub async fn stop_osds(&self, osd_ids: &[i64]) -> Result<()> {
        for osd_id in osd_ids {
            self.stop_osd(*osd_id).await?;
        }

        Ok(())
    }
}
