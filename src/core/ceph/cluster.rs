use crate::config::settings::CephClusterSettings;
use crate::core::ceph::osd_node::CephOsdNodeController;
use crate::core::ceph::osd_tree::{OsdTree, OsdTreeNodeType};
use crate::core::ceph::status::{CephOsdFlag, ClusterStatus};
use crate::core::wait::CHECK_INTERVAL;
use crate::domain::model::{RunParams, SilenceId, SilenceMatcher};
use crate::domain::ports::{self, AlertSilencer, RemoteExecutor};
use crate::utils::error::{Result, RunbookError};
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;

/// Drives reserved for the OS on every osd host (software raid pair).
const OSD_EXPECTED_OS_DRIVES: usize = 2;

const DEFAULT_SILENCE_DURATION: Duration = Duration::from_secs(4 * 3600);

/// Controller for a Ceph cluster, issuing `ceph` commands on one of the
/// mon nodes.
pub struct CephClusterController<'a> {
    executor: &'a dyn RemoteExecutor,
    silencer: &'a dyn AlertSilencer,
    settings: CephClusterSettings,
    pub controlling_node_fqdn: String,
}

impl<'a> CephClusterController<'a> {
    pub fn new(
        executor: &'a dyn RemoteExecutor,
        silencer: &'a dyn AlertSilencer,
        settings: &CephClusterSettings,
    ) -> Result<Self> {
        let controlling_node_fqdn = settings
            .mon_nodes
            .first()
            .cloned()
            .ok_or_else(|| RunbookError::ConfigError {
                message: "the cluster has no mon nodes configured".to_string(),
            })?;

        Ok(Self {
            executor,
            silencer,
            settings: settings.clone(),
            controlling_node_fqdn,
        })
    }

    pub fn expected_osd_drives_per_host(&self) -> usize {
        self.settings.osd_drives_per_host
    }

    async fn run_raw(&self, command: &[&str], json_output: bool, params: RunParams) -> Result<String> {
        let mut full_command: Vec<&str> = Vec::with_capacity(command.len() + 3);
        full_command.push("ceph");
        full_command.extend_from_slice(command);
        if json_output {
            full_command.extend(["-f", "json"]);
        }

        ports::run_raw(self.executor, &self.controlling_node_fqdn, &full_command, params).await
    }

    async fn run_json_object(
        &self,
        command: &[&str],
        params: RunParams,
    ) -> Result<serde_json::Map<String, Value>> {
        let mut full_command: Vec<&str> = Vec::with_capacity(command.len() + 3);
        full_command.push("ceph");
        full_command.extend_from_slice(command);
        full_command.extend(["-f", "json"]);

        ports::run_json_object(self.executor, &self.controlling_node_fqdn, &full_command, params)
            .await
    }

    /// Nodes currently in the cluster, keyed by role ("mon", "osd", "mgr").
    pub async fn cluster_nodes(&self) -> Result<serde_json::Map<String, Value>> {
        // there's usually a couple empty lines before the json data
        self.run_json_object(&["node", "ls"], RunParams::SAFE.last_line_only())
            .await
    }

    pub fn nodes_domain(&self) -> &str {
        &self.settings.domain
    }

    /// Pick another mon node to interact with the cluster.
    pub async fn change_controlling_node(&mut self) -> Result<()> {
        let current_name = self
            .controlling_node_fqdn
            .split('.')
            .next()
            .unwrap_or(&self.controlling_node_fqdn)
            .to_string();

        let nodes = self.cluster_nodes().await?;
        let mons = nodes.get("mon").and_then(Value::as_object);
        let another_monitor = mons
            .and_then(|mons| mons.keys().find(|name| **name != current_name))
            .ok_or_else(|| RunbookError::NoControllerNode {
                details: format!("got nodes: {:?}", nodes),
            })?;

        self.controlling_node_fqdn = format!("{}.{}", another_monitor, self.settings.domain);
        tracing::info!(
            "Changed to node {} to control the ceph cluster.",
            self.controlling_node_fqdn
        );
        Ok(())
    }

    pub async fn status(&self) -> Result<ClusterStatus> {
        let status = self.run_json_object(&["status"], RunParams::SAFE).await?;
        Ok(ClusterStatus::new(Value::Object(status)))
    }

    pub async fn is_osdmap_flag_set(&self, flag: CephOsdFlag) -> Result<bool> {
        Ok(self.status().await?.osdmap_set_flags().contains(&flag))
    }

    pub async fn set_osdmap_flag(&self, flag: CephOsdFlag) -> Result<()> {
        let output = self
            .run_raw(&["osd", "set", flag.as_str()], false, RunParams::UNSAFE)
            .await?;

        let ack = Regex::new(&format!("(^|\n){} is set", regex::escape(flag.as_str())))
            .expect("static regex");
        if !ack.is_match(&output) {
            return Err(RunbookError::FlagChangeError {
                flag: flag.to_string(),
                output,
            });
        }

        Ok(())
    }

    pub async fn unset_osdmap_flag(&self, flag: CephOsdFlag) -> Result<()> {
        let output = self
            .run_raw(&["osd", "unset", flag.as_str()], false, RunParams::UNSAFE)
            .await?;

        let ack = Regex::new(&format!("(^|\n){} is unset", regex::escape(flag.as_str())))
            .expect("static regex");
        if !ack.is_match(&output) {
            return Err(RunbookError::FlagChangeError {
                flag: flag.to_string(),
                output,
            });
        }

        Ok(())
    }

    /// Change an osd device class (ex. from hdd to ssd).
    pub async fn set_osd_class(&self, osd_id: i64, osd_class: &str) -> Result<()> {
        let osd_id_str = osd_id.to_string();
        self.run_raw(
            &["osd", "crush", "rm-device-class", &osd_id_str],
            false,
            RunParams::UNSAFE,
        )
        .await?;
        self.run_raw(
            &["osd", "crush", "set-device-class", osd_class, &osd_id_str],
            false,
            RunParams::UNSAFE,
        )
        .await?;
        Ok(())
    }

    /// Silence the cluster-wide alerts (the ones not tied to a specific node).
    pub async fn downtime_cluster_alerts(&self, reason: &str) -> Result<Vec<SilenceId>> {
        let matchers = [SilenceMatcher::regex("service", "~.*ceph.*")];
        let silence = self
            .silencer
            .silence(
                &matchers,
                DEFAULT_SILENCE_DURATION,
                &format!("Downtiming alert from runbook - {}", reason),
            )
            .await?;

        Ok(vec![silence])
    }

    pub async fn uptime_cluster_alerts(&self, silences: &[SilenceId]) -> Result<()> {
        for silence in silences {
            self.silencer.expire(silence).await?;
        }

        Ok(())
    }

    /// Set maintenance and mute any cluster-wide alerts.
    ///
    /// Returns the alert silences, to pass back to `unset_maintenance`.
    pub async fn set_maintenance(&self, reason: &str, force: bool) -> Result<Vec<SilenceId>> {
        let silences = self.downtime_cluster_alerts(reason).await?;
        let cluster_status = self.status().await?;
        if cluster_status.is_in_maintenance() {
            tracing::info!("Cluster already in maintenance status.");
            return Ok(silences);
        }

        if let Err(error) = cluster_status.check_healthy(false, &[]) {
            if !force {
                tracing::warn!(
                    "Cluster is not in a healthy status, putting it in maintenance might stop any \
                     recovery processes. Use --force to ignore this message and set the cluster in \
                     maintenance mode anyhow."
                );
                return Err(error);
            }

            tracing::info!(
                "Cluster is not in a healthy status, continuing as --force was specified. \
                 Current status:\n{}",
                cluster_status.health_details(),
            );
        }

        self.set_osdmap_flag(CephOsdFlag::Noout).await?;
        self.set_osdmap_flag(CephOsdFlag::Norebalance).await?;
        Ok(silences)
    }

    /// Unset maintenance and remove any cluster-wide alert silences.
    pub async fn unset_maintenance(&self, silences: &[SilenceId], force: bool) -> Result<()> {
        let cluster_status = self.status().await?;
        if let Err(error) = cluster_status.check_healthy(true, &[]) {
            if !force {
                tracing::warn!(
                    "Cluster is not in a healthy status, getting it out of maintenance might have \
                     undesirable effects. Use --force to ignore this message and unset the cluster \
                     maintenance mode anyhow."
                );
                return Err(error);
            }

            tracing::info!(
                "Cluster is not in a healthy status, continuing as --force was specified. \
                 Current status:\n{}",
                cluster_status.health_details(),
            );
        }

        self.unset_osdmap_flag(CephOsdFlag::Noout).await?;
        self.unset_osdmap_flag(CephOsdFlag::Norebalance).await?;
        self.uptime_cluster_alerts(silences).await?;
        Ok(())
    }

    /// Wait until a rebalancing cluster has no misplaced objects left.
    ///
    /// Returns true if it had to wait at any time, false if there was
    /// nothing to rebalance.
    pub async fn wait_for_rebalance(&self, timeout: Duration) -> Result<bool> {
        let start_time = Instant::now();
        let mut cluster_status = self.status().await?;
        let mut had_to_wait = false;
        // the first rounds this might increase, it's expected to stop
        // growing once the cluster started rebalancing
        let mut max_misplaced: u64 = 0;
        while start_time.elapsed() < timeout {
            let misplaced_objects = cluster_status.misplaced_objects();
            max_misplaced = max_misplaced.max(misplaced_objects);
            if misplaced_objects == 0 {
                tracing::info!(
                    "No misplaced objects found, returning, took {}s to stabilize",
                    start_time.elapsed().as_secs()
                );
                return Ok(had_to_wait);
            }

            tracing::debug!("Misplaced objects found, waiting");
            had_to_wait = true;
            let objects_placed = max_misplaced - misplaced_objects;
            let elapsed_secs = start_time.elapsed().as_secs();
            let recovery_speed = if elapsed_secs > 0 {
                objects_placed / elapsed_secs
            } else {
                0
            };

            let eta = if recovery_speed > 0 {
                format!("{}s", misplaced_objects / recovery_speed)
            } else {
                "unknown".to_string()
            };
            tracing::info!(
                "Cluster still has {} misplaced objects, at the current {} obj/s should take {} to \
                 finish, waiting {}s (timeout={}s, elapsed={}s)...",
                misplaced_objects,
                recovery_speed,
                eta,
                CHECK_INTERVAL.as_secs(),
                timeout.as_secs(),
                elapsed_secs,
            );

            tokio::time::sleep(CHECK_INTERVAL).await;
            cluster_status = self.status().await?;
        }

        Err(RunbookError::Timeout {
            what: "the cluster to finish rebalancing".to_string(),
            waited_secs: timeout.as_secs(),
            last_state: serde_json::to_string_pretty(cluster_status.raw()).unwrap_or_default(),
        })
    }

    /// Wait until the cluster's in-progress events have finished.
    ///
    /// This is different from rebalancing or healing, but somewhat a mixture.
    pub async fn wait_for_in_progress_events(&self, timeout: Duration) -> Result<bool> {
        let start_time = Instant::now();
        let mut cluster_status = self.status().await?;
        let mut had_to_wait = false;
        while start_time.elapsed() < timeout {
            let in_progress = cluster_status.progress_events();
            if in_progress.is_empty() {
                tracing::info!("No in-progress events found, returning");
                return Ok(had_to_wait);
            }

            had_to_wait = true;
            let mean_progress: f64 = in_progress
                .values()
                .filter_map(|event| event.get("progress").and_then(Value::as_f64))
                .sum::<f64>()
                * 100.0
                / in_progress.len() as f64;
            tracing::info!(
                "Cluster still has {} in-progress events, {:.2}% done, waiting {}s (timeout={}s)...",
                in_progress.len(),
                mean_progress,
                CHECK_INTERVAL.as_secs(),
                timeout.as_secs(),
            );

            tokio::time::sleep(CHECK_INTERVAL).await;
            cluster_status = self.status().await?;
        }

        Err(RunbookError::Timeout {
            what: "the cluster to finish in-progress events".to_string(),
            waited_secs: timeout.as_secs(),
            last_state: serde_json::to_string_pretty(&cluster_status.progress_events())
                .unwrap_or_default(),
        })
    }

    /// Wait until there's at least one mgr in standby.
    pub async fn wait_for_one_manager_standby(&self, timeout: Duration) -> Result<()> {
        let start_time = Instant::now();
        while start_time.elapsed() < timeout {
            if self.status().await?.mgr_map()?.num_standbys > 0 {
                return Ok(());
            }

            tokio::time::sleep(CHECK_INTERVAL).await;
        }

        let cluster_status = self.status().await?;
        Err(RunbookError::ClusterUnhealthy {
            details: format!(
                "Waited {}s for any manager to become standby, but it never did, current state:\n{}",
                timeout.as_secs(),
                cluster_status.health_details(),
            ),
        })
    }

    /// Wait until the cluster becomes healthy.
    ///
    /// Ceph uses 15-minute averages to measure health, so after a reboot it
    /// takes a while for it to feel better, hence the long default timeout.
    pub async fn wait_for_healthy(
        &self,
        consider_maintenance_healthy: bool,
        timeout: Duration,
        health_issues_to_ignore: &[&str],
    ) -> Result<()> {
        let start_time = Instant::now();
        while start_time.elapsed() < timeout {
            match self
                .status()
                .await?
                .check_healthy(consider_maintenance_healthy, health_issues_to_ignore)
            {
                Ok(()) => return Ok(()),
                Err(RunbookError::ClusterUnhealthy { .. }) => {
                    tracing::info!(
                        "{}s have passed, but the cluster is still not healthy, waiting {}s \
                         (timeout={}s)...",
                        start_time.elapsed().as_secs(),
                        CHECK_INTERVAL.as_secs(),
                        timeout.as_secs(),
                    );
                }
                Err(other) => return Err(other),
            }

            tokio::time::sleep(CHECK_INTERVAL).await;
        }

        let cluster_status = self.status().await?;
        Err(RunbookError::ClusterUnhealthy {
            details: format!(
                "Waited {}s for the cluster to become healthy, but it never did, current state:\n{}",
                timeout.as_secs(),
                cluster_status.health_details(),
            ),
        })
    }

    /// The CRUSH topology, parsed into a typed tree.
    pub async fn osd_tree(&self) -> Result<OsdTree> {
        let raw = self.run_json_object(&["osd", "tree"], RunParams::SAFE).await?;
        OsdTree::from_json(Value::Object(raw))
    }

    /// All the known ips for all the osds (public and cluster), deduplicated.
    pub async fn all_osd_ips(&self) -> Result<HashSet<String>> {
        let osd_dump = self.run_json_object(&["osd", "dump"], RunParams::SAFE).await?;
        let mut all_osd_ips = HashSet::new();
        for osd in osd_dump
            .get("osds")
            .and_then(Value::as_array)
            .unwrap_or(&Vec::new())
        {
            for addr_key in ["public_addr", "cluster_addr"] {
                if let Some(addr) = osd.get(addr_key).and_then(Value::as_str) {
                    let ip = addr.split(':').next().unwrap_or(addr);
                    all_osd_ips.insert(ip.to_string());
                }
            }
        }

        Ok(all_osd_ips)
    }

    /// Re-weight an osd in the CRUSH table.
    ///
    /// Returns true if any change was made, false if the weight already
    /// matched.
    pub async fn crush_reweight_osd(&self, osd_id: i64, new_weight: f64) -> Result<bool> {
        let osd_name = format!("osd.{}", osd_id);
        let tree = self.osd_tree().await?;
        let cur_weight = tree
            .nodes_of_type(OsdTreeNodeType::Osd)
            .iter()
            .find(|osd| osd.name == osd_name)
            .map(|osd| osd.crush_weight);

        if cur_weight == Some(new_weight) {
            return Ok(false);
        }

        let weight_str = new_weight.to_string();
        let response = self
            .run_raw(
                &["osd", "crush", "reweight", &osd_name, &weight_str],
                false,
                RunParams::UNSAFE,
            )
            .await?;
        if response.contains(&format!("reweighted item id {}", osd_id)) {
            return Ok(true);
        }

        Err(RunbookError::MalformedOutput {
            command: format!("ceph osd crush reweight {} {}", osd_name, new_weight),
            reason: response,
        })
    }

    /// Mark an osd as in. Returns true if it was out, false if already in.
    pub async fn mark_osd_in(&self, osd_id: i64) -> Result<bool> {
        let osd_name = format!("osd.{}", osd_id);
        let response = self
            .run_raw(&["osd", "in", &osd_name], false, RunParams::UNSAFE)
            .await?;
        if response.contains("marked in") {
            return Ok(true);
        }

        if response.contains("already in") {
            return Ok(false);
        }

        Err(RunbookError::MalformedOutput {
            command: format!("ceph osd in {}", osd_name),
            reason: response,
        })
    }

    /// Mark an osd as out. Returns true if it was in, false if already out.
    pub async fn mark_osd_out(&self, osd_id: i64) -> Result<bool> {
        let osd_name = format!("osd.{}", osd_id);
        let response = self
            .run_raw(&["osd", "out", &osd_name], false, RunParams::UNSAFE)
            .await?;
        if response.contains("marked out") {
            return Ok(true);
        }

        if response.contains("already out") {
            return Ok(false);
        }

        Err(RunbookError::MalformedOutput {
            command: format!("ceph osd out {}", osd_name),
            reason: response,
        })
    }

    /// Check if the given osds can be stopped without affecting the cluster.
    /// Returns the failures, an empty list when they are safe.
    pub async fn check_osds_ok_to_stop(&self, osd_ids: &[i64]) -> Result<Vec<String>> {
        if osd_ids.is_empty() {
            return Ok(vec!["No osd ids passed".to_string()]);
        }

        let id_strings: Vec<String> = osd_ids.iter().map(|id| id.to_string()).collect();
        let mut command: Vec<&str> = vec!["osd", "ok-to-stop"];
        command.extend(id_strings.iter().map(String::as_str));

        let result = self
            .run_raw(&command, false, RunParams::SAFE.capturing_errors())
            .await?;
        if result.contains("are ok to stop without reducing availability or risking data") {
            return Ok(Vec::new());
        }

        Ok(vec![result])
    }

    /// Check if the given osds can be destroyed without affecting the
    /// cluster. Returns the failures, an empty list when they are safe.
    pub async fn check_osds_safe_to_destroy(&self, osd_ids: &[i64]) -> Result<Vec<String>> {
        let id_strings: Vec<String> = osd_ids.iter().map(|id| id.to_string()).collect();
        let mut command: Vec<&str> = vec!["osd", "safe-to-destroy"];
        command.extend(id_strings.iter().map(String::as_str));

        let result = self.run_json_object(&command, RunParams::SAFE).await?;
        let mut cleared: HashSet<i64> = HashSet::new();
        // osds that have been down for long enough show up in missing_stats
        for key in ["safe_to_destroy", "missing_stats"] {
            for id in result.get(key).and_then(Value::as_array).unwrap_or(&Vec::new()) {
                if let Some(id) = id.as_i64() {
                    cleared.insert(id);
                }
            }
        }

        if cleared == osd_ids.iter().copied().collect::<HashSet<i64>>() {
            return Ok(Vec::new());
        }

        Ok(vec![format!(
            "Some osds are not safe to destroy, you can retry with the ones that are safe only or \
             make sure to depool/stop the ones that are active: {:?}",
            result
        )])
    }

    /// Destroy an osd by purging it from the crush table. The device on the
    /// host is zapped when re-adding, not here.
    pub async fn destroy_osd(&self, osd_id: i64, be_unsafe: bool) -> Result<()> {
        if !be_unsafe {
            let failures = self.check_osds_safe_to_destroy(&[osd_id]).await?;
            if !failures.is_empty() {
                return Err(RunbookError::ClusterUnhealthy {
                    details: format!(
                        "Destroying osd {} will put the cluster in an unstable state, pass \
                         --unsafe if you are sure: {}",
                        osd_id,
                        failures.join("\n")
                    ),
                });
            }
        }

        let osd_id_str = osd_id.to_string();
        let response = self
            .run_raw(
                &["osd", "purge", &osd_id_str, "--yes-i-really-mean-it"],
                false,
                RunParams::UNSAFE,
            )
            .await?;

        if !response.contains(&format!("purged osd.{}", osd_id)) {
            return Err(RunbookError::MalformedOutput {
                command: format!("ceph osd purge {}", osd_id),
                reason: response,
            });
        }

        Ok(())
    }

    /// Remove a CRUSH bucket (host/rack/...). Fails when it is not empty.
    pub async fn remove_crush_bucket(&self, bucket_name: &str) -> Result<()> {
        let response = self
            .run_raw(
                &["osd", "crush", "remove", bucket_name],
                false,
                RunParams::UNSAFE,
            )
            .await?;

        if !response.contains("removed item") {
            return Err(RunbookError::MalformedOutput {
                command: format!("ceph osd crush remove {}", bucket_name),
                reason: response,
            });
        }

        Ok(())
    }

    /// OSD ids hosted on the given host, from the cluster's CRUSH map.
    pub async fn host_osds(&self, osd_host: &str) -> Result<Vec<i64>> {
        self.osd_tree().await?.host_osd_ids(osd_host)
    }

    /// Drain osds by setting their weight to 0 and marking them out.
    ///
    /// Unlike depooling one by one, this checks consistency for the whole
    /// group before acting. Returns true if any osd actually changed.
    pub async fn drain_osds(&self, osd_ids: &[i64], be_unsafe: bool) -> Result<bool> {
        if !be_unsafe {
            let failures = self.check_osds_ok_to_stop(osd_ids).await?;
            if !failures.is_empty() {
                return Err(RunbookError::ClusterUnhealthy {
                    details: format!(
                        "Depooling the osds {:?} will put the cluster in an unstable state, pass \
                         --unsafe if you are sure: {}",
                        osd_ids,
                        failures.join("\n")
                    ),
                });
            }
        }

        let mut any_changes = false;
        for osd_id in osd_ids {
            let new_changes = self.crush_reweight_osd(*osd_id, 0.0).await?;
            any_changes = any_changes || new_changes;
        }

        for osd_id in osd_ids {
            self.mark_osd_out(*osd_id).await?;
        }

        Ok(any_changes)
    }

    /// Drain the given osds in batches, waiting for the rebalance between
    /// them so the cluster load stays controlled.
    pub async fn drain_osds_in_chunks(
        &self,
        osd_ids: &[i64],
        batch_size: usize,
        be_unsafe: bool,
        wait: bool,
    ) -> Result<bool> {
        if osd_ids.is_empty() {
            tracing::info!("No osds to drain");
            return Ok(false);
        }

        let start_time = Instant::now();
        let rebalance_timeout = Duration::from_secs(5 * 3600);
        let batch_size = if batch_size == 0 { osd_ids.len() } else { batch_size };
        let num_batches = osd_ids.len() / batch_size;

        let mut any_changes = false;
        tracing::info!("Draining osds: {:?}", osd_ids);
        for (batch_num, batch) in osd_ids.chunks(batch_size).enumerate() {
            tracing::info!(
                "[{}/{}] Draining osd batch {} of {}: {:?}",
                batch_num * batch_size,
                osd_ids.len(),
                batch_num + 1,
                num_batches.max(1),
                batch,
            );
            let had_changes = self.drain_osds(batch, be_unsafe).await?;
            if wait && had_changes {
                tracing::info!("Waiting for the cluster to shift data around...");
                // give some time for the cluster to start moving things
                while !self.wait_for_rebalance(rebalance_timeout).await? {
                    tracing::info!(
                        "Rebalancing has not started yet, sleeping another 10s for it to start"
                    );
                    tokio::time::sleep(CHECK_INTERVAL).await;
                }
                any_changes = true;
            } else if !had_changes {
                tracing::info!("No changes to the cluster made, draining the next batch...");
            } else {
                any_changes = true;
            }
        }

        tracing::info!(
            "All osds drained ({:?}), took {}s",
            osd_ids,
            start_time.elapsed().as_secs()
        );
        Ok(any_changes)
    }

    /// Undrain osds by restoring the weight the pooled osds have, then
    /// marking them in last so the rebalance only starts once.
    pub async fn undrain_osds(&self, osd_ids: &[i64], fallback_weight: f64) -> Result<()> {
        let osd_tree = self.osd_tree().await?;
        let pooled_weight = osd_tree
            .nodes_of_type(OsdTreeNodeType::Osd)
            .iter()
            .map(|osd| osd.crush_weight)
            .find(|weight| *weight > 0.0)
            .unwrap_or(fallback_weight);

        if pooled_weight <= 0.0 {
            return Err(RunbookError::ConfigError {
                message: "unable to guess the proper crush weight for the osds, none of the \
                          pooled osds has a positive weight, pass one explicitly"
                    .to_string(),
            });
        }

        for osd_id in osd_ids {
            self.crush_reweight_osd(*osd_id, pooled_weight).await?;
        }

        for osd_id in osd_ids {
            self.mark_osd_in(*osd_id).await?;
        }

        Ok(())
    }

    pub async fn undrain_osds_in_chunks(
        &self,
        osd_ids: &[i64],
        batch_size: usize,
        wait: bool,
    ) -> Result<()> {
        if osd_ids.is_empty() {
            tracing::info!("No osds to undrain");
            return Ok(());
        }

        let start_time = Instant::now();
        let rebalance_timeout = Duration::from_secs(5 * 3600);
        let batch_size = if batch_size == 0 { osd_ids.len() } else { batch_size };
        let num_batches = osd_ids.len() / batch_size;

        tracing::info!("Undraining osds: {:?}", osd_ids);
        for (batch_num, batch) in osd_ids.chunks(batch_size).enumerate() {
            tracing::info!(
                "[{}/{}] Undraining osd batch {} of {}: {:?}",
                batch_num * batch_size,
                osd_ids.len(),
                batch_num + 1,
                num_batches.max(1),
                batch,
            );
            self.undrain_osds(batch, 0.0).await?;
            if wait {
                tracing::info!("Waiting for the cluster to shift data around...");
                while !self.wait_for_rebalance(rebalance_timeout).await? {
                    tracing::info!(
                        "Rebalancing has not started yet, sleeping another 10s for it to start"
                    );
                    tokio::time::sleep(CHECK_INTERVAL).await;
                }
            }
        }

        tracing::info!(
            "All osds undrained ({:?}), took {}s",
            osd_ids,
            start_time.elapsed().as_secs()
        );
        Ok(())
    }

    /// Depool every osd daemon of a host.
    pub async fn drain_osd_node(
        &self,
        osd_host: &str,
        be_unsafe: bool,
        wait: bool,
        batch_size: usize,
    ) -> Result<()> {
        let osds = self.host_osds(osd_host).await?;
        tracing::info!("Draining osds from host {}: {:?}", osd_host, osds);
        self.drain_osds_in_chunks(&osds, batch_size, be_unsafe, wait)
            .await?;
        tracing::info!("All osds drained on node {}", osd_host);
        Ok(())
    }

    /// Repool every osd daemon of a host.
    pub async fn undrain_osd_node(&self, osd_host: &str, wait: bool, batch_size: usize) -> Result<()> {
        let osds = self.host_osds(osd_host).await?;
        let batch_size = if batch_size == 0 { osds.len() } else { batch_size };
        self.undrain_osds_in_chunks(&osds, batch_size, wait).await
    }

    /// Check if a node is ready to be added as an osd host.
    ///
    /// Returns the list of failures found, empty when everything is fine.
    pub async fn check_osd_ready_for_bootstrap(
        &self,
        osd_controller: &CephOsdNodeController<'_>,
    ) -> Result<Vec<String>> {
        let mut failures: Vec<String> = Vec::new();

        let other_nodes = self.all_osd_ips().await?;
        let total_num = other_nodes.len();
        let mut ok = 0;
        let mut failed = 0;
        tracing::info!(
            "Checking that jumbo frames are allowed to all other nodes in the cluster ({} of them)...",
            total_num,
        );
        for other_node_ip in &other_nodes {
            if osd_controller.check_jumbo_frames_to(other_node_ip).await {
                ok += 1;
                tracing::info!(
                    "  [{} ok/{} error/{} pending] Got pass for {}",
                    ok,
                    failed,
                    total_num - (ok + failed),
                    other_node_ip,
                );
            } else {
                failed += 1;
                failures.push(format!(
                    "Unable to send jumbo frames to {} from node {}",
                    other_node_ip, osd_controller.node_fqdn
                ));
                tracing::info!(
                    "  [{} ok/{} error/{} pending] Got failure",
                    ok,
                    failed,
                    total_num - (ok + failed),
                );
            }
        }

        tracing::info!("Checking that we have the right amount of drives in the host...");
        let host_devices = osd_controller.lsblk().await?;
        let expected_osd_drives = self.settings.osd_drives_per_host;
        let total_expected_devices = OSD_EXPECTED_OS_DRIVES + expected_osd_drives;
        if host_devices.len() != total_expected_devices {
            failures.push(format!(
                "The host has {} devices, when we are expecting {} ({} for osds, and {} for the os)",
                host_devices.len(),
                total_expected_devices,
                expected_osd_drives,
                OSD_EXPECTED_OS_DRIVES,
            ));
        }

        tracing::info!("Checking that we have enough free drives in the host...");
        let available_devices = osd_controller.available_devices().await?;
        if available_devices.len() > expected_osd_drives {
            failures.push(format!(
                "We expected to have at least {} drives reserved for the OS, but it seems we would \
                 use some of them ({:?}), maybe the raid is not properly setup?",
                OSD_EXPECTED_OS_DRIVES, available_devices,
            ));
        }

        tracing::info!("Checking that we have enough OS dedicated drives in the host...");
        let devices_with_soft_raid: Vec<&str> = host_devices
            .iter()
            .filter(|device| device_has_md0_raid(device))
            .filter_map(|device| device.get("name").and_then(Value::as_str))
            .collect();
        if devices_with_soft_raid.len() != OSD_EXPECTED_OS_DRIVES {
            failures.push(format!(
                "It seems we don't have the expected raids setup on the OS devices, I was \
                 expecting {} setup in software raid, but got {:?}",
                OSD_EXPECTED_OS_DRIVES, devices_with_soft_raid,
            ));
        }

        Ok(failures)
    }

    /// Check that the given hostname shows up in the OSD tree exactly once
    /// and carries the expected number of osds.
    pub fn is_osd_host_valid(&self, osd_tree: &OsdTree, hostname: &str) -> bool {
        let found: Vec<_> = osd_tree
            .nodes_of_type(OsdTreeNodeType::Host)
            .into_iter()
            .filter(|host| host.name == hostname)
            .collect();

        if found.len() != 1 {
            tracing::warn!(
                "Expected 1 node in the OSD tree with name='{}' but found {}",
                hostname,
                found.len()
            );
            return false;
        }

        if found[0].children.len() != self.settings.osd_drives_per_host {
            tracing::warn!(
                "Expected {} OSDs in the OSD tree for host '{}' but found {}",
                self.settings.osd_drives_per_host,
                hostname,
                found[0].children.len()
            );
            return false;
        }

        true
    }
}

// OS drives sit in a software raid, their partitions hold an md0 child.
fn device_has_md0_raid(device: &Value) -> bool {
    device
        .get("children")
        .and_then(Value::as_array)
        .map(|partitions| {
            partitions.iter().any(|partition| {
                partition
                    .get("children")
                    .and_then(Value::as_array)
                    .and_then(|raids| raids.first())
                    .and_then(|raid| raid.get("name"))
                    .and_then(Value::as_str)
                    == Some("md0")
            })
        })
        .unwrap_or(false)
}
