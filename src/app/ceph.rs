use crate::app::{downtime_host, RunbookContext};
use crate::core::ceph::{CephClusterController, CephOsdNodeController};
use crate::core::node;
use crate::utils::error::{Result, RunbookError};
use crate::utils::validation::{validate_fqdn, validate_hostname};
use serde_json::Value;
use std::time::Duration;

/// Ceph measures health over 15-minute windows, a freshly rebooted node
/// takes a while to be considered fine again.
const POST_REBOOT_HEALTHY_TIMEOUT: Duration = Duration::from_secs(30 * 60);

const HOST_SILENCE_DURATION: Duration = Duration::from_secs(4 * 3600);

pub async fn set_maintenance(
    ctx: &RunbookContext<'_>,
    cluster_name: &str,
    force: bool,
    reason: &str,
) -> Result<()> {
    let cluster = ctx.settings.ceph_cluster(cluster_name)?;
    let controller = CephClusterController::new(ctx.executor, ctx.silencer, cluster)?;

    let silences = controller.set_maintenance(reason, force).await?;
    ctx.sal
        .log(&format!(
            "Set the ceph cluster {} in maintenance ({})",
            cluster_name, reason
        ))
        .await?;
    tracing::info!(
        "Cluster {} is in maintenance now, alert silences: {:?}. Remember to unset it when done, \
         that will also expire the silences.",
        cluster_name,
        silences,
    );
    Ok(())
}

pub async fn unset_maintenance(
    ctx: &RunbookContext<'_>,
    cluster_name: &str,
    force: bool,
) -> Result<()> {
    let cluster = ctx.settings.ceph_cluster(cluster_name)?;
    let controller = CephClusterController::new(ctx.executor, ctx.silencer, cluster)?;

    controller.unset_maintenance(&[], force).await?;
    ctx.sal
        .log(&format!(
            "Unset the maintenance of the ceph cluster {}",
            cluster_name
        ))
        .await?;
    Ok(())
}

pub async fn wait_for_rebalance(
    ctx: &RunbookContext<'_>,
    cluster_name: &str,
    timeout_secs: u64,
) -> Result<()> {
    let cluster = ctx.settings.ceph_cluster(cluster_name)?;
    let controller = CephClusterController::new(ctx.executor, ctx.silencer, cluster)?;

    let had_to_wait = controller
        .wait_for_rebalance(Duration::from_secs(timeout_secs))
        .await?;
    if had_to_wait {
        tracing::info!("Cluster {} finished rebalancing.", cluster_name);
    } else {
        tracing::info!("Cluster {} had nothing to rebalance.", cluster_name);
    }
    Ok(())
}

pub async fn reboot_node(
    ctx: &RunbookContext<'_>,
    cluster_name: &str,
    fqdn_to_reboot: &str,
    skip_maintenance: bool,
    force: bool,
) -> Result<()> {
    validate_fqdn("fqdn-to-reboot", fqdn_to_reboot)?;
    let cluster = ctx.settings.ceph_cluster(cluster_name)?;
    let mut controller = CephClusterController::new(ctx.executor, ctx.silencer, cluster)?;
    if controller.controlling_node_fqdn == fqdn_to_reboot {
        controller.change_controlling_node().await?;
    }

    ctx.sal
        .log(&format!("Rebooting node {}", fqdn_to_reboot))
        .await?;

    let silences = if skip_maintenance {
        Vec::new()
    } else {
        controller
            .set_maintenance(&format!("Rebooting node {}", fqdn_to_reboot), force)
            .await?
    };

    reboot_cluster_node(ctx, &controller, fqdn_to_reboot).await?;

    if !skip_maintenance {
        controller.unset_maintenance(&silences, force).await?;
    }

    ctx.sal
        .log(&format!("Finished rebooting node {}", fqdn_to_reboot))
        .await?;
    Ok(())
}

pub async fn roll_reboot_osds(
    ctx: &RunbookContext<'_>,
    cluster_name: &str,
    force: bool,
) -> Result<()> {
    let cluster = ctx.settings.ceph_cluster(cluster_name)?;
    let controller = CephClusterController::new(ctx.executor, ctx.silencer, cluster)?;

    let nodes = controller.cluster_nodes().await?;
    let osd_nodes: Vec<String> = nodes
        .get("osd")
        .and_then(Value::as_object)
        .map(|osds| osds.keys().cloned().collect())
        .unwrap_or_default();
    if osd_nodes.is_empty() {
        return Err(RunbookError::ClusterUnhealthy {
            details: format!("The cluster {} reports no osd nodes", cluster_name),
        });
    }

    ctx.prompter
        .confirm(&format!(
            "About to reboot the {} osd nodes of cluster {}, one at a time: {:?}",
            osd_nodes.len(),
            cluster_name,
            osd_nodes,
        ))?;

    ctx.sal
        .log(&format!(
            "Rolling reboot of the {} osd nodes of the ceph cluster {}",
            osd_nodes.len(),
            cluster_name,
        ))
        .await?;

    let silences = controller
        .set_maintenance("Rolling reboot of the osd nodes", force)
        .await?;

    for (index, node_name) in osd_nodes.iter().enumerate() {
        let node_fqdn = format!("{}.{}", node_name, controller.nodes_domain());
        tracing::info!(
            "[{}/{}] Rebooting node {}...",
            index + 1,
            osd_nodes.len(),
            node_fqdn,
        );
        reboot_cluster_node(ctx, &controller, &node_fqdn).await?;
        ctx.sal
            .log(&format!(
                "Rebooted node {} ({}/{})",
                node_fqdn,
                index + 1,
                osd_nodes.len(),
            ))
            .await?;
    }

    controller.unset_maintenance(&silences, force).await?;
    ctx.sal
        .log(&format!(
            "Finished the rolling reboot of the osd nodes of the ceph cluster {}",
            cluster_name,
        ))
        .await?;
    Ok(())
}

/// Reboot one node of the cluster and wait for the cluster to settle,
/// with maintenance already handled by the caller.
async fn reboot_cluster_node(
    ctx: &RunbookContext<'_>,
    controller: &CephClusterController<'_>,
    node_fqdn: &str,
) -> Result<()> {
    let host_name = node_fqdn.split('.').next().unwrap_or(node_fqdn);
    let host_silence = downtime_host(
        ctx.silencer,
        host_name,
        HOST_SILENCE_DURATION,
        &format!("Rebooting {}", node_fqdn),
    )
    .await?;

    node::reboot_host(ctx.executor, node_fqdn).await?;

    controller
        .wait_for_one_manager_standby(POST_REBOOT_HEALTHY_TIMEOUT)
        .await?;
    controller
        .wait_for_healthy(true, POST_REBOOT_HEALTHY_TIMEOUT, &[])
        .await?;

    ctx.silencer.expire(&host_silence).await?;
    Ok(())
}

pub async fn drain_node(
    ctx: &RunbookContext<'_>,
    cluster_name: &str,
    osd_host: &str,
    batch_size: usize,
    no_wait: bool,
    be_unsafe: bool,
) -> Result<()> {
    validate_hostname("osd-host", osd_host)?;
    let cluster = ctx.settings.ceph_cluster(cluster_name)?;
    let controller = CephClusterController::new(ctx.executor, ctx.silencer, cluster)?;

    ctx.sal
        .log(&format!(
            "Draining all the osds of host {} (ceph cluster {})",
            osd_host, cluster_name
        ))
        .await?;
    controller
        .drain_osd_node(osd_host, be_unsafe, !no_wait, batch_size)
        .await?;
    ctx.sal
        .log(&format!(
            "Drained all the osds of host {} (ceph cluster {})",
            osd_host, cluster_name
        ))
        .await?;
    Ok(())
}

pub async fn undrain_node(
    ctx: &RunbookContext<'_>,
    cluster_name: &str,
    osd_host: &str,
    batch_size: usize,
    wait: bool,
) -> Result<()> {
    validate_hostname("osd-host", osd_host)?;
    let cluster = ctx.settings.ceph_cluster(cluster_name)?;
    let controller = CephClusterController::new(ctx.executor, ctx.silencer, cluster)?;

    ctx.sal
        .log(&format!(
            "Undraining all the osds of host {} (ceph cluster {})",
            osd_host, cluster_name
        ))
        .await?;
    controller.undrain_osd_node(osd_host, wait, batch_size).await?;
    ctx.sal
        .log(&format!(
            "Undrained all the osds of host {} (ceph cluster {})",
            osd_host, cluster_name
        ))
        .await?;
    Ok(())
}

pub async fn add_osds(
    ctx: &RunbookContext<'_>,
    cluster_name: &str,
    fqdn: &str,
    skip_checks: bool,
) -> Result<()> {
    validate_fqdn("fqdn", fqdn)?;
    let cluster = ctx.settings.ceph_cluster(cluster_name)?;
    let controller = CephClusterController::new(ctx.executor, ctx.silencer, cluster)?;
    let osd_controller = CephOsdNodeController::new(ctx.executor, fqdn);

    if !skip_checks {
        let failures = controller
            .check_osd_ready_for_bootstrap(&osd_controller)
            .await?;
        if !failures.is_empty() {
            return Err(RunbookError::ValidationError {
                field: "fqdn".to_string(),
                value: fqdn.to_string(),
                reason: format!(
                    "The node is not ready to be bootstrapped, pass --skip-checks if you know \
                     what you are doing:\n{}",
                    failures.join("\n")
                ),
            });
        }
    }

    ctx.sal
        .log(&format!(
            "Adding all the available drives of {} as new osds (ceph cluster {})",
            fqdn, cluster_name
        ))
        .await?;

    osd_controller.add_all_available_devices(ctx.prompter).await?;

    tracing::info!("Waiting for the new osds to settle in...");
    controller
        .wait_for_in_progress_events(POST_REBOOT_HEALTHY_TIMEOUT)
        .await?;
    controller
        .wait_for_healthy(true, POST_REBOOT_HEALTHY_TIMEOUT, &[])
        .await?;

    let host_name = fqdn.split('.').next().unwrap_or(fqdn);
    let osd_tree = controller.osd_tree().await?;
    if !controller.is_osd_host_valid(&osd_tree, host_name) {
        return Err(RunbookError::ClusterUnhealthy {
            details: format!(
                "The host {} does not look right in the osd tree after adding its drives, please \
                 check it manually",
                host_name
            ),
        });
    }

    ctx.sal
        .log(&format!(
            "Added all the available drives of {} as new osds (ceph cluster {})",
            fqdn, cluster_name
        ))
        .await?;
    Ok(())
}
