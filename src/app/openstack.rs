use crate::app::{downtime_host, RunbookContext};
use crate::core::neutron::NeutronController;
use crate::core::node;
use crate::core::openstack::OpenstackApi;
use crate::utils::error::{Result, RunbookError};
use crate::utils::validation::validate_hostname;
use std::time::Duration;

const NETWORK_SETTLE_TIMEOUT: Duration = Duration::from_secs(15 * 60);

const HOST_SILENCE_DURATION: Duration = Duration::from_secs(4 * 3600);

pub async fn cloudnet_admin_down(
    ctx: &RunbookContext<'_>,
    cluster_name: &str,
    host: &str,
) -> Result<()> {
    validate_hostname("host", host)?;
    let cluster = ctx.settings.openstack_cluster(cluster_name)?;
    let api = OpenstackApi::new(ctx.executor, cluster);
    let controller = NeutronController::new(&api);

    ctx.sal
        .log(&format!("Setting cloudnet {} admin down", host))
        .await?;
    controller.cloudnet_set_admin_down(host).await?;
    // another cloudnet now has to pick up the routers
    controller.wait_for_l3_handover().await?;
    ctx.sal
        .log(&format!("Cloudnet {} is admin down now", host))
        .await?;
    Ok(())
}

pub async fn cloudnet_admin_up(
    ctx: &RunbookContext<'_>,
    cluster_name: &str,
    host: &str,
) -> Result<()> {
    validate_hostname("host", host)?;
    let cluster = ctx.settings.openstack_cluster(cluster_name)?;
    let api = OpenstackApi::new(ctx.executor, cluster);
    let controller = NeutronController::new(&api);

    ctx.sal
        .log(&format!("Setting cloudnet {} admin up", host))
        .await?;
    controller.cloudnet_set_admin_up(host).await?;
    controller.wait_for_network_alive(NETWORK_SETTLE_TIMEOUT).await?;
    ctx.sal
        .log(&format!("Cloudnet {} is admin up now", host))
        .await?;
    Ok(())
}

pub async fn roll_reboot_cloudnets(
    ctx: &RunbookContext<'_>,
    cluster_name: &str,
    force: bool,
) -> Result<()> {
    let cluster = ctx.settings.openstack_cluster(cluster_name)?;
    let api = OpenstackApi::new(ctx.executor, cluster);
    let controller = NeutronController::new(&api);

    let mut cloudnets = controller.cloudnets().await?;
    if cloudnets.is_empty() {
        return Err(RunbookError::NetworkUnhealthy {
            details: format!("The deployment {} reports no L3 agents", cluster_name),
        });
    }

    // reboot the one currently routing the traffic last, so we only force
    // a single failover
    let primary = controller.l3_primary().await?;
    cloudnets.sort_by_key(|cloudnet| *cloudnet == primary);
    tracing::info!(
        "Rebooting the cloudnets in this order (L3 primary {} goes last): {:?}",
        primary,
        cloudnets,
    );

    ctx.prompter
        .confirm(&format!(
            "About to reboot the {} cloudnet hosts of deployment {}, one at a time: {:?}",
            cloudnets.len(),
            cluster_name,
            cloudnets,
        ))?;

    ctx.sal
        .log(&format!(
            "Rolling reboot of the {} cloudnet hosts of deployment {}",
            cloudnets.len(),
            cluster_name,
        ))
        .await?;

    for (index, cloudnet) in cloudnets.iter().enumerate() {
        let node_fqdn = format!("{}.{}", cloudnet, api.nodes_domain());
        tracing::info!(
            "[{}/{}] Rebooting cloudnet {}...",
            index + 1,
            cloudnets.len(),
            node_fqdn,
        );

        let host_silence = downtime_host(
            ctx.silencer,
            cloudnet,
            HOST_SILENCE_DURATION,
            &format!("Rebooting {}", node_fqdn),
        )
        .await?;

        controller.cloudnet_set_admin_down(cloudnet).await?;
        controller.wait_for_l3_handover().await?;

        node::reboot_host(ctx.executor, &node_fqdn).await?;

        controller.cloudnet_set_admin_up(cloudnet).await?;
        if !force {
            controller.wait_for_network_alive(NETWORK_SETTLE_TIMEOUT).await?;
        }

        ctx.silencer.expire(&host_silence).await?;
        ctx.sal
            .log(&format!(
                "Rebooted cloudnet {} ({}/{})",
                node_fqdn,
                index + 1,
                cloudnets.len(),
            ))
            .await?;
    }

    ctx.sal
        .log(&format!(
            "Finished the rolling reboot of the cloudnet hosts of deployment {}",
            cluster_name,
        ))
        .await?;
    Ok(())
}

pub async fn check_network(ctx: &RunbookContext<'_>, cluster_name: &str) -> Result<()> {
    let cluster = ctx.settings.openstack_cluster(cluster_name)?;
    let api = OpenstackApi::new(ctx.executor, cluster);
    let controller = NeutronController::new(&api);

    controller.check_network_alive().await?;
    tracing::info!(
        "All the agents and routers of deployment {} are up and running.",
        cluster_name
    );
    Ok(())
}

pub async fn quota_increase(
    ctx: &RunbookContext<'_>,
    cluster_name: &str,
    target_project: &str,
    gigabytes: Option<i64>,
    instances: Option<i64>,
    cores: Option<i64>,
    ram_mb: Option<i64>,
) -> Result<()> {
    let cluster = ctx.settings.openstack_cluster(cluster_name)?;
    let api = OpenstackApi::new(ctx.executor, cluster);

    let mut increases: Vec<(&str, i64)> = Vec::new();
    if let Some(gigabytes) = gigabytes {
        increases.push(("--gigabytes", gigabytes));
    }
    if let Some(instances) = instances {
        increases.push(("--instances", instances));
    }
    if let Some(cores) = cores {
        increases.push(("--cores", cores));
    }
    if let Some(ram_mb) = ram_mb {
        increases.push(("--ram", ram_mb));
    }

    if increases.is_empty() {
        return Err(RunbookError::ValidationError {
            field: "quotas".to_string(),
            value: "none".to_string(),
            reason: "pass at least one of --gigabytes/--instances/--cores/--ram-mb".to_string(),
        });
    }

    let before = api.quota_show(target_project).await?;
    tracing::info!(
        "Current quotas for project {}: {}",
        target_project,
        serde_json::to_string(&before).unwrap_or_default(),
    );

    let changes: Vec<String> = increases
        .iter()
        .map(|(option, value)| format!("{}={}", option.trim_start_matches('-'), value))
        .collect();
    ctx.prompter
        .confirm(&format!(
            "About to set the quotas of project {}: {}",
            target_project,
            changes.join(", "),
        ))?;

    api.quota_set(target_project, &increases).await?;

    let after = api.quota_show(target_project).await?;
    tracing::info!(
        "New quotas for project {}: {}",
        target_project,
        serde_json::to_string(&after).unwrap_or_default(),
    );

    ctx.sal
        .log(&format!(
            "Increased the quotas of project {}: {}",
            target_project,
            changes.join(", "),
        ))
        .await?;
    Ok(())
}
