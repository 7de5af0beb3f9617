use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "runbook")]
#[command(about = "Operator runbooks for the cloud control plane")]
pub struct Cli {
    /// Relevant openstack project (for operations, SAL messages, etc.)
    #[arg(long, global = true, default_value = "admin")]
    pub project: String,

    /// Id of the task related to this operation (ex. T123456)
    #[arg(long, global = true)]
    pub task_id: Option<String>,

    /// Disable SAL announcements on IRC
    #[arg(long, global = true)]
    pub no_sal_log: bool,

    /// Answer yes to every confirmation prompt
    #[arg(long, global = true)]
    pub yes: bool,

    /// Path to the settings file
    #[arg(long, global = true, default_value = "/etc/cloud-runbooks.toml")]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Ceph cluster maintenance runbooks
    #[command(subcommand)]
    Ceph(CephCommand),

    /// OpenStack network-control-plane runbooks
    #[command(subcommand)]
    Openstack(OpenstackCommand),

    /// Grid-engine scheduler runbooks
    #[command(subcommand)]
    Grid(GridCommand),
}

#[derive(Debug, Clone, Args)]
pub struct CephClusterArg {
    /// Name of the ceph cluster to act on, as configured in the settings
    #[arg(long)]
    pub cluster: String,
}

#[derive(Debug, Clone, Subcommand)]
pub enum CephCommand {
    /// Set the cluster in maintenance (noout + norebalance, alerts silenced)
    SetMaintenance {
        #[command(flatten)]
        cluster: CephClusterArg,

        /// Continue even if the cluster is not in a healthy state
        #[arg(long)]
        force: bool,

        /// Why the cluster is going into maintenance
        #[arg(long, default_value = "unspecified maintenance")]
        reason: String,
    },

    /// Take the cluster out of maintenance
    UnsetMaintenance {
        #[command(flatten)]
        cluster: CephClusterArg,

        /// Continue even if the cluster is not in a healthy state
        #[arg(long)]
        force: bool,
    },

    /// Wait until the cluster has no misplaced objects left
    WaitForRebalance {
        #[command(flatten)]
        cluster: CephClusterArg,

        /// How long to wait before giving up
        #[arg(long, default_value = "600")]
        timeout_secs: u64,
    },

    /// Reboot a single node of the cluster, maintenance-wrapped
    RebootNode {
        #[command(flatten)]
        cluster: CephClusterArg,

        /// FQDN of the node to reboot
        #[arg(long)]
        fqdn_to_reboot: String,

        /// Don't set the cluster in maintenance (careful! might start
        /// rebalancing data)
        #[arg(long)]
        skip_maintenance: bool,

        /// Continue even if the cluster is not in a healthy state
        #[arg(long)]
        force: bool,
    },

    /// Rolling reboot of all the osd nodes, one at a time
    RollRebootOsds {
        #[command(flatten)]
        cluster: CephClusterArg,

        /// Continue even if the cluster is not in a healthy state
        #[arg(long)]
        force: bool,
    },

    /// Depool every osd of a host by reweighting to 0 and marking out
    DrainNode {
        #[command(flatten)]
        cluster: CephClusterArg,

        /// Short hostname of the osd host to drain
        #[arg(long)]
        osd_host: String,

        /// How many osds to drain at once (0 means all of them)
        #[arg(long, default_value = "0")]
        batch_size: usize,

        /// Don't wait for the rebalance between batches
        #[arg(long)]
        no_wait: bool,

        /// Skip the ok-to-stop safety check
        #[arg(long = "unsafe")]
        be_unsafe: bool,
    },

    /// Repool every osd of a host
    UndrainNode {
        #[command(flatten)]
        cluster: CephClusterArg,

        /// Short hostname of the osd host to undrain
        #[arg(long)]
        osd_host: String,

        /// How many osds to undrain at once (0 means all of them)
        #[arg(long, default_value = "0")]
        batch_size: usize,

        /// Wait for the rebalance between batches
        #[arg(long)]
        wait: bool,
    },

    /// Bootstrap all the free drives of a host as new osds
    AddOsds {
        #[command(flatten)]
        cluster: CephClusterArg,

        /// FQDN of the host to add osds on
        #[arg(long)]
        fqdn: String,

        /// Skip the bootstrap readiness checks
        #[arg(long)]
        skip_checks: bool,
    },
}

#[derive(Debug, Clone, Args)]
pub struct OpenstackClusterArg {
    /// Name of the openstack deployment, as configured in the settings
    #[arg(long)]
    pub cluster: String,
}

#[derive(Debug, Clone, Subcommand)]
pub enum OpenstackCommand {
    /// Set every neutron agent of a cloudnet host admin-down
    CloudnetAdminDown {
        #[command(flatten)]
        cluster: OpenstackClusterArg,

        /// Short hostname of the cloudnet
        #[arg(long)]
        host: String,
    },

    /// Set every neutron agent of a cloudnet host admin-up
    CloudnetAdminUp {
        #[command(flatten)]
        cluster: OpenstackClusterArg,

        /// Short hostname of the cloudnet
        #[arg(long)]
        host: String,
    },

    /// Rolling reboot of the cloudnet hosts, L3 primary last
    RollRebootCloudnets {
        #[command(flatten)]
        cluster: OpenstackClusterArg,

        /// Skip the network health checks between reboots
        #[arg(long)]
        force: bool,
    },

    /// Check that all the agents and routers are up and running
    CheckNetwork {
        #[command(flatten)]
        cluster: OpenstackClusterArg,
    },

    /// Bump the quotas of a project
    QuotaIncrease {
        #[command(flatten)]
        cluster: OpenstackClusterArg,

        /// Project to increase the quotas of
        #[arg(long)]
        target_project: String,

        /// New cinder storage quota, in gigabytes
        #[arg(long)]
        gigabytes: Option<i64>,

        /// New instances quota
        #[arg(long)]
        instances: Option<i64>,

        /// New cores quota
        #[arg(long)]
        cores: Option<i64>,

        /// New ram quota, in megabytes
        #[arg(long)]
        ram_mb: Option<i64>,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum GridCommand {
    /// Re-enable all the queues of a grid node
    PoolNode {
        /// Grid project (picks the master node from the settings)
        #[arg(long)]
        grid_project: String,

        /// FQDN of the node to pool
        #[arg(long)]
        host_fqdn: String,
    },

    /// Disable all the queues of a grid node
    DepoolNode {
        /// Grid project (picks the master node from the settings)
        #[arg(long)]
        grid_project: String,

        /// FQDN of the node to depool
        #[arg(long)]
        host_fqdn: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reboot_node_args_parse() {
        let cli = Cli::parse_from([
            "runbook",
            "--task-id",
            "T123456",
            "ceph",
            "reboot-node",
            "--cluster",
            "eqiad1",
            "--fqdn-to-reboot",
            "cloudcephosd1001.eqiad.wmnet",
            "--force",
        ]);

        assert_eq!(cli.task_id.as_deref(), Some("T123456"));
        match cli.command {
            Command::Ceph(CephCommand::RebootNode {
                cluster,
                fqdn_to_reboot,
                skip_maintenance,
                force,
            }) => {
                assert_eq!(cluster.cluster, "eqiad1");
                assert_eq!(fqdn_to_reboot, "cloudcephosd1001.eqiad.wmnet");
                assert!(!skip_maintenance);
                assert!(force);
            }
            other => panic!("parsed into the wrong command: {:?}", other),
        }
    }

    #[test]
    fn quota_increase_args_parse() {
        let cli = Cli::parse_from([
            "runbook",
            "openstack",
            "quota-increase",
            "--cluster",
            "eqiad1",
            "--target-project",
            "toolsbeta",
            "--gigabytes",
            "300",
        ]);

        match cli.command {
            Command::Openstack(OpenstackCommand::QuotaIncrease {
                target_project,
                gigabytes,
                instances,
                ..
            }) => {
                assert_eq!(target_project, "toolsbeta");
                assert_eq!(gigabytes, Some(300));
                assert_eq!(instances, None);
            }
            other => panic!("parsed into the wrong command: {:?}", other),
        }
    }
}
