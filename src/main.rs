use clap::Parser;
use cloud_runbooks::adapters::alertmanager::AlertmanagerClient;
use cloud_runbooks::adapters::prompt::{AssumeYes, StdinPrompter};
use cloud_runbooks::adapters::sal::SalLogger;
use cloud_runbooks::adapters::ssh::SshExecutor;
use cloud_runbooks::app::{self, RunbookContext};
use cloud_runbooks::config::cli::{CephCommand, Cli, Command, GridCommand, OpenstackCommand};
use cloud_runbooks::config::Settings;
use cloud_runbooks::domain::model::CommonOpts;
use cloud_runbooks::domain::ports::Prompter;
use cloud_runbooks::utils::logger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logger::init_cli_logger(cli.verbose);

    tracing::info!("Starting runbook");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let settings = match Settings::load(&cli.config) {
        Ok(settings) => settings,
        Err(error) => {
            tracing::error!(
                "Unable to load the settings from {}: {}",
                cli.config.display(),
                error
            );
            std::process::exit(3);
        }
    };

    if let Err(error) = run(&cli, &settings).await {
        tracing::error!("Runbook failed: {}", error);
        return Err(error.into());
    }

    tracing::info!("Runbook finished successfully");
    Ok(())
}

async fn run(cli: &Cli, settings: &Settings) -> cloud_runbooks::Result<()> {
    let opts = CommonOpts {
        project: cli.project.clone(),
        task_id: cli.task_id.clone(),
        no_sal_log: cli.no_sal_log,
        assume_yes: cli.yes,
    };

    let executor = SshExecutor::new();
    let silencer = AlertmanagerClient::new(
        &settings.alerts.alertmanager_url,
        &format!("runbook/{}", opts.project),
    );
    let sal = SalLogger::new(
        &settings.sal.host,
        settings.sal.port,
        &settings.sal.channel,
        &opts,
    );
    let prompter: Box<dyn Prompter> = if opts.assume_yes {
        Box::new(AssumeYes)
    } else {
        Box::new(StdinPrompter)
    };

    let ctx = RunbookContext {
        executor: &executor,
        silencer: &silencer,
        prompter: prompter.as_ref(),
        sal: &sal,
        settings,
    };

    match &cli.command {
        Command::Ceph(command) => run_ceph(&ctx, command).await,
        Command::Openstack(command) => run_openstack(&ctx, command).await,
        Command::Grid(command) => run_grid(&ctx, command).await,
    }
}

async fn run_ceph(ctx: &RunbookContext<'_>, command: &CephCommand) -> cloud_runbooks::Result<()> {
    match command {
        CephCommand::SetMaintenance {
            cluster,
            force,
            reason,
        } => app::ceph::set_maintenance(ctx, &cluster.cluster, *force, reason).await,
        CephCommand::UnsetMaintenance { cluster, force } => {
            app::ceph::unset_maintenance(ctx, &cluster.cluster, *force).await
        }
        CephCommand::WaitForRebalance {
            cluster,
            timeout_secs,
        } => app::ceph::wait_for_rebalance(ctx, &cluster.cluster, *timeout_secs).await,
        CephCommand::RebootNode {
            cluster,
            fqdn_to_reboot,
            skip_maintenance,
            force,
        } => {
            app::ceph::reboot_node(
                ctx,
                &cluster.cluster,
                fqdn_to_reboot,
                *skip_maintenance,
                *force,
            )
            .await
        }
        CephCommand::RollRebootOsds { cluster, force } => {
            app::ceph::roll_reboot_osds(ctx, &cluster.cluster, *force).await
        }
        CephCommand::DrainNode {
            cluster,
            osd_host,
            batch_size,
            no_wait,
            be_unsafe,
        } => {
            app::ceph::drain_node(
                ctx,
                &cluster.cluster,
                osd_host,
                *batch_size,
                *no_wait,
                *be_unsafe,
            )
            .await
        }
        CephCommand::UndrainNode {
            cluster,
            osd_host,
            batch_size,
            wait,
        } => app::ceph::undrain_node(ctx, &cluster.cluster, osd_host, *batch_size, *wait).await,
        CephCommand::AddOsds {
            cluster,
            fqdn,
            skip_checks,
        } => app::ceph::add_osds(ctx, &cluster.cluster, fqdn, *skip_checks).await,
    }
}

async fn run_openstack(ctx: &RunbookContext<'_>, command: &OpenstackCommand) -> cloud_runbooks::Result<()> {
    match command {
        OpenstackCommand::CloudnetAdminDown { cluster, host } => {
            app::openstack::cloudnet_admin_down(ctx, &cluster.cluster, host).await
        }
        OpenstackCommand::CloudnetAdminUp { cluster, host } => {
            app::openstack::cloudnet_admin_up(ctx, &cluster.cluster, host).await
        }
        OpenstackCommand::RollRebootCloudnets { cluster, force } => {
            app::openstack::roll_reboot_cloudnets(ctx, &cluster.cluster, *force).await
        }
        OpenstackCommand::CheckNetwork { cluster } => {
            app::openstack::check_network(ctx, &cluster.cluster).await
        }
        OpenstackCommand::QuotaIncrease {
            cluster,
            target_project,
            gigabytes,
            instances,
            cores,
            ram_mb,
        } => {
            app::openstack::quota_increase(
                ctx,
                &cluster.cluster,
                target_project,
                *gigabytes,
                *instances,
                *cores,
                *ram_mb,
            )
            .await
        }
    }
}

async fn run_grid(ctx: &RunbookContext<'_>, command: &GridCommand) -> cloud_runbooks::Result<()> {
    match command {
        GridCommand::PoolNode {
            grid_project,
            host_fqdn,
        } => app::grid::pool_node(ctx, grid_project, host_fqdn).await,
        GridCommand::DepoolNode {
            grid_project,
            host_fqdn,
        } => app::grid::depool_node(ctx, grid_project, host_fqdn).await,
    }
}
