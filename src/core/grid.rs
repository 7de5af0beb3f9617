use crate::config::settings::GridSettings;
use crate::domain::model::RunParams;
use crate::domain::ports::{self, RemoteExecutor};
use crate::utils::error::{Result, RunbookError};

/// Controller for a grid-engine deployment, driven from its master node.
pub struct GridController<'a> {
    executor: &'a dyn RemoteExecutor,
    pub master_node_fqdn: String,
}

impl<'a> GridController<'a> {
    pub fn new(executor: &'a dyn RemoteExecutor, settings: &GridSettings) -> Self {
        Self {
            executor,
            master_node_fqdn: settings.master_node.clone(),
        }
    }

    /// Re-enable all the queues of a host so it accepts jobs again.
    pub async fn pool_node(&self, host_fqdn: &str) -> Result<()> {
        let queue_selector = format!("'*@{}'", host_fqdn);
        let output = ports::run_raw(
            self.executor,
            &self.master_node_fqdn,
            &["qmod", "-e", &queue_selector],
            RunParams::UNSAFE.capturing_errors(),
        )
        .await?;

        // qmod reports "enabled queue" per queue, or "has been already
        // enabled" when there was nothing to do
        if !output.contains("enabled queue") && !output.contains("already enabled") {
            return Err(RunbookError::GridError {
                message: format!("unable to pool {}: {}", host_fqdn, output.trim()),
            });
        }

        tracing::info!("Pooled grid node {}", host_fqdn);
        Ok(())
    }

    /// Disable all the queues of a host so no new jobs land on it.
    pub async fn depool_node(&self, host_fqdn: &str) -> Result<()> {
        let queue_selector = format!("'*@{}'", host_fqdn);
        let output = ports::run_raw(
            self.executor,
            &self.master_node_fqdn,
            &["qmod", "-d", &queue_selector],
            RunParams::UNSAFE.capturing_errors(),
        )
        .await?;

        if !output.contains("disabled queue") && !output.contains("already disabled") {
            return Err(RunbookError::GridError {
                message: format!("unable to depool {}: {}", host_fqdn, output.trim()),
            });
        }

        tracing::info!("Depooled grid node {}", host_fqdn);
        Ok(())
    }

    /// Regenerate the grid configuration for every known domain.
    pub async fn reconfigure(&self) -> Result<()> {
        ports::run_raw(
            self.executor,
            &self.master_node_fqdn,
            &["grid-configurator", "--all-domains"],
            RunParams::UNSAFE,
        )
        .await?;
        Ok(())
    }

    /// Plain-text queue listing for a host, for the operator to eyeball.
    pub async fn node_queues(&self, host_fqdn: &str) -> Result<String> {
        let queue_selector = format!("'*@{}'", host_fqdn);
        ports::run_raw(
            self.executor,
            &self.master_node_fqdn,
            &["qstat", "-f", "-q", &queue_selector],
            RunParams::SAFE,
        )
        .await
    }
}
