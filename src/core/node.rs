use crate::core::wait::CHECK_INTERVAL;
use crate::domain::model::RunParams;
use crate::domain::ports::{self, RemoteExecutor};
use crate::utils::error::{Result, RunbookError};
use chrono::NaiveDateTime;
use std::time::Duration;
use tokio::time::Instant;

const REBOOT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Boot time of a host, from `uptime -s` ("2024-03-01 10:32:11").
pub async fn boot_time(executor: &dyn RemoteExecutor, node_fqdn: &str) -> Result<NaiveDateTime> {
    let raw = ports::run_raw(executor, node_fqdn, &["uptime", "-s"], RunParams::SAFE).await?;
    NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%d %H:%M:%S").map_err(|error| {
        RunbookError::MalformedOutput {
            command: "uptime -s".to_string(),
            reason: format!("unable to parse '{}' as a boot time: {}", raw.trim(), error),
        }
    })
}

/// Reboot a host and wait until it comes back with a newer boot time.
pub async fn reboot_host(executor: &dyn RemoteExecutor, node_fqdn: &str) -> Result<()> {
    let before = boot_time(executor, node_fqdn).await?;

    // the ssh session dies with the host, any error from the reboot
    // command itself is expected
    let _ = ports::run_raw(
        executor,
        node_fqdn,
        &["reboot"],
        RunParams::UNSAFE.capturing_errors(),
    )
    .await;

    tracing::info!("Rebooted {}, waiting for it to come back up...", node_fqdn);
    let start_time = Instant::now();
    while start_time.elapsed() < REBOOT_TIMEOUT {
        tokio::time::sleep(CHECK_INTERVAL).await;

        match boot_time(executor, node_fqdn).await {
            Ok(after) if after > before => {
                tracing::info!("{} is back up (booted at {})", node_fqdn, after);
                return Ok(());
            }
            Ok(_) => tracing::debug!("{} has not rebooted yet", node_fqdn),
            Err(error) => tracing::debug!("{} is still down: {}", node_fqdn, error),
        }
    }

    Err(RunbookError::Timeout {
        what: format!("{} to come back after reboot", node_fqdn),
        waited_secs: REBOOT_TIMEOUT.as_secs(),
        last_state: "host never reported a newer boot time".to_string(),
    })
}
