use crate::domain::model::RunParams;
use crate::domain::ports::RemoteExecutor;
use crate::utils::error::{Result, RunbookError};
use async_trait::async_trait;
use tokio::process::Command;

/// Remote executor backed by plain ssh, running every command through
/// `sudo -i` on the target host.
#[derive(Debug, Clone)]
pub struct SshExecutor {
    connect_timeout_secs: u64,
}

impl SshExecutor {
    pub fn new() -> Self {
        Self {
            connect_timeout_secs: 10,
        }
    }
}

impl Default for SshExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn run(&self, node_fqdn: &str, command: &[&str], params: RunParams) -> Result<String> {
        let remote_command = command.join(" ");
        if params.is_safe {
            tracing::debug!("[{}] {}", node_fqdn, remote_command);
        } else {
            tracing::info!("[{}] {}", node_fqdn, remote_command);
        }

        let output = Command::new("ssh")
            .arg("-o")
            .arg("BatchMode=yes")
            .arg("-o")
            .arg(format!("ConnectTimeout={}", self.connect_timeout_secs))
            .arg(node_fqdn)
            .arg("sudo")
            .arg("-i")
            .arg(&remote_command)
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if !output.status.success() && !params.capture_errors {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RunbookError::RemoteExecutionError {
                node: node_fqdn.to_string(),
                command: remote_command,
                output: format!("stdout: '{}' stderr: '{}'", stdout.trim_end(), stderr.trim_end()),
            });
        }

        Ok(stdout)
    }
}
