use crate::domain::model::{RunParams, SilenceId, SilenceMatcher};
use crate::utils::error::{Result, RunbookError};
use async_trait::async_trait;
use std::time::Duration;

/// Runs a shell command on a remote host and returns its stdout.
///
/// The actual transport (cumin, plain ssh, ...) stays behind this seam so
/// controllers can be exercised against scripted outputs.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn run(&self, node_fqdn: &str, command: &[&str], params: RunParams) -> Result<String>;
}

#[async_trait]
pub trait AlertSilencer: Send + Sync {
    async fn silence(
        &self,
        matchers: &[SilenceMatcher],
        duration: Duration,
        comment: &str,
    ) -> Result<SilenceId>;

    async fn expire(&self, silence_id: &SilenceId) -> Result<()>;
}

/// Confirmation gate in front of destructive steps.
pub trait Prompter: Send + Sync {
    fn confirm(&self, message: &str) -> Result<()>;
}

fn trim_output(raw: String, params: RunParams) -> String {
    let mut result = raw;
    if params.skip_first_line {
        result = result
            .lines()
            .skip(1)
            .collect::<Vec<_>>()
            .join("\n");
    }

    if params.last_line_only {
        result = result.lines().last().unwrap_or("").to_string();
    }

    result
}

/// Run a command on a node, returning the raw output.
pub async fn run_raw(
    executor: &dyn RemoteExecutor,
    node_fqdn: &str,
    command: &[&str],
    params: RunParams,
) -> Result<String> {
    let raw = executor.run(node_fqdn, command, params).await?;
    Ok(trim_output(raw, params))
}

/// Run a command on a node and parse its output as JSON.
pub async fn run_json(
    executor: &dyn RemoteExecutor,
    node_fqdn: &str,
    command: &[&str],
    params: RunParams,
) -> Result<serde_json::Value> {
    let raw = run_raw(executor, node_fqdn, command, params).await?;
    serde_json::from_str(&raw).map_err(|error| RunbookError::MalformedOutput {
        command: command.join(" "),
        reason: format!("unable to parse output as JSON ({}):\n{}", error, raw),
    })
}

/// Run a command expecting a JSON object, usually for `show`-like commands.
pub async fn run_json_object(
    executor: &dyn RemoteExecutor,
    node_fqdn: &str,
    command: &[&str],
    params: RunParams,
) -> Result<serde_json::Map<String, serde_json::Value>> {
    match run_json(executor, node_fqdn, command, params).await? {
        serde_json::Value::Object(object) => Ok(object),
        other => Err(RunbookError::MalformedOutput {
            command: command.join(" "),
            reason: format!("was expecting a JSON object, got {}", other),
        }),
    }
}

/// Run a command expecting a JSON array, usually for `list`-like commands.
pub async fn run_json_array(
    executor: &dyn RemoteExecutor,
    node_fqdn: &str,
    command: &[&str],
    params: RunParams,
) -> Result<Vec<serde_json::Value>> {
    match run_json(executor, node_fqdn, command, params).await? {
        serde_json::Value::Array(items) => Ok(items),
        other => Err(RunbookError::MalformedOutput {
            command: command.join(" "),
            reason: format!("was expecting a JSON array, got {}", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_trimming_respects_params() {
        let raw = "warning line\n{\"a\": 1}\n".to_string();
        let trimmed = trim_output(raw.clone(), RunParams::SAFE.skip_first_line());
        assert_eq!(trimmed, "{\"a\": 1}");

        let trimmed = trim_output(raw, RunParams::SAFE.last_line_only());
        assert_eq!(trimmed, "{\"a\": 1}");
    }
}
