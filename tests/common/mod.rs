#![allow(dead_code)]

use async_trait::async_trait;
use cloud_runbooks::domain::model::{RunParams, SilenceId, SilenceMatcher};
use cloud_runbooks::domain::ports::{AlertSilencer, Prompter, RemoteExecutor};
use cloud_runbooks::utils::error::{Result, RunbookError};
use std::sync::Mutex;
use std::time::Duration;

/// Remote executor fake that hands back scripted outputs in order and
/// records every command it was asked to run.
#[derive(Default)]
pub struct ScriptedExecutor {
    responses: Mutex<Vec<String>>,
    commands: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new<S: Into<String>>(responses: impl IntoIterator<Item = S>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            commands: Mutex::new(Vec::new()),
        }
    }

    /// Every command run so far, as `node: joined command` strings.
    pub fn seen_commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteExecutor for ScriptedExecutor {
    async fn run(&self, node_fqdn: &str, command: &[&str], _params: RunParams) -> Result<String> {
        self.commands
            .lock()
            .unwrap()
            .push(format!("{}: {}", node_fqdn, command.join(" ")));

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(RunbookError::RemoteExecutionError {
                node: node_fqdn.to_string(),
                command: command.join(" "),
                output: "no scripted response left".to_string(),
            });
        }

        Ok(responses.remove(0))
    }
}

/// Alert silencer fake that keeps track of the active silences.
#[derive(Default)]
pub struct RecordingSilencer {
    pub silenced: Mutex<Vec<String>>,
    pub expired: Mutex<Vec<SilenceId>>,
}

#[async_trait]
impl AlertSilencer for RecordingSilencer {
    async fn silence(
        &self,
        matchers: &[SilenceMatcher],
        _duration: Duration,
        comment: &str,
    ) -> Result<SilenceId> {
        let mut silenced = self.silenced.lock().unwrap();
        silenced.push(format!("{:?} ({})", matchers, comment));
        Ok(format!("silence-{}", silenced.len()))
    }

    async fn expire(&self, silence_id: &SilenceId) -> Result<()> {
        self.expired.lock().unwrap().push(silence_id.clone());
        Ok(())
    }
}

pub struct AlwaysConfirm;

impl Prompter for AlwaysConfirm {
    fn confirm(&self, _message: &str) -> Result<()> {
        Ok(())
    }
}
