use crate::domain::ports::Prompter;
use crate::utils::error::{Result, RunbookError};
use std::io::Write;

/// Asks for confirmation on stdin, aborting on anything but "go".
#[derive(Debug, Clone, Default)]
pub struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn confirm(&self, message: &str) -> Result<()> {
        println!("{}", message);
        print!("Type \"go\" to proceed or anything else to abort: ");
        std::io::stdout().flush()?;

        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        if answer.trim() == "go" {
            return Ok(());
        }

        Err(RunbookError::Aborted)
    }
}

/// Used when `--yes` was passed, every prompt is logged and accepted.
#[derive(Debug, Clone, Default)]
pub struct AssumeYes;

impl Prompter for AssumeYes {
    fn confirm(&self, message: &str) -> Result<()> {
        tracing::info!("{} (continuing, --yes given)", message);
        Ok(())
    }
}
