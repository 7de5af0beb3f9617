use crate::domain::model::CommonOpts;
use crate::utils::error::Result;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// Announces operations to the SAL IRC relay so they end up in the
/// server admin log.
#[derive(Debug, Clone)]
pub struct SalLogger {
    host: String,
    port: u16,
    channel: String,
    project: String,
    task_id: Option<String>,
    dry_run: bool,
}

impl SalLogger {
    pub fn new(host: &str, port: u16, channel: &str, opts: &CommonOpts) -> Self {
        Self {
            host: host.to_string(),
            port,
            channel: channel.to_string(),
            project: opts.project.clone(),
            task_id: opts.task_id.clone(),
            dry_run: opts.no_sal_log,
        }
    }

    fn payload(&self, message: &str) -> String {
        let user = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
        let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let mut postfix = format!("- runbook ran by {}@{}", user, host);
        if let Some(task_id) = &self.task_id {
            postfix = format!("({}) {}", task_id, postfix);
        }

        format!(
            "{} !log {} {} {}\n",
            self.channel, self.project, message, postfix
        )
    }

    pub async fn log(&self, message: &str) -> Result<()> {
        let payload = self.payload(message);
        if self.dry_run {
            tracing::info!("[SAL - would have sent]: {}", payload.trim_end());
            return Ok(());
        }

        let mut stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        stream.write_all(payload.as_bytes()).await?;
        tracing::info!("[SAL]: {}", message);
        Ok(())
    }
}
