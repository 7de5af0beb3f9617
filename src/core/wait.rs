use crate::utils::error::{Result, RunbookError};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

pub const CHECK_INTERVAL: Duration = Duration::from_secs(10);

/// Poll `condition` every [`CHECK_INTERVAL`] until it reports true or the
/// timeout expires.
///
/// On expiry returns a `Timeout` error carrying `last_state_fn`'s message.
pub async fn wait_for<Cond, CondFut, State>(
    what: &str,
    timeout: Duration,
    mut condition: Cond,
    last_state_fn: State,
) -> Result<()>
where
    Cond: FnMut() -> CondFut,
    CondFut: Future<Output = Result<bool>>,
    State: FnOnce() -> String,
{
    let start_time = Instant::now();
    while start_time.elapsed() < timeout {
        if condition().await? {
            return Ok(());
        }

        tracing::info!(
            "'{}' not there yet, waiting another {}s (timeout={}s, {}s elapsed)...",
            what,
            CHECK_INTERVAL.as_secs(),
            timeout.as_secs(),
            start_time.elapsed().as_secs(),
        );

        tokio::time::sleep(CHECK_INTERVAL).await;
    }

    Err(RunbookError::Timeout {
        what: what.to_string(),
        waited_secs: timeout.as_secs(),
        last_state: last_state_fn(),
    })
}
