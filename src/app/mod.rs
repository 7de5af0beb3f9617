pub mod ceph;
pub mod grid;
pub mod openstack;

use crate::adapters::sal::SalLogger;
use crate::config::settings::Settings;
use crate::domain::model::{SilenceId, SilenceMatcher};
use crate::domain::ports::{AlertSilencer, Prompter, RemoteExecutor};
use crate::utils::error::Result;
use std::time::Duration;

/// Everything a runbook needs to talk to the outside world.
pub struct RunbookContext<'a> {
    pub executor: &'a dyn RemoteExecutor,
    pub silencer: &'a dyn AlertSilencer,
    pub prompter: &'a dyn Prompter,
    pub sal: &'a SalLogger,
    pub settings: &'a Settings,
}

/// Silence every alert of a single host while we mess with it.
pub(crate) async fn downtime_host(
    silencer: &dyn AlertSilencer,
    host_name: &str,
    duration: Duration,
    reason: &str,
) -> Result<SilenceId> {
    let matchers = [SilenceMatcher::regex(
        "instance",
        &format!("~{}.*", regex::escape(host_name)),
    )];
    silencer
        .silence(
            &matchers,
            duration,
            &format!("Downtiming host from runbook - {}", reason),
        )
        .await
}
