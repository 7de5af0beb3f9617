use crate::core::openstack::{NeutronAgent, NeutronAgentHAState, NeutronAgentType, OpenstackApi};
use crate::core::wait::wait_for;
use crate::domain::model::RunParams;
use crate::utils::error::{Result, RunbookError};
use std::time::Duration;

const TRANSITION_TIMEOUT: Duration = Duration::from_secs(900);

/// Controller for the Neutron agents running on the cloudnet hosts.
pub struct NeutronController<'a> {
    pub openstack_api: &'a OpenstackApi<'a>,
}

impl<'a> NeutronController<'a> {
    pub fn new(openstack_api: &'a OpenstackApi<'a>) -> Self {
        Self { openstack_api }
    }

    /// Set the given agent as admin-state-up (online).
    pub async fn agent_set_admin_up(&self, agent_id: &str) -> Result<()> {
        self.openstack_api
            .run_raw(&["network", "agent", "set", "--enable", agent_id], RunParams::UNSAFE)
            .await?;
        Ok(())
    }

    /// Set the given agent as admin-state-down (offline).
    pub async fn agent_set_admin_down(&self, agent_id: &str) -> Result<()> {
        self.openstack_api
            .run_raw(&["network", "agent", "set", "--disable", agent_id], RunParams::UNSAFE)
            .await?;
        Ok(())
    }

    /// Set all the agents of a cloudnet host down, usually for maintenance
    /// or reboot, and wait for the transition to settle.
    pub async fn cloudnet_set_admin_down(&self, cloudnet_host: &str) -> Result<()> {
        for agent in self.openstack_api.network_agents_on_host(cloudnet_host).await? {
            if agent.admin_state_up {
                self.agent_set_admin_down(&agent.agent_id).await?;
            }
        }

        self.wait_for_cloudnet_admin_down(cloudnet_host).await
    }

    /// Set all the agents of a cloudnet host up, usually after maintenance
    /// or reboot, and wait for the transition to settle.
    pub async fn cloudnet_set_admin_up(&self, cloudnet_host: &str) -> Result<()> {
        for agent in self.openstack_api.network_agents_on_host(cloudnet_host).await? {
            if !agent.admin_state_up {
                self.agent_set_admin_up(&agent.agent_id).await?;
            }
        }

        self.wait_for_cloudnet_admin_up(cloudnet_host).await
    }

    pub async fn wait_for_cloudnet_admin_down(&self, cloudnet_host: &str) -> Result<()> {
        let result = wait_for(
            "cloudnet set as admin down",
            TRANSITION_TIMEOUT,
            || async {
                let agents = self.openstack_api.network_agents_on_host(cloudnet_host).await?;
                Ok(agents.iter().all(|agent| !agent.admin_state_up))
            },
            || "Some cloudnet agents did not turn admin down.".to_string(),
        )
        .await;

        match result {
            Err(RunbookError::Timeout { .. }) => Err(RunbookError::AgentTransitionError {
                host: cloudnet_host.to_string(),
                wanted: "down".to_string(),
            }),
            other => other,
        }
    }

    pub async fn wait_for_cloudnet_admin_up(&self, cloudnet_host: &str) -> Result<()> {
        let result = wait_for(
            "cloudnet set as admin up",
            TRANSITION_TIMEOUT,
            || async {
                let agents = self.openstack_api.network_agents_on_host(cloudnet_host).await?;
                Ok(agents.iter().all(|agent| agent.admin_state_up))
            },
            || "Some cloudnet agents did not turn admin up.".to_string(),
        )
        .await;

        match result {
            Err(RunbookError::Timeout { .. }) => Err(RunbookError::AgentTransitionError {
                host: cloudnet_host.to_string(),
                wanted: "up".to_string(),
            }),
            other => other,
        }
    }

    /// The known cloudnet hosts, from where the L3 agents run.
    pub async fn cloudnets(&self) -> Result<Vec<String>> {
        Ok(self
            .openstack_api
            .network_agents()
            .await?
            .into_iter()
            .filter(|agent| agent.agent_type == NeutronAgentType::L3)
            .map(|agent| agent.host)
            .collect())
    }

    /// Agents hosting a given router.
    pub async fn agents_hosting_router(&self, router_id: &str) -> Result<Vec<NeutronAgent>> {
        self.openstack_api
            .run_json_array(
                &["network", "agent", "list", "--long", "--router", router_id],
                RunParams::SAFE,
            )
            .await?
            .iter()
            .map(NeutronAgent::from_agent_data)
            .collect()
    }

    /// Routers hosted on a given L3 agent.
    pub async fn routers_on_agent(&self, agent_id: &str) -> Result<Vec<serde_json::Value>> {
        self.openstack_api
            .run_json_array(&["router", "list", "--agent", agent_id], RunParams::SAFE)
            .await
    }

    /// Check that every cloudnet agent and every router is up and running.
    pub async fn check_network_alive(&self) -> Result<()> {
        let cloudnets = self.cloudnets().await?;
        let cloudnet_agents: Vec<NeutronAgent> = self
            .openstack_api
            .network_agents()
            .await?
            .into_iter()
            .filter(|agent| cloudnets.contains(&agent.host))
            .collect();

        for agent in &cloudnet_agents {
            if !agent.admin_state_up || !agent.alive {
                let agents_str = cloudnet_agents
                    .iter()
                    .map(|agent| agent.to_string())
                    .collect::<Vec<_>>()
                    .join("\n");
                return Err(RunbookError::NetworkUnhealthy {
                    details: format!("Some agents are not healthy:\n{}", agents_str),
                });
            }
        }

        for router in self.openstack_api.routers().await? {
            if !router.is_healthy() {
                return Err(RunbookError::NetworkUnhealthy {
                    details: format!("Router {} is not healthy:\n{:?}", router.name, router),
                });
            }
        }

        Ok(())
    }

    /// Wait until every router has an admin-up, alive, active agent.
    ///
    /// Used to make sure the network is working after taking an L3 agent
    /// down.
    pub async fn wait_for_l3_handover(&self) -> Result<()> {
        wait_for(
            "all routers have a primary agent running",
            TRANSITION_TIMEOUT,
            || async {
                for router in self.openstack_api.routers().await? {
                    let agents = self.agents_hosting_router(&router.router_id).await?;
                    let has_active = agents.iter().any(|agent| {
                        agent.admin_state_up
                            && agent.alive
                            && agent.ha_state == Some(NeutronAgentHAState::Active)
                    });
                    if !has_active {
                        return Ok(false);
                    }
                }

                Ok(true)
            },
            || "Some routers have no primary agents".to_string(),
        )
        .await
    }

    /// The cloudnet host that is primary for the l3 routers.
    ///
    /// All the routers are expected to share the same primary, once there
    /// are more routers or mixed primaries this has to change.
    pub async fn l3_primary(&self) -> Result<String> {
        let routers = self.openstack_api.routers().await?;
        for router in &routers {
            let agents = self.agents_hosting_router(&router.router_id).await?;
            if let Some(primary) = agents.iter().find(|agent| {
                agent.admin_state_up
                    && agent.alive
                    && agent.ha_state == Some(NeutronAgentHAState::Active)
            }) {
                return Ok(primary.host.clone());
            }

            return Err(RunbookError::NetworkUnhealthy {
                details: format!(
                    "Unable to find primary agent for router {}, known agents: {}",
                    router.name,
                    agents
                        .iter()
                        .map(|agent| agent.to_string())
                        .collect::<Vec<_>>()
                        .join("\n"),
                ),
            });
        }

        Err(RunbookError::NetworkUnhealthy {
            details: "No routers found.".to_string(),
        })
    }

    /// Wait until the network is up and running again.
    pub async fn wait_for_network_alive(&self, timeout: Duration) -> Result<()> {
        wait_for(
            "network is alive",
            timeout,
            || async {
                match self.check_network_alive().await {
                    Ok(()) => Ok(true),
                    Err(RunbookError::NetworkUnhealthy { .. }) => Ok(false),
                    Err(other) => Err(other),
                }
            },
            || "Some agents are not running".to_string(),
        )
        .await
    }
}
