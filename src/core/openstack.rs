use crate::config::settings::OpenstackClusterSettings;
use crate::domain::model::RunParams;
use crate::domain::ports::{self, RemoteExecutor};
use crate::utils::error::{Result, RunbookError};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeutronAgentType {
    L3,
    Dhcp,
    Metadata,
    OpenVswitch,
    Other,
}

impl NeutronAgentType {
    fn from_str_lenient(raw: &str) -> NeutronAgentType {
        match raw {
            "L3 agent" => NeutronAgentType::L3,
            "DHCP agent" => NeutronAgentType::Dhcp,
            "Metadata agent" => NeutronAgentType::Metadata,
            "Open vSwitch agent" => NeutronAgentType::OpenVswitch,
            _ => NeutronAgentType::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeutronAgentHAState {
    Active,
    Standby,
}

/// One Neutron network agent, from `openstack network agent list`.
#[derive(Debug, Clone)]
pub struct NeutronAgent {
    pub agent_id: String,
    pub agent_type: NeutronAgentType,
    pub host: String,
    pub availability_zone: Option<String>,
    pub alive: bool,
    pub admin_state_up: bool,
    pub binary: String,
    pub ha_state: Option<NeutronAgentHAState>,
}

impl NeutronAgent {
    /// Accepts both the unified CLI key style ("Agent Type", "State") and
    /// the legacy neutron client one (agent_type, admin_state_up), the
    /// ":-)" alive marker included.
    pub fn from_agent_data(agent_data: &Value) -> Result<NeutronAgent> {
        let get = |keys: &[&str]| -> Option<Value> {
            keys.iter()
                .find_map(|key| agent_data.get(*key))
                .cloned()
        };

        let agent_id = get(&["ID", "id"])
            .and_then(|value| value.as_str().map(str::to_string))
            .ok_or_else(|| RunbookError::MalformedOutput {
                command: "openstack network agent list".to_string(),
                reason: format!("agent entry without id: {}", agent_data),
            })?;

        let as_bool = |value: &Value| -> bool {
            match value {
                Value::Bool(flag) => *flag,
                Value::String(text) => {
                    text == ":-)" || text.eq_ignore_ascii_case("up") || text.eq_ignore_ascii_case("true")
                }
                _ => false,
            }
        };

        Ok(NeutronAgent {
            agent_id,
            agent_type: NeutronAgentType::from_str_lenient(
                get(&["Agent Type", "agent_type"])
                    .and_then(|value| value.as_str().map(str::to_string))
                    .unwrap_or_default()
                    .as_str(),
            ),
            host: get(&["Host", "host"])
                .and_then(|value| value.as_str().map(str::to_string))
                .unwrap_or_default(),
            availability_zone: get(&["Availability Zone", "availability_zone"])
                .and_then(|value| value.as_str().map(str::to_string)),
            alive: get(&["Alive", "alive"]).map(|value| as_bool(&value)).unwrap_or(false),
            admin_state_up: get(&["State", "admin_state_up"])
                .map(|value| as_bool(&value))
                .unwrap_or(false),
            binary: get(&["Binary", "binary"])
                .and_then(|value| value.as_str().map(str::to_string))
                .unwrap_or_default(),
            ha_state: get(&["HA State", "ha_state"])
                .and_then(|value| value.as_str().map(str::to_string))
                .and_then(|state| match state.as_str() {
                    "active" => Some(NeutronAgentHAState::Active),
                    "standby" => Some(NeutronAgentHAState::Standby),
                    _ => None,
                }),
        })
    }
}

impl fmt::Display for NeutronAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:?}): {} {} ha_state:{} id:{} binary:{}",
            self.host,
            self.agent_type,
            if self.admin_state_up { "ADMIN_UP" } else { "ADMIN_DOWN" },
            if self.alive { "ALIVE" } else { "DEAD" },
            match self.ha_state {
                Some(NeutronAgentHAState::Active) => "active",
                Some(NeutronAgentHAState::Standby) => "standby",
                None => "NotFetched",
            },
            self.agent_id,
            self.binary,
        )
    }
}

/// One Neutron router, from `openstack router list`.
#[derive(Debug, Clone)]
pub struct Router {
    pub router_id: String,
    pub name: String,
    pub status: String,
    pub admin_state_up: bool,
}

impl Router {
    pub fn from_router_data(router_data: &Value) -> Result<Router> {
        let router_id = router_data
            .get("ID")
            .or_else(|| router_data.get("id"))
            .and_then(Value::as_str)
            .ok_or_else(|| RunbookError::MalformedOutput {
                command: "openstack router list".to_string(),
                reason: format!("router entry without id: {}", router_data),
            })?;

        let admin_state_up = match router_data.get("State").or_else(|| router_data.get("admin_state_up")) {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(text)) => text.eq_ignore_ascii_case("up"),
            _ => false,
        };

        Ok(Router {
            router_id: router_id.to_string(),
            name: router_data
                .get("Name")
                .or_else(|| router_data.get("name"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            status: router_data
                .get("Status")
                .or_else(|| router_data.get("status"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            admin_state_up,
        })
    }

    pub fn is_healthy(&self) -> bool {
        self.status == "ACTIVE" && self.admin_state_up
    }
}

/// Thin client for the `openstack` CLI running on a control node.
pub struct OpenstackApi<'a> {
    executor: &'a dyn RemoteExecutor,
    pub control_node: String,
    domain: String,
}

impl<'a> OpenstackApi<'a> {
    pub fn new(executor: &'a dyn RemoteExecutor, settings: &OpenstackClusterSettings) -> Self {
        Self {
            executor,
            control_node: settings.control_node.clone(),
            domain: settings.domain.clone(),
        }
    }

    pub fn nodes_domain(&self) -> &str {
        &self.domain
    }

    // the admin credentials are only available after sourcing novaenv, so
    // everything gets wrapped in one bash invocation
    fn full_command(&self, command: &[&str], json_output: bool) -> Vec<String> {
        let mut script = format!("source /root/novaenv.sh && openstack {}", command.join(" "));
        if json_output {
            script.push_str(" -f json");
        }

        vec!["bash".to_string(), "-c".to_string(), format!("'{}'", script)]
    }

    pub async fn run_raw(&self, command: &[&str], params: RunParams) -> Result<String> {
        let full = self.full_command(command, false);
        let full_refs: Vec<&str> = full.iter().map(String::as_str).collect();
        ports::run_raw(self.executor, &self.control_node, &full_refs, params).await
    }

    pub async fn run_json_array(&self, command: &[&str], params: RunParams) -> Result<Vec<Value>> {
        let full = self.full_command(command, true);
        let full_refs: Vec<&str> = full.iter().map(String::as_str).collect();
        ports::run_json_array(self.executor, &self.control_node, &full_refs, params).await
    }

    pub async fn run_json_object(
        &self,
        command: &[&str],
        params: RunParams,
    ) -> Result<serde_json::Map<String, Value>> {
        let full = self.full_command(command, true);
        let full_refs: Vec<&str> = full.iter().map(String::as_str).collect();
        ports::run_json_object(self.executor, &self.control_node, &full_refs, params).await
    }

    pub async fn network_agents(&self) -> Result<Vec<NeutronAgent>> {
        self.run_json_array(&["network", "agent", "list", "--long"], RunParams::SAFE)
            .await?
            .iter()
            .map(NeutronAgent::from_agent_data)
            .collect()
    }

    pub async fn network_agents_on_host(&self, host: &str) -> Result<Vec<NeutronAgent>> {
        Ok(self
            .network_agents()
            .await?
            .into_iter()
            .filter(|agent| agent.host == host)
            .collect())
    }

    pub async fn routers(&self) -> Result<Vec<Router>> {
        self.run_json_array(&["router", "list"], RunParams::SAFE)
            .await?
            .iter()
            .map(Router::from_router_data)
            .collect()
    }

    pub async fn quota_show(&self, project: &str) -> Result<serde_json::Map<String, Value>> {
        self.run_json_object(&["quota", "show", project], RunParams::SAFE)
            .await
    }

    /// Apply quota increases, passed as `(--option, value)` pairs.
    pub async fn quota_set(&self, project: &str, increases: &[(&str, i64)]) -> Result<()> {
        if increases.is_empty() {
            return Ok(());
        }

        let mut command: Vec<String> = vec!["quota".to_string(), "set".to_string()];
        for (option, value) in increases {
            command.push(option.to_string());
            command.push(value.to_string());
        }
        command.push(project.to_string());

        let command_refs: Vec<&str> = command.iter().map(String::as_str).collect();
        self.run_raw(&command_refs, RunParams::UNSAFE).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn agent_parses_unified_cli_keys() {
        let agent = NeutronAgent::from_agent_data(&json!({
            "ID": "5b7e6f3a",
            "Agent Type": "L3 agent",
            "Host": "cloudnet1005",
            "Availability Zone": "nova",
            "Alive": true,
            "State": true,
            "Binary": "neutron-l3-agent",
            "HA State": "active"
        }))
        .unwrap();

        assert_eq!(agent.agent_type, NeutronAgentType::L3);
        assert!(agent.alive);
        assert!(agent.admin_state_up);
        assert_eq!(agent.ha_state, Some(NeutronAgentHAState::Active));
    }

    #[test]
    fn agent_parses_legacy_keys_and_smiley() {
        let agent = NeutronAgent::from_agent_data(&json!({
            "id": "5b7e6f3a",
            "agent_type": "DHCP agent",
            "host": "cloudnet1006",
            "alive": ":-)",
            "admin_state_up": false,
            "binary": "neutron-dhcp-agent"
        }))
        .unwrap();

        assert_eq!(agent.agent_type, NeutronAgentType::Dhcp);
        assert!(agent.alive);
        assert!(!agent.admin_state_up);
        assert_eq!(agent.ha_state, None);
    }

    #[test]
    fn router_health_needs_active_and_admin_up() {
        let healthy = Router::from_router_data(&json!({
            "ID": "r1", "Name": "cloudinstances2b-gw", "Status": "ACTIVE", "State": true
        }))
        .unwrap();
        assert!(healthy.is_healthy());

        let down = Router::from_router_data(&json!({
            "ID": "r1", "Name": "cloudinstances2b-gw", "Status": "ACTIVE", "State": false
        }))
        .unwrap();
        assert!(!down.is_healthy());
    }
}
