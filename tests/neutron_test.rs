mod common;

use common::ScriptedExecutor;

use cloud_runbooks::config::settings::OpenstackClusterSettings;
use cloud_runbooks::core::neutron::NeutronController;
use cloud_runbooks::core::openstack::OpenstackApi;
use cloud_runbooks::RunbookError;
use serde_json::json;

fn eqiad_deployment() -> OpenstackClusterSettings {
    OpenstackClusterSettings {
        control_node: "cloudcontrol1005.eqiad.wmnet".to_string(),
        domain: "eqiad.wmnet".to_string(),
    }
}

fn agent(id: &str, agent_type: &str, host: &str, up: bool, ha_state: Option<&str>) -> serde_json::Value {
    let mut agent = json!({
        "ID": id,
        "Agent Type": agent_type,
        "Host": host,
        "Availability Zone": "nova",
        "Alive": true,
        "State": up,
        "Binary": "neutron-l3-agent",
    });
    if let Some(ha_state) = ha_state {
        agent["HA State"] = json!(ha_state);
    }

    agent
}

#[tokio::test]
async fn cloudnet_admin_down_only_flips_agents_that_are_up() {
    let agents_before = json!([
        agent("aaa", "L3 agent", "cloudnet1005", true, Some("active")),
        agent("bbb", "DHCP agent", "cloudnet1005", false, None),
        agent("ccc", "L3 agent", "cloudnet1006", true, Some("standby")),
    ])
    .to_string();
    let agents_after = json!([
        agent("aaa", "L3 agent", "cloudnet1005", false, Some("standby")),
        agent("bbb", "DHCP agent", "cloudnet1005", false, None),
        agent("ccc", "L3 agent", "cloudnet1006", true, Some("active")),
    ])
    .to_string();
    let executor = ScriptedExecutor::new([agents_before, "".to_string(), agents_after]);
    let api = OpenstackApi::new(&executor, &eqiad_deployment());
    let controller = NeutronController::new(&api);

    controller.cloudnet_set_admin_down("cloudnet1005").await.unwrap();

    let commands = executor.seen_commands();
    assert_eq!(commands.len(), 3);
    assert!(commands[1].contains("network agent set --disable aaa"));
}

#[tokio::test]
async fn waiting_for_admin_down_returns_once_all_agents_flipped() {
    let all_down = json!([
        agent("aaa", "L3 agent", "cloudnet1005", false, Some("standby")),
        agent("bbb", "DHCP agent", "cloudnet1005", false, None),
    ])
    .to_string();
    let executor = ScriptedExecutor::new([all_down]);
    let api = OpenstackApi::new(&executor, &eqiad_deployment());
    let controller = NeutronController::new(&api);

    controller
        .wait_for_cloudnet_admin_down("cloudnet1005")
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn an_agent_stuck_admin_up_turns_the_wait_into_a_transition_error() {
    let stuck = json!([
        agent("aaa", "L3 agent", "cloudnet1005", true, Some("active")),
    ])
    .to_string();
    // one poll every 10s over the 15 minute transition window
    let executor = ScriptedExecutor::new(std::iter::repeat(stuck).take(91));
    let api = OpenstackApi::new(&executor, &eqiad_deployment());
    let controller = NeutronController::new(&api);

    let result = controller.wait_for_cloudnet_admin_down("cloudnet1005").await;

    match result {
        Err(RunbookError::AgentTransitionError { host, wanted }) => {
            assert_eq!(host, "cloudnet1005");
            assert_eq!(wanted, "down");
        }
        other => panic!("expected a transition error, got {:?}", other),
    }
}

#[tokio::test]
async fn cloudnets_are_the_hosts_running_l3_agents() {
    let agents = json!([
        agent("aaa", "L3 agent", "cloudnet1005", true, Some("active")),
        agent("bbb", "Open vSwitch agent", "cloudvirt1010", true, None),
        agent("ccc", "L3 agent", "cloudnet1006", true, Some("standby")),
    ])
    .to_string();
    let executor = ScriptedExecutor::new([agents]);
    let api = OpenstackApi::new(&executor, &eqiad_deployment());
    let controller = NeutronController::new(&api);

    let cloudnets = controller.cloudnets().await.unwrap();

    assert_eq!(cloudnets, vec!["cloudnet1005", "cloudnet1006"]);
}

#[tokio::test]
async fn the_l3_primary_is_the_host_with_the_active_agent() {
    let routers = json!([
        {"ID": "router-1", "Name": "cloudinstances2b-gw", "Status": "ACTIVE", "State": true}
    ])
    .to_string();
    let router_agents = json!([
        agent("aaa", "L3 agent", "cloudnet1005", true, Some("standby")),
        agent("bbb", "L3 agent", "cloudnet1006", true, Some("active")),
    ])
    .to_string();
    let executor = ScriptedExecutor::new([routers, router_agents]);
    let api = OpenstackApi::new(&executor, &eqiad_deployment());
    let controller = NeutronController::new(&api);

    let primary = controller.l3_primary().await.unwrap();

    assert_eq!(primary, "cloudnet1006");
}

#[tokio::test]
async fn a_router_without_an_active_agent_has_no_primary() {
    let routers = json!([
        {"ID": "router-1", "Name": "cloudinstances2b-gw", "Status": "ACTIVE", "State": true}
    ])
    .to_string();
    let router_agents = json!([
        agent("aaa", "L3 agent", "cloudnet1005", true, Some("standby")),
    ])
    .to_string();
    let executor = ScriptedExecutor::new([routers, router_agents]);
    let api = OpenstackApi::new(&executor, &eqiad_deployment());
    let controller = NeutronController::new(&api);

    let result = controller.l3_primary().await;

    assert!(matches!(result, Err(RunbookError::NetworkUnhealthy { .. })));
}

#[tokio::test]
async fn a_healthy_network_passes_the_check() {
    let agents = json!([
        agent("aaa", "L3 agent", "cloudnet1005", true, Some("active")),
        agent("bbb", "L3 agent", "cloudnet1006", true, Some("standby")),
    ])
    .to_string();
    let routers = json!([
        {"ID": "router-1", "Name": "cloudinstances2b-gw", "Status": "ACTIVE", "State": true}
    ])
    .to_string();
    let executor = ScriptedExecutor::new([agents.clone(), agents, routers]);
    let api = OpenstackApi::new(&executor, &eqiad_deployment());
    let controller = NeutronController::new(&api);

    controller.check_network_alive().await.unwrap();
}

#[tokio::test]
async fn a_dead_agent_fails_the_network_check() {
    let mut dead = agent("aaa", "L3 agent", "cloudnet1005", true, Some("active"));
    dead["Alive"] = json!(false);
    let agents = json!([dead]).to_string();
    let executor = ScriptedExecutor::new([agents.clone(), agents]);
    let api = OpenstackApi::new(&executor, &eqiad_deployment());
    let controller = NeutronController::new(&api);

    let result = controller.check_network_alive().await;

    assert!(matches!(result, Err(RunbookError::NetworkUnhealthy { .. })));
}

#[tokio::test]
async fn openstack_commands_source_the_admin_credentials() {
    let executor = ScriptedExecutor::new([json!([]).to_string()]);
    let api = OpenstackApi::new(&executor, &eqiad_deployment());

    api.network_agents().await.unwrap();

    let commands = executor.seen_commands();
    assert!(commands[0].starts_with("cloudcontrol1005.eqiad.wmnet: bash -c"));
    assert!(commands[0].contains("source /root/novaenv.sh && openstack network agent list --long -f json"));
}
