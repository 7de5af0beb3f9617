mod common;

use common::{RecordingSilencer, ScriptedExecutor};

use cloud_runbooks::config::settings::CephClusterSettings;
use cloud_runbooks::core::ceph::CephClusterController;
use cloud_runbooks::core::ceph::status::CephOsdFlag;
use cloud_runbooks::RunbookError;
use serde_json::json;

fn eqiad_cluster() -> CephClusterSettings {
    CephClusterSettings {
        mon_nodes: vec![
            "cloudcephmon1001.eqiad.wmnet".to_string(),
            "cloudcephmon1002.eqiad.wmnet".to_string(),
        ],
        osd_drives_per_host: 8,
        domain: "eqiad.wmnet".to_string(),
    }
}

fn healthy_status() -> String {
    json!({"health": {"status": "HEALTH_OK", "checks": {}}}).to_string()
}

fn maintenance_status() -> String {
    json!({
        "health": {
            "status": "HEALTH_WARN",
            "checks": {
                "OSDMAP_FLAGS": {
                    "summary": {"message": "noout,norebalance flag(s) set"}
                }
            }
        }
    })
    .to_string()
}

fn small_osd_tree() -> String {
    json!({
        "nodes": [
            {"id": -1, "name": "default", "type": "root", "children": [-2]},
            {
                "id": -2,
                "name": "cloudcephosd1001",
                "type": "host",
                "children": [0, 1]
            },
            {
                "id": 0,
                "name": "osd.0",
                "type": "osd",
                "crush_weight": 1.7,
                "device_class": "ssd",
                "status": "up",
                "reweight": 1.0
            },
            {
                "id": 1,
                "name": "osd.1",
                "type": "osd",
                "crush_weight": 1.7,
                "device_class": "ssd",
                "status": "up",
                "reweight": 1.0
            }
        ],
        "stray": []
    })
    .to_string()
}

#[tokio::test]
async fn set_maintenance_sets_both_flags_when_healthy() {
    let executor = ScriptedExecutor::new([
        healthy_status(),
        "noout is set".to_string(),
        "norebalance is set".to_string(),
    ]);
    let silencer = RecordingSilencer::default();
    let controller = CephClusterController::new(&executor, &silencer, &eqiad_cluster()).unwrap();

    let silences = controller.set_maintenance("testing", false).await.unwrap();

    assert_eq!(silences.len(), 1);
    let commands = executor.seen_commands();
    assert_eq!(
        commands,
        vec![
            "cloudcephmon1001.eqiad.wmnet: ceph status -f json",
            "cloudcephmon1001.eqiad.wmnet: ceph osd set noout",
            "cloudcephmon1001.eqiad.wmnet: ceph osd set norebalance",
        ]
    );
    assert_eq!(silencer.silenced.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn wait_for_rebalance_times_out_while_objects_stay_misplaced() {
    let rebalancing = json!({
        "health": {"status": "HEALTH_WARN", "checks": {}},
        "pgmap": {"misplaced_objects": 100}
    })
    .to_string();
    let executor = ScriptedExecutor::new(std::iter::repeat(rebalancing).take(6));
    let silencer = RecordingSilencer::default();
    let controller = CephClusterController::new(&executor, &silencer, &eqiad_cluster()).unwrap();

    let result = controller
        .wait_for_rebalance(std::time::Duration::from_secs(30))
        .await;

    match result {
        Err(RunbookError::Timeout {
            what, waited_secs, ..
        }) => {
            assert_eq!(what, "the cluster to finish rebalancing");
            assert_eq!(waited_secs, 30);
        }
        other => panic!("expected a timeout, got {:?}", other),
    }
}

#[tokio::test]
async fn set_maintenance_is_a_noop_when_already_in_maintenance() {
    let executor = ScriptedExecutor::new([maintenance_status()]);
    let silencer = RecordingSilencer::default();
    let controller = CephClusterController::new(&executor, &silencer, &eqiad_cluster()).unwrap();

    controller.set_maintenance("testing", false).await.unwrap();

    // only the status check, no flag changes
    assert_eq!(executor.seen_commands().len(), 1);
}

#[tokio::test]
async fn set_maintenance_refuses_an_unhealthy_cluster_without_force() {
    let unhealthy = json!({
        "health": {
            "status": "HEALTH_WARN",
            "checks": {"OSD_DOWN": {"summary": {"message": "1 osd down"}}}
        }
    })
    .to_string();
    let executor = ScriptedExecutor::new([unhealthy]);
    let silencer = RecordingSilencer::default();
    let controller = CephClusterController::new(&executor, &silencer, &eqiad_cluster()).unwrap();

    let result = controller.set_maintenance("testing", false).await;

    assert!(matches!(result, Err(RunbookError::ClusterUnhealthy { .. })));
    assert_eq!(executor.seen_commands().len(), 1);
}

#[tokio::test]
async fn unset_maintenance_clears_the_flags_and_expires_the_silences() {
    let executor = ScriptedExecutor::new([
        maintenance_status(),
        "noout is unset".to_string(),
        "norebalance is unset".to_string(),
    ]);
    let silencer = RecordingSilencer::default();
    let controller = CephClusterController::new(&executor, &silencer, &eqiad_cluster()).unwrap();

    controller
        .unset_maintenance(&["silence-1".to_string()], false)
        .await
        .unwrap();

    assert_eq!(
        executor.seen_commands(),
        vec![
            "cloudcephmon1001.eqiad.wmnet: ceph status -f json",
            "cloudcephmon1001.eqiad.wmnet: ceph osd unset noout",
            "cloudcephmon1001.eqiad.wmnet: ceph osd unset norebalance",
        ]
    );
    assert_eq!(
        silencer.expired.lock().unwrap().clone(),
        vec!["silence-1".to_string()]
    );
}

#[tokio::test]
async fn a_bad_flag_ack_is_an_error() {
    let executor = ScriptedExecutor::new(["Error EPERM: permission denied".to_string()]);
    let silencer = RecordingSilencer::default();
    let controller = CephClusterController::new(&executor, &silencer, &eqiad_cluster()).unwrap();

    let result = controller.set_osdmap_flag(CephOsdFlag::Noout).await;

    assert!(matches!(result, Err(RunbookError::FlagChangeError { .. })));
}

#[tokio::test]
async fn changing_the_controlling_node_picks_another_mon() {
    let nodes = json!({
        "mon": {"cloudcephmon1001": [], "cloudcephmon1002": []},
        "osd": {"cloudcephosd1001": [0, 1]}
    })
    .to_string();
    let executor = ScriptedExecutor::new([nodes]);
    let silencer = RecordingSilencer::default();
    let mut controller =
        CephClusterController::new(&executor, &silencer, &eqiad_cluster()).unwrap();

    controller.change_controlling_node().await.unwrap();

    assert_eq!(
        controller.controlling_node_fqdn,
        "cloudcephmon1002.eqiad.wmnet"
    );
}

#[tokio::test]
async fn draining_osds_reweights_them_before_marking_them_out() {
    let executor = ScriptedExecutor::new([
        "osd.0,osd.1 are ok to stop without reducing availability or risking data".to_string(),
        small_osd_tree(),
        "reweighted item id 0 name 'osd.0' to 0".to_string(),
        small_osd_tree(),
        "reweighted item id 1 name 'osd.1' to 0".to_string(),
        "marked out osd.0.".to_string(),
        "marked out osd.1.".to_string(),
    ]);
    let silencer = RecordingSilencer::default();
    let controller = CephClusterController::new(&executor, &silencer, &eqiad_cluster()).unwrap();

    let had_changes = controller.drain_osds(&[0, 1], false).await.unwrap();

    assert!(had_changes);
    let commands = executor.seen_commands();
    let reweight_pos = commands
        .iter()
        .position(|command| command.contains("crush reweight osd.0"))
        .unwrap();
    let out_pos = commands
        .iter()
        .position(|command| command.contains("osd out osd.0"))
        .unwrap();
    assert!(reweight_pos < out_pos);
}

#[tokio::test]
async fn draining_osds_stops_when_they_are_not_ok_to_stop() {
    let executor =
        ScriptedExecutor::new(["Error EBUSY: 2 PGs are currently degraded".to_string()]);
    let silencer = RecordingSilencer::default();
    let controller = CephClusterController::new(&executor, &silencer, &eqiad_cluster()).unwrap();

    let result = controller.drain_osds(&[0, 1], false).await;

    assert!(matches!(result, Err(RunbookError::ClusterUnhealthy { .. })));
    // the safety check only, no reweights
    assert_eq!(executor.seen_commands().len(), 1);
}

#[tokio::test]
async fn undraining_osds_reuses_the_pooled_weight() {
    let executor = ScriptedExecutor::new([
        small_osd_tree(),
        // the target osd already carries the right weight, only the second
        // one needs a reweight
        small_osd_tree(),
        small_osd_tree(),
        "reweighted item id 2 name 'osd.2' to 1.7".to_string(),
        "marked in osd.0.".to_string(),
        "marked in osd.2.".to_string(),
    ]);
    let silencer = RecordingSilencer::default();
    let controller = CephClusterController::new(&executor, &silencer, &eqiad_cluster()).unwrap();

    controller.undrain_osds(&[0, 2], 0.0).await.unwrap();

    let commands = executor.seen_commands();
    assert!(commands
        .iter()
        .any(|command| command.contains("crush reweight osd.2 1.7")));
    assert!(!commands
        .iter()
        .any(|command| command.contains("crush reweight osd.0")));
}

#[tokio::test]
async fn destroying_an_osd_requires_it_to_be_safe() {
    let not_safe = json!({
        "safe_to_destroy": [],
        "missing_stats": [],
        "stored_pgs": [0],
        "active": [0]
    })
    .to_string();
    let executor = ScriptedExecutor::new([not_safe]);
    let silencer = RecordingSilencer::default();
    let controller = CephClusterController::new(&executor, &silencer, &eqiad_cluster()).unwrap();

    let result = controller.destroy_osd(0, false).await;

    assert!(matches!(result, Err(RunbookError::ClusterUnhealthy { .. })));
}

#[tokio::test]
async fn all_osd_ips_deduplicates_public_and_cluster_addresses() {
    let osd_dump = json!({
        "osds": [
            {
                "osd": 0,
                "public_addr": "10.64.20.10:6800/1",
                "cluster_addr": "192.168.4.10:6800/1"
            },
            {
                "osd": 1,
                "public_addr": "10.64.20.10:6801/1",
                "cluster_addr": "192.168.4.11:6800/1"
            }
        ]
    })
    .to_string();
    let executor = ScriptedExecutor::new([osd_dump]);
    let silencer = RecordingSilencer::default();
    let controller = CephClusterController::new(&executor, &silencer, &eqiad_cluster()).unwrap();

    let ips = controller.all_osd_ips().await.unwrap();

    assert_eq!(ips.len(), 3);
    assert!(ips.contains("10.64.20.10"));
    assert!(ips.contains("192.168.4.11"));
}
