use cloud_runbooks::core::ceph::osd_tree::{OsdTree, OsdTreeNodeType};
use cloud_runbooks::core::ceph::status::{OsdClass, OsdStatus};
use cloud_runbooks::RunbookError;
use serde_json::json;

fn two_host_tree() -> serde_json::Value {
    json!({
        "nodes": [
            {"id": -1, "name": "default", "type": "root", "children": [-2, -3]},
            {
                "id": -2,
                "name": "cloudcephosd1001",
                "type": "host",
                "children": [0, 1]
            },
            {
                "id": -3,
                "name": "cloudcephosd1002",
                "type": "host",
                "crush_weight": 3.4,
                "children": [2]
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
                "device_class": "hdd",
                "status": "down",
                "reweight": 0.0
            },
            {
                "id": 2,
                "name": "osd.2",
                "type": "osd",
                "crush_weight": 3.4,
                "device_class": "ssd",
                "status": "up",
                "reweight": 1.0
            }
        ],
        "stray": []
    })
}

#[test]
fn the_flat_dump_expands_into_a_tree() {
    let tree = OsdTree::from_json(two_host_tree()).unwrap();

    assert_eq!(tree.root.name, "default");
    assert_eq!(tree.root.children.len(), 2);
    assert_eq!(tree.nodes_of_type(OsdTreeNodeType::Host).len(), 2);
    assert_eq!(tree.nodes_of_type(OsdTreeNodeType::Osd).len(), 3);
}

#[test]
fn osd_leaves_carry_their_daemon_info() {
    let tree = OsdTree::from_json(two_host_tree()).unwrap();

    let osds = tree.nodes_of_type(OsdTreeNodeType::Osd);
    let osd1 = osds.iter().find(|osd| osd.name == "osd.1").unwrap();
    let info = osd1.osd_info.as_ref().unwrap();

    assert_eq!(info.osd_id, 1);
    assert_eq!(info.device_class, OsdClass::Hdd);
    assert_eq!(info.status, OsdStatus::Down);
    assert_eq!(info.reweight, 0.0);
}

#[test]
fn bucket_weight_falls_back_to_the_sum_of_its_children() {
    let tree = OsdTree::from_json(two_host_tree()).unwrap();

    let hosts = tree.nodes_of_type(OsdTreeNodeType::Host);
    let without_weight = hosts
        .iter()
        .find(|host| host.name == "cloudcephosd1001")
        .unwrap();
    let with_weight = hosts
        .iter()
        .find(|host| host.name == "cloudcephosd1002")
        .unwrap();

    assert_eq!(without_weight.crush_weight, 3.4);
    assert_eq!(with_weight.crush_weight, 3.4);
}

#[test]
fn host_osd_ids_finds_the_right_bucket() {
    let tree = OsdTree::from_json(two_host_tree()).unwrap();

    assert_eq!(tree.host_osd_ids("cloudcephosd1001").unwrap(), vec![0, 1]);
    assert_eq!(tree.host_osd_ids("cloudcephosd1002").unwrap(), vec![2]);
    assert!(matches!(
        tree.host_osd_ids("cloudcephosd9999"),
        Err(RunbookError::MalformedOutput { .. })
    ));
}

#[test]
fn a_dump_without_a_root_is_malformed() {
    let result = OsdTree::from_json(json!({
        "nodes": [
            {"id": -2, "name": "lonely-host", "type": "host", "children": []}
        ],
        "stray": []
    }));

    assert!(matches!(
        result,
        Err(RunbookError::MalformedOutput { .. })
    ));
}

#[test]
fn a_non_osd_leaf_is_malformed() {
    let result = OsdTree::from_json(json!({
        "nodes": [
            {"id": -1, "name": "default", "type": "root", "children": [-2]},
            {"id": -2, "name": "broken-host", "type": "host"}
        ],
        "stray": []
    }));

    assert!(matches!(
        result,
        Err(RunbookError::MalformedOutput { .. })
    ));
}
