use crate::core::ceph::status::{OsdClass, OsdStatus};
use crate::utils::error::{Result, RunbookError};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsdTreeNodeType {
    Root,
    Rack,
    Host,
    Osd,
    Other,
}

impl OsdTreeNodeType {
    fn from_str_lenient(raw: &str) -> OsdTreeNodeType {
        match raw {
            "root" => OsdTreeNodeType::Root,
            "rack" => OsdTreeNodeType::Rack,
            "host" => OsdTreeNodeType::Host,
            "osd" => OsdTreeNodeType::Osd,
            _ => OsdTreeNodeType::Other,
        }
    }
}

/// Extra data carried only by osd leaf entries.
#[derive(Debug, Clone)]
pub struct OsdInfo {
    pub osd_id: i64,
    pub device_class: OsdClass,
    pub status: OsdStatus,
    pub reweight: f64,
}

/// One node of the CRUSH topology (root/rack/host bucket or osd leaf).
#[derive(Debug, Clone)]
pub struct OsdTreeNode {
    pub node_id: i64,
    pub name: String,
    pub node_type: OsdTreeNodeType,
    pub crush_weight: f64,
    pub children: Vec<OsdTreeNode>,
    pub osd_info: Option<OsdInfo>,
}

impl OsdTreeNode {
    fn nodes_of_type_into<'a>(&'a self, wanted: OsdTreeNodeType, found: &mut Vec<&'a OsdTreeNode>) {
        if self.node_type == wanted {
            found.push(self);
        }

        for child in &self.children {
            child.nodes_of_type_into(wanted, found);
        }
    }
}

/// Flat entry of `ceph osd tree -f json` before tree expansion.
#[derive(Debug, Clone, Deserialize)]
struct RawTreeNode {
    id: i64,
    name: String,
    #[serde(rename = "type")]
    node_type: String,
    #[serde(default)]
    crush_weight: Option<f64>,
    #[serde(default)]
    children: Option<Vec<i64>>,
    #[serde(default)]
    device_class: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    reweight: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawTree {
    nodes: Vec<RawTreeNode>,
    #[serde(default)]
    stray: Vec<Value>,
}

/// Typed view over the CRUSH map as reported by `ceph osd tree -f json`.
#[derive(Debug, Clone)]
pub struct OsdTree {
    pub root: OsdTreeNode,
    pub stray: Vec<Value>,
}

impl OsdTree {
    pub fn from_json(raw: Value) -> Result<OsdTree> {
        let raw_tree: RawTree = serde_json::from_value(raw)?;
        let by_id: HashMap<i64, &RawTreeNode> =
            raw_tree.nodes.iter().map(|node| (node.id, node)).collect();

        let root = raw_tree
            .nodes
            .iter()
            .find(|node| node.node_type == "root")
            .ok_or_else(|| RunbookError::MalformedOutput {
                command: "ceph osd tree".to_string(),
                reason: "no root node found".to_string(),
            })?;

        Ok(OsdTree {
            root: expand_node(root, &by_id)?,
            stray: raw_tree.stray,
        })
    }

    /// All the nodes matching a type, no matter where in the tree.
    pub fn nodes_of_type(&self, wanted: OsdTreeNodeType) -> Vec<&OsdTreeNode> {
        let mut found = Vec::new();
        self.root.nodes_of_type_into(wanted, &mut found);
        found
    }

    /// OSD ids living under the given host bucket.
    pub fn host_osd_ids(&self, hostname: &str) -> Result<Vec<i64>> {
        let hosts = self.nodes_of_type(OsdTreeNodeType::Host);
        for host in &hosts {
            if host.name == hostname {
                return Ok(host.children.iter().map(|osd| osd.node_id).collect());
            }
        }

        Err(RunbookError::MalformedOutput {
            command: "ceph osd tree".to_string(),
            reason: format!(
                "unable to find osd host {} among: {:?}",
                hostname,
                hosts.iter().map(|host| &host.name).collect::<Vec<_>>()
            ),
        })
    }
}

fn expand_node(raw: &RawTreeNode, by_id: &HashMap<i64, &RawTreeNode>) -> Result<OsdTreeNode> {
    // osd entries are always leaves
    if raw.node_type == "osd" {
        return Ok(OsdTreeNode {
            node_id: raw.id,
            name: raw.name.clone(),
            node_type: OsdTreeNodeType::Osd,
            crush_weight: raw.crush_weight.unwrap_or(0.0),
            children: Vec::new(),
            osd_info: Some(OsdInfo {
                osd_id: raw.id,
                device_class: OsdClass::from_str_lenient(raw.device_class.as_deref().unwrap_or("")),
                status: OsdStatus::from_str_lenient(raw.status.as_deref().unwrap_or("")),
                reweight: raw.reweight.unwrap_or(0.0),
            }),
        });
    }

    // any other type must carry a children list, possibly empty
    let children_ids = raw
        .children
        .as_ref()
        .ok_or_else(|| RunbookError::MalformedOutput {
            command: "ceph osd tree".to_string(),
            reason: format!("unexpected leaf node that is not an osd: {}", raw.name),
        })?;

    let mut children = Vec::with_capacity(children_ids.len());
    for child_id in children_ids {
        let child = by_id
            .get(child_id)
            .ok_or_else(|| RunbookError::MalformedOutput {
                command: "ceph osd tree".to_string(),
                reason: format!("node {} references unknown child id {}", raw.name, child_id),
            })?;
        children.push(expand_node(child, by_id)?);
    }

    let crush_weight = raw
        .crush_weight
        .unwrap_or_else(|| children.iter().map(|child| child.crush_weight).sum());

    Ok(OsdTreeNode {
        node_id: raw.id,
        name: raw.name.clone(),
        node_type: OsdTreeNodeType::from_str_lenient(&raw.node_type),
        crush_weight,
        children,
        osd_info: None,
    })
}
