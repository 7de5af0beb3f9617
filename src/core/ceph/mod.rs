pub mod cluster;
pub mod osd_node;
pub mod osd_tree;
pub mod status;

pub use cluster::CephClusterController;
pub use osd_node::CephOsdNodeController;
pub use osd_tree::{OsdTree, OsdTreeNode, OsdTreeNodeType};
pub use status::{CephOsdFlag, ClusterStatus, MgrMap, OsdClass, OsdStatus};
