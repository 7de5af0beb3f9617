pub mod ceph;
pub mod grid;
pub mod neutron;
pub mod node;
pub mod openstack;
pub mod wait;

pub use ceph::{CephClusterController, CephOsdNodeController};
pub use grid::GridController;
pub use neutron::NeutronController;
pub use openstack::OpenstackApi;
