pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use config::{Cli, Settings};
pub use core::{
    CephClusterController, CephOsdNodeController, GridController, NeutronController, OpenstackApi,
};
pub use utils::error::{Result, RunbookError};
