//! Static route BFD manager daemon for SONiC
//!
//! Keeps statically-configured routes consistent with BFD session liveness:
//! requests BFD sessions for the nexthops of BFD-enabled static routes,
//! follows reported session state, and publishes each route filtered to
//! its currently reachable nexthops.

mod bfd;
mod daemon;
mod error;
mod intf;
mod publish;
mod route_mgr;
mod state;
mod tables;
mod types;

pub use daemon::{dispatch, reconcile_startup, run};
pub use error::{RouteBfdError, RouteBfdResult};
pub use route_mgr::StaticRouteBfdMgr;
pub use state::{InterfaceAddr, LocalStateStore};
pub use tables::*;
pub use types::*;
