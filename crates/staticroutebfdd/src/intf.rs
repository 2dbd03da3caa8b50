//! Interface address tracking operations
//!
//! Keeps the per-interface IPv4/IPv6 address slots current and drains the
//! pending BFD session queue when addressing appears.

use sonic_orch_common::Operation;
use sonic_types::{IpAddress, IpPrefix};
use tracing::debug;

use crate::error::{RouteBfdError, RouteBfdResult};
use crate::route_mgr::StaticRouteBfdMgr;

impl StaticRouteBfdMgr {
    /// Handles an INTERFACE/LOOPBACK_INTERFACE/PORTCHANNEL_INTERFACE event.
    ///
    /// Address rows are keyed `name|ip/prefixlen`; rows without the address
    /// part are interface-level config and are skipped. A DEL clears only
    /// the matching family slot, the other family's address survives.
    pub fn handle_intf_event(&mut self, raw_key: &str, op: Operation) -> RouteBfdResult<()> {
        let Some((ifname, prefix_str)) = raw_key.split_once('|') else {
            return Ok(());
        };

        let prefix: IpPrefix = prefix_str
            .parse()
            .map_err(|e| RouteBfdError::invalid_key(raw_key, format!("{}", e)))?;
        let addr = *prefix.address();

        match op {
            Operation::Set => {
                debug!(intf = ifname, %addr, "interface address assigned");
                self.store.set_intf_addr(ifname, addr);
                self.resolve_pending_sessions(ifname);
            }
            Operation::Del => {
                debug!(intf = ifname, %addr, "interface address removed");
                self.store.clear_intf_addr(ifname, addr.family());
            }
        }
        Ok(())
    }

    /// Returns the interface address matching the peer's family, if any.
    pub(crate) fn find_interface_ip(&self, ifname: &str, peer: IpAddress) -> Option<IpAddress> {
        self.store.intf_addr(ifname, peer.family())
    }

    /// Materializes queued session requests that were waiting for an address
    /// on `ifname`.
    pub(crate) fn resolve_pending_sessions(&mut self, ifname: &str) {
        for session in self.store.pending_sessions_for_intf(ifname) {
            if let Some(local) = self.find_interface_ip(ifname, session.peer) {
                self.store.remove_pending_session(ifname, &session);
                self.create_session(session, local);
            }
        }
    }
}
