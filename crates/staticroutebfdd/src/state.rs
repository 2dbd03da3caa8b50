//! Local State Store - in-memory tables for derived and intermediate state
//!
//! Only the single event-processing task mutates this store, so there is no
//! locking. Reference sets are garbage-collected when they empty, which keeps
//! the "entry exists iff its reference set is non-empty" invariant.

use std::collections::{HashMap, HashSet};

use sonic_types::{Family, IpAddress};

use crate::types::{BfdSessionInfo, BfdSessionKey, NexthopKey, RouteKey, StaticRouteConfig};

/// Per-interface address slots: at most one address per family.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceAddr {
    pub v4: Option<IpAddress>,
    pub v6: Option<IpAddress>,
}

impl InterfaceAddr {
    /// Returns the address of the requested family, if assigned.
    pub fn get(&self, family: Family) -> Option<IpAddress> {
        match family {
            Family::Ipv4 => self.v4,
            Family::Ipv6 => self.v6,
        }
    }
}

/// In-memory tables mirroring derived and intermediate state.
#[derive(Default)]
pub struct LocalStateStore {
    route_configs: HashMap<RouteKey, StaticRouteConfig>,
    nexthop_refs: HashMap<NexthopKey, HashSet<RouteKey>>,
    bfd_sessions: HashMap<BfdSessionKey, BfdSessionInfo>,
    pending_sessions: HashSet<(String, BfdSessionKey)>,
    reachable: HashMap<RouteKey, HashSet<NexthopKey>>,
    intf_addrs: HashMap<String, InterfaceAddr>,
}

impl LocalStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Route configuration

    pub fn route_config(&self, key: &RouteKey) -> Option<&StaticRouteConfig> {
        self.route_configs.get(key)
    }

    pub fn route_config_mut(&mut self, key: &RouteKey) -> Option<&mut StaticRouteConfig> {
        self.route_configs.get_mut(key)
    }

    pub fn set_route_config(&mut self, key: RouteKey, config: StaticRouteConfig) {
        self.route_configs.insert(key, config);
    }

    pub fn remove_route_config(&mut self, key: &RouteKey) -> Option<StaticRouteConfig> {
        self.route_configs.remove(key)
    }

    // Nexthop reference sets

    /// Records that `route` uses `nexthop`.
    pub fn add_nexthop_ref(&mut self, nexthop: NexthopKey, route: RouteKey) {
        self.nexthop_refs.entry(nexthop).or_default().insert(route);
    }

    /// Returns true if `route` currently references `nexthop`.
    pub fn has_nexthop_ref(&self, nexthop: &NexthopKey, route: &RouteKey) -> bool {
        self.nexthop_refs
            .get(nexthop)
            .is_some_and(|set| set.contains(route))
    }

    /// Drops the `route -> nexthop` reference. Returns true if the reference
    /// set became empty (and was garbage-collected).
    pub fn remove_nexthop_ref(&mut self, nexthop: &NexthopKey, route: &RouteKey) -> bool {
        let Some(set) = self.nexthop_refs.get_mut(nexthop) else {
            return false;
        };
        set.remove(route);
        if set.is_empty() {
            self.nexthop_refs.remove(nexthop);
            true
        } else {
            false
        }
    }

    /// Returns the routes referencing `nexthop`, in stable key order.
    pub fn routes_using(&self, nexthop: &NexthopKey) -> Vec<RouteKey> {
        let mut routes: Vec<RouteKey> = self
            .nexthop_refs
            .get(nexthop)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        routes.sort_by_key(|k| k.to_output_key());
        routes
    }

    // BFD sessions

    pub fn bfd_session(&self, key: &BfdSessionKey) -> Option<&BfdSessionInfo> {
        self.bfd_sessions.get(key)
    }

    pub fn bfd_session_mut(&mut self, key: &BfdSessionKey) -> Option<&mut BfdSessionInfo> {
        self.bfd_sessions.get_mut(key)
    }

    pub fn insert_bfd_session(&mut self, key: BfdSessionKey, info: BfdSessionInfo) {
        self.bfd_sessions.insert(key, info);
    }

    pub fn remove_bfd_session(&mut self, key: &BfdSessionKey) -> Option<BfdSessionInfo> {
        self.bfd_sessions.remove(key)
    }

    /// Returns the keys of sessions not owned by any static route.
    pub fn unowned_bfd_sessions(&self) -> Vec<BfdSessionKey> {
        self.bfd_sessions
            .iter()
            .filter(|(_, info)| !info.static_route_owned)
            .map(|(key, _)| key.clone())
            .collect()
    }

    // Pending session requests

    pub fn add_pending_session(&mut self, ifname: impl Into<String>, session: BfdSessionKey) {
        self.pending_sessions.insert((ifname.into(), session));
    }

    /// Returns the sessions waiting for an address on `ifname`.
    pub fn pending_sessions_for_intf(&self, ifname: &str) -> Vec<BfdSessionKey> {
        self.pending_sessions
            .iter()
            .filter(|(intf, _)| intf == ifname)
            .map(|(_, session)| session.clone())
            .collect()
    }

    pub fn remove_pending_session(&mut self, ifname: &str, session: &BfdSessionKey) {
        self.pending_sessions
            .remove(&(ifname.to_string(), session.clone()));
    }

    /// Drops every pending request for `session`, whatever interface it is
    /// waiting on.
    pub fn remove_pending_for_session(&mut self, session: &BfdSessionKey) {
        self.pending_sessions.retain(|(_, s)| s != session);
    }

    pub fn has_pending_sessions(&self) -> bool {
        !self.pending_sessions.is_empty()
    }

    // Reachable sets

    /// Marks `nexthop` reachable for `route`. Returns true if it was not
    /// already in the set.
    pub fn add_reachable(&mut self, route: RouteKey, nexthop: NexthopKey) -> bool {
        self.reachable.entry(route).or_default().insert(nexthop)
    }

    /// Removes `nexthop` from the route's reachable set. Returns true if the
    /// set changed.
    pub fn remove_reachable(&mut self, route: &RouteKey, nexthop: &NexthopKey) -> bool {
        let Some(set) = self.reachable.get_mut(route) else {
            return false;
        };
        let removed = set.remove(nexthop);
        if set.is_empty() {
            self.reachable.remove(route);
        }
        removed
    }

    pub fn remove_reachable_all(&mut self, route: &RouteKey) {
        self.reachable.remove(route);
    }

    pub fn is_reachable(&self, route: &RouteKey, nexthop: &NexthopKey) -> bool {
        self.reachable
            .get(route)
            .is_some_and(|set| set.contains(nexthop))
    }

    pub fn reachable_count(&self, route: &RouteKey) -> usize {
        self.reachable.get(route).map(HashSet::len).unwrap_or(0)
    }

    // Interface addresses

    /// Stores an interface address, overwriting only the matching family
    /// slot.
    pub fn set_intf_addr(&mut self, ifname: impl Into<String>, addr: IpAddress) {
        let slots = self.intf_addrs.entry(ifname.into()).or_default();
        match addr.family() {
            Family::Ipv4 => slots.v4 = Some(addr),
            Family::Ipv6 => slots.v6 = Some(addr),
        }
    }

    /// Clears one family slot. The interface row itself is kept so the other
    /// family's address survives.
    pub fn clear_intf_addr(&mut self, ifname: &str, family: Family) {
        if let Some(slots) = self.intf_addrs.get_mut(ifname) {
            match family {
                Family::Ipv4 => slots.v4 = None,
                Family::Ipv6 => slots.v6 = None,
            }
        }
    }

    pub fn intf_addr(&self, ifname: &str, family: Family) -> Option<IpAddress> {
        self.intf_addrs
            .get(ifname)
            .and_then(|slots| slots.get(family))
    }
}
