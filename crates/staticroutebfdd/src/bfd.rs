//! BFD session coordination
//!
//! Owns the lifecycle of session requests created on behalf of static
//! routes: creation (direct or queued behind interface addressing),
//! refcounted release, state report handling, and the startup ownership
//! bookkeeping for pre-existing session rows.

use sonic_orch_common::{FieldValue, FieldValuesExt};
use sonic_types::IpAddress;
use tracing::{debug, info, warn};

use crate::error::RouteBfdResult;
use crate::route_mgr::StaticRouteBfdMgr;
use crate::tables::bfd_fields;
use crate::types::{BfdSessionInfo, BfdSessionKey, BfdState, NexthopKey, RouteKey};

impl StaticRouteBfdMgr {
    /// Ensures a session exists (or is queued) for the given nexthop.
    ///
    /// An already-tracked session is simply claimed; otherwise the session
    /// is created if the egress interface has an address of the peer's
    /// family, and queued until one appears if not.
    pub(crate) fn request_session(&mut self, nh_vrf: &str, ifname: &str, peer: IpAddress) {
        let key = BfdSessionKey::for_static_route(nh_vrf, peer);

        if let Some(session) = self.store.bfd_session_mut(&key) {
            session.static_route_owned = true;
            return;
        }

        match self.find_interface_ip(ifname, peer) {
            Some(local) => self.create_session(key, local),
            None => {
                debug!(
                    session = %key,
                    intf = ifname,
                    "no usable local address yet, queueing session request"
                );
                self.store.add_pending_session(ifname, key);
            }
        }
    }

    /// Publishes a session request and starts tracking it as ours.
    pub(crate) fn create_session(&mut self, key: BfdSessionKey, local_addr: IpAddress) {
        info!(session = %key, local = %local_addr, "creating bfd session");
        let info = BfdSessionInfo::owned(local_addr, self.bfd_params.clone());
        self.publish_bfd_request(&key, &info);
        self.store.insert_bfd_session(key, info);
    }

    /// Drops `route`'s reference on `nexthop`; the session (or its queued
    /// request) is torn down once no route references it anymore.
    pub(crate) fn release_session(&mut self, nexthop: &NexthopKey, route: &RouteKey) {
        if !self.store.remove_nexthop_ref(nexthop, route) {
            return;
        }

        let key = BfdSessionKey::for_static_route(nexthop.vrf.clone(), nexthop.ip);
        self.store.remove_pending_for_session(&key);

        // Sessions that predate us were configured by someone else and
        // must survive our release.
        let owned = self
            .store
            .bfd_session(&key)
            .is_some_and(|s| s.static_route_owned);
        if owned {
            info!(session = %key, "releasing bfd session");
            self.store.remove_bfd_session(&key);
            self.retract_bfd_request(&key);
        }
    }

    /// Handles a BFD state table SET event.
    ///
    /// Reports for sessions we do not track and malformed keys are logged
    /// and ignored; a missing state field counts as down.
    pub fn handle_bfd_state_event(&mut self, raw_key: &str, fvs: &[FieldValue]) {
        let key = match BfdSessionKey::parse_state_key(raw_key) {
            Ok(key) => key,
            Err(e) => {
                warn!(key = raw_key, error = %e, "dropping malformed bfd state report");
                return;
            }
        };

        let state = BfdState::from_report(fvs.get_field_or(bfd_fields::STATE, ""));
        let Some(session) = self.store.bfd_session_mut(&key) else {
            debug!(session = %key, "state report for untracked session, ignoring");
            return;
        };
        session.state = Some(state);
        debug!(session = %key, up = state.is_up(), "bfd state report");

        if state.is_up() {
            self.session_up(&key);
        } else {
            self.session_down(&key, false);
        }
    }

    /// Handles a BFD state table DEL event.
    ///
    /// A deleted state row means the session is gone from the dataplane,
    /// so the nexthop becomes unreachable even for routes in hold.
    pub fn handle_bfd_state_delete(&mut self, raw_key: &str) {
        let key = match BfdSessionKey::parse_state_key(raw_key) {
            Ok(key) => key,
            Err(e) => {
                warn!(key = raw_key, error = %e, "dropping malformed bfd state delete");
                return;
            }
        };

        let Some(session) = self.store.bfd_session_mut(&key) else {
            return;
        };
        session.state = None;
        self.session_down(&key, true);
    }

    /// Marks the session's nexthop reachable for every referencing route.
    ///
    /// The first UP also ends the route's nexthop hold, after which the
    /// published row is filtered to reachable nexthops only.
    fn session_up(&mut self, key: &BfdSessionKey) {
        let nexthop = key.nexthop();
        for route in self.store.routes_using(&nexthop) {
            let added = self.store.add_reachable(route.clone(), nexthop.clone());

            let mut hold_ended = false;
            if let Some(cfg) = self.store.route_config_mut(&route) {
                if cfg.bfd_nh_hold {
                    cfg.bfd_nh_hold = false;
                    hold_ended = true;
                    info!(route = %route, "first nexthop up, leaving hold");
                }
            }

            if added || hold_ended {
                self.refresh_publication(&route);
            }
        }
    }

    /// Marks the session's nexthop unreachable for every referencing route.
    ///
    /// While a route is in hold a DOWN report keeps the unfiltered row in
    /// place (the session may simply not have converged yet); a state row
    /// deletion overrides the hold.
    fn session_down(&mut self, key: &BfdSessionKey, ignore_hold: bool) {
        let nexthop = key.nexthop();
        for route in self.store.routes_using(&nexthop) {
            if !ignore_hold {
                let in_hold = self
                    .store
                    .route_config(&route)
                    .is_some_and(|cfg| cfg.bfd_nh_hold);
                if in_hold {
                    debug!(route = %route, session = %key, "session down during hold, keeping route");
                    continue;
                }
            }

            if self.store.remove_reachable(&route, &nexthop) {
                self.refresh_publication(&route);
            }
        }
    }

    /// Registers a pre-existing session row found during startup.
    ///
    /// Such sessions start unowned; route replay claims the ones static
    /// routes still need and [`sweep_unowned_sessions`] forgets the rest.
    ///
    /// [`sweep_unowned_sessions`]: Self::sweep_unowned_sessions
    pub fn seed_existing_session(&mut self, raw_key: &str) -> RouteBfdResult<()> {
        let key = BfdSessionKey::parse_output_key(raw_key)?;
        if self.store.bfd_session(&key).is_none() {
            debug!(session = %key, "found pre-existing bfd session");
            self.store.insert_bfd_session(key, BfdSessionInfo::discovered());
        }
        Ok(())
    }

    /// Forgets seeded sessions no static route claimed during replay.
    ///
    /// Only local tracking is dropped; the session rows themselves belong
    /// to whoever configured them and are left untouched.
    pub fn sweep_unowned_sessions(&mut self) {
        for key in self.store.unowned_bfd_sessions() {
            debug!(session = %key, "dropping unclaimed pre-existing session from tracking");
            self.store.remove_bfd_session(&key);
        }
    }
}
