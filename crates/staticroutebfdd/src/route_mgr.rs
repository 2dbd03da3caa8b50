//! Static Route BFD Manager - route reconciliation core
//!
//! The manager owns the local state store and the two output tables. The
//! route handlers here drive the BFD coordinator (`bfd.rs`), the interface
//! tracker (`intf.rs`), and the output publisher (`publish.rs`).

use std::collections::HashSet;

use itertools::izip;
use sonic_orch_common::{Database, FieldValue, FieldValuesExt, Table};
use tracing::{debug, info};

use crate::error::{RouteBfdError, RouteBfdResult};
use crate::state::LocalStateStore;
use crate::tables::{defaults, route_fields, APP_STATIC_ROUTE_TABLE, CFG_BFD_SESSION_TABLE};
use crate::types::{BfdSessionParams, Nexthop, NexthopKey, RouteKey, StaticRouteConfig};

/// Static Route BFD Manager
///
/// Keeps statically-configured routes consistent with BFD liveness: creates
/// BFD session requests for route nexthops, tracks reported session state,
/// and publishes each route filtered to its currently reachable nexthops.
pub struct StaticRouteBfdMgr {
    /// Derived and intermediate state
    pub(crate) store: LocalStateStore,

    /// Effective static route output table
    pub(crate) route_table: Table,

    /// BFD session request output table
    pub(crate) bfd_table: Table,

    /// Session parameter override bundle, if configured
    pub(crate) bfd_params: Option<BfdSessionParams>,
}

impl StaticRouteBfdMgr {
    /// Creates a manager publishing into the given database.
    pub fn new(db: &Database, bfd_params: Option<BfdSessionParams>) -> Self {
        info!("StaticRouteBfdMgr initialized");
        Self {
            store: LocalStateStore::new(),
            route_table: db.table(APP_STATIC_ROUTE_TABLE),
            bfd_table: db.table(CFG_BFD_SESSION_TABLE),
            bfd_params,
        }
    }

    /// Read access to the state store, mainly for tests and debugging.
    pub fn store(&self) -> &LocalStateStore {
        &self.store
    }

    /// Handles a STATIC_ROUTE SET event.
    pub fn set_route(&mut self, raw_key: &str, fvs: &[FieldValue]) -> RouteBfdResult<()> {
        if fvs.is_empty() {
            debug!(key = raw_key, "ignoring static route update with no fields");
            return Ok(());
        }

        let key = RouteKey::parse(raw_key)?;
        let mut cfg = parse_route_config(&key, fvs)?;
        let prev = self.store.route_config(&key).cloned();
        let new_gated = cfg.bfd_gated();

        if let Some(prev_cfg) = &prev {
            if prev_cfg.bfd_gated() && !new_gated {
                // BFD switched off: withdraw our filtered row and drop the
                // sessions; the non-BFD route manager owns the route now.
                info!(route = %key, "bfd disabled, withdrawing filtered route");
                self.release_route_nexthops(&key, prev_cfg);
                self.retract_route(&key);
                self.store.remove_reachable_all(&key);
                self.store.set_route_config(key, cfg);
                return Ok(());
            }

            if !prev_cfg.bfd_gated() && new_gated {
                // BFD newly enabled on a live route: keep it programmed
                // unfiltered until the first session converges.
                info!(route = %key, "bfd enabled, entering nexthop hold");
                cfg.bfd_nh_hold = true;
                self.publish_route_unfiltered(&key, &cfg);
            } else if prev_cfg.bfd_gated() && new_gated {
                cfg.bfd_nh_hold = prev_cfg.bfd_nh_hold;
            }
        }

        if !new_gated {
            // Nothing to monitor; the route is handled by the external
            // non-BFD static route manager. Keep the config so a later
            // bfd=true update is recognized as a transition.
            self.store.set_route_config(key, cfg);
            return Ok(());
        }

        // Drop sessions for nexthops the new config no longer carries,
        // before requesting anything new.
        let new_set: HashSet<NexthopKey> = cfg.nexthop_keys().into_iter().collect();
        if let Some(prev_cfg) = &prev {
            if prev_cfg.bfd_gated() {
                for nh in prev_cfg.nexthop_keys() {
                    if !new_set.contains(&nh) {
                        self.release_session(&nh, &key);
                        self.store.remove_reachable(&key, &nh);
                    }
                }
            }
        }

        for nh in &cfg.nexthops {
            if nh.ip.is_zero() {
                continue;
            }
            let nh_key = nh.key();
            if !self.store.has_nexthop_ref(&nh_key, &key) {
                self.request_session(&nh.vrf, &nh.ifname, nh.ip);
            }
            self.store.add_nexthop_ref(nh_key, key.clone());
        }

        self.store.set_route_config(key.clone(), cfg);
        self.refresh_publication(&key);
        Ok(())
    }

    /// Handles a STATIC_ROUTE DEL event.
    pub fn del_route(&mut self, raw_key: &str) -> RouteBfdResult<()> {
        let key = RouteKey::parse(raw_key)?;
        let Some(cfg) = self.store.route_config(&key).cloned() else {
            debug!(route = %key, "delete for untracked route, ignoring");
            return Ok(());
        };

        if cfg.bfd_gated() {
            self.release_route_nexthops(&key, &cfg);
        }
        self.retract_route(&key);
        self.store.remove_reachable_all(&key);
        self.store.remove_route_config(&key);
        info!(route = %key, "static route removed");
        Ok(())
    }

    fn release_route_nexthops(&mut self, key: &RouteKey, cfg: &StaticRouteConfig) {
        for nh in cfg.nexthop_keys() {
            self.release_session(&nh, key);
        }
    }
}

/// Parses and normalizes the STATIC_ROUTE field-values into a config.
///
/// The nexthop/ifname/distance/nexthop-vrf fields are comma-joined parallel
/// lists; lists that are present must all have the nexthop list's length.
/// Absent distance entries default to 0, absent or empty nexthop-vrf entries
/// default to the route's own vrf.
pub(crate) fn parse_route_config(
    key: &RouteKey,
    fvs: &[FieldValue],
) -> RouteBfdResult<StaticRouteConfig> {
    let nexthop_ips = split_list(fvs.get_field_or(route_fields::NEXTHOP, ""));
    let count = nexthop_ips.len();

    let ifnames = expand_list(fvs.get_field(route_fields::IFNAME), count, "", || {
        String::new()
    })
    .ok_or_else(|| length_mismatch(route_fields::IFNAME, count))?;
    let distances = expand_list(fvs.get_field(route_fields::DISTANCE), count, "", || {
        defaults::ROUTE_DISTANCE.to_string()
    })
    .ok_or_else(|| length_mismatch(route_fields::DISTANCE, count))?;
    let nh_vrfs = expand_list(fvs.get_field(route_fields::NEXTHOP_VRF), count, &key.vrf, || {
        key.vrf.clone()
    })
    .ok_or_else(|| length_mismatch(route_fields::NEXTHOP_VRF, count))?;

    let mut nexthops = Vec::with_capacity(count);
    for (ip_str, ifname, vrf, distance) in izip!(nexthop_ips, ifnames, nh_vrfs, distances) {
        let ip = ip_str
            .parse()
            .map_err(|e| RouteBfdError::invalid_config(route_fields::NEXTHOP, format!("{}", e)))?;
        nexthops.push(Nexthop {
            ip,
            ifname,
            vrf,
            distance,
        });
    }

    Ok(StaticRouteConfig {
        nexthops,
        blackhole: parse_bool(fvs.get_field_or(route_fields::BLACKHOLE, "false")),
        bfd: parse_bool(fvs.get_field_or(route_fields::BFD, "false")),
        bfd_nh_hold: false,
        advertise: fvs.get_field(route_fields::ADVERTISE).map(str::to_string),
    })
}

fn parse_bool(s: &str) -> bool {
    s.eq_ignore_ascii_case("true")
}

fn split_list(s: &str) -> Vec<String> {
    if s.is_empty() {
        return vec![];
    }
    s.split(',').map(|part| part.trim().to_string()).collect()
}

/// Splits a parallel-list field and pads it out to `count` members.
///
/// An absent field yields `count` defaults; a present field must already
/// have `count` members (None on mismatch), with empty members replaced by
/// `empty_default`.
fn expand_list(
    field: Option<&str>,
    count: usize,
    empty_default: &str,
    default: impl Fn() -> String,
) -> Option<Vec<String>> {
    match field {
        None => Some((0..count).map(|_| default()).collect()),
        Some(raw) => {
            let mut list = split_list(raw);
            if list.is_empty() {
                return Some((0..count).map(|_| default()).collect());
            }
            if list.len() != count {
                return None;
            }
            for member in &mut list {
                if member.is_empty() {
                    *member = empty_default.to_string();
                }
            }
            Some(list)
        }
    }
}

fn length_mismatch(field: &str, expected: usize) -> RouteBfdError {
    RouteBfdError::invalid_config(
        field,
        format!("list length does not match {} nexthop(s)", expected),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fvs(pairs: &[(&str, &str)]) -> Vec<FieldValue> {
        pairs
            .iter()
            .map(|(f, v)| (f.to_string(), v.to_string()))
            .collect()
    }

    fn key(raw: &str) -> RouteKey {
        RouteKey::parse(raw).unwrap()
    }

    #[test]
    fn test_parse_route_config_defaults() {
        let cfg = parse_route_config(
            &key("Vrf_red|10.0.0.0/24"),
            &fvs(&[("nexthop", "10.0.0.1,10.0.0.2"), ("ifname", "Ethernet0,Ethernet4")]),
        )
        .unwrap();

        assert_eq!(cfg.nexthops.len(), 2);
        assert_eq!(cfg.nexthops[0].vrf, "Vrf_red");
        assert_eq!(cfg.nexthops[0].distance, "0");
        assert_eq!(cfg.nexthops[1].ifname, "Ethernet4");
        assert!(!cfg.bfd);
        assert!(!cfg.blackhole);
    }

    #[test]
    fn test_parse_route_config_empty_nexthop_vrf_members() {
        let cfg = parse_route_config(
            &key("10.0.0.0/24"),
            &fvs(&[
                ("nexthop", "10.0.0.1,20.0.0.1"),
                ("ifname", "Ethernet0,Ethernet4"),
                ("nexthop-vrf", ",Vrf_blue"),
            ]),
        )
        .unwrap();

        assert_eq!(cfg.nexthops[0].vrf, "default");
        assert_eq!(cfg.nexthops[1].vrf, "Vrf_blue");
    }

    #[test]
    fn test_parse_route_config_length_mismatch() {
        let err = parse_route_config(
            &key("10.0.0.0/24"),
            &fvs(&[("nexthop", "10.0.0.1,10.0.0.2"), ("ifname", "Ethernet0")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("ifname"));

        let err = parse_route_config(
            &key("10.0.0.0/24"),
            &fvs(&[("nexthop", "10.0.0.1"), ("distance", "10,20")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("distance"));
    }

    #[test]
    fn test_parse_route_config_bad_nexthop_ip() {
        let err = parse_route_config(
            &key("10.0.0.0/24"),
            &fvs(&[("nexthop", "10.0.0.999"), ("ifname", "Ethernet0")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("nexthop"));
    }

    #[test]
    fn test_parse_route_config_normalizes_ipv6() {
        let cfg = parse_route_config(
            &key("2000:31::/64"),
            &fvs(&[("nexthop", "2000:31:0:0::0001"), ("ifname", "Ethernet0"), ("bfd", "true")]),
        )
        .unwrap();
        assert_eq!(cfg.nexthops[0].ip.to_string(), "2000:31::1");
    }

    #[test]
    fn test_non_bfd_route_persists_without_output() {
        let db = Database::new();
        let mut mgr = StaticRouteBfdMgr::new(&db, None);

        mgr.set_route(
            "10.0.0.0/24",
            &fvs(&[("nexthop", "10.0.0.1"), ("ifname", "Ethernet0")]),
        )
        .unwrap();

        assert!(mgr.store().route_config(&key("10.0.0.0/24")).is_some());
        // Non-BFD routes are the external route manager's job.
        assert!(db.table(APP_STATIC_ROUTE_TABLE).snapshot().is_empty());
        assert!(db.table(CFG_BFD_SESSION_TABLE).snapshot().is_empty());
    }

    #[test]
    fn test_blackhole_route_never_gated() {
        let db = Database::new();
        let mut mgr = StaticRouteBfdMgr::new(&db, None);

        mgr.set_route("10.0.0.0/24", &fvs(&[("blackhole", "true"), ("bfd", "true")]))
            .unwrap();

        assert!(db.table(CFG_BFD_SESSION_TABLE).snapshot().is_empty());
        let cfg = mgr.store().route_config(&key("10.0.0.0/24")).unwrap();
        assert!(!cfg.bfd_gated());
    }

    #[test]
    fn test_nexthop_diff_releases_before_requesting() {
        let db = Database::new();
        let mut mgr = StaticRouteBfdMgr::new(&db, None);
        let bfd_table = db.table(CFG_BFD_SESSION_TABLE);

        // Address both egress interfaces so sessions materialize directly.
        mgr.handle_intf_event("Ethernet0|10.0.0.100/24", sonic_orch_common::Operation::Set)
            .unwrap();
        mgr.handle_intf_event("Ethernet4|10.0.1.100/24", sonic_orch_common::Operation::Set)
            .unwrap();

        mgr.set_route(
            "192.168.0.0/24",
            &fvs(&[
                ("nexthop", "10.0.0.1,10.0.0.2,10.0.1.1"),
                ("ifname", "Ethernet0,Ethernet0,Ethernet4"),
                ("bfd", "true"),
            ]),
        )
        .unwrap();
        assert_eq!(bfd_table.snapshot().len(), 3);

        // Shrink {A,B,C} -> {A,B}: C's session and reference must go.
        mgr.set_route(
            "192.168.0.0/24",
            &fvs(&[
                ("nexthop", "10.0.0.1,10.0.0.2"),
                ("ifname", "Ethernet0,Ethernet0"),
                ("bfd", "true"),
            ]),
        )
        .unwrap();

        let keys: Vec<String> = bfd_table.snapshot().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["default:default:10.0.0.1", "default:default:10.0.0.2"]);

        let gone = NexthopKey::new("default", "10.0.1.1".parse().unwrap());
        assert!(mgr.store().routes_using(&gone).is_empty());
    }

    #[test]
    fn test_set_route_is_idempotent() {
        let db = Database::new();
        let mut mgr = StaticRouteBfdMgr::new(&db, None);

        mgr.handle_intf_event("Ethernet0|10.0.0.100/24", sonic_orch_common::Operation::Set)
            .unwrap();

        let route = fvs(&[("nexthop", "10.0.0.1"), ("ifname", "Ethernet0"), ("bfd", "true")]);
        mgr.set_route("192.168.0.0/24", &route).unwrap();
        mgr.handle_bfd_state_event(
            "default|default|10.0.0.1",
            &fvs(&[("state", "Up")]),
        );

        let route_rows = db.table(APP_STATIC_ROUTE_TABLE).snapshot();
        let bfd_rows = db.table(CFG_BFD_SESSION_TABLE).snapshot();

        // Replaying the identical SET must not change any published output.
        mgr.set_route("192.168.0.0/24", &route).unwrap();
        assert_eq!(db.table(APP_STATIC_ROUTE_TABLE).snapshot(), route_rows);
        assert_eq!(db.table(CFG_BFD_SESSION_TABLE).snapshot(), bfd_rows);
    }

    #[test]
    fn test_del_route_untracked_is_noop() {
        let db = Database::new();
        let mut mgr = StaticRouteBfdMgr::new(&db, None);
        mgr.del_route("10.9.9.0/24").unwrap();
    }

    #[test]
    fn test_bfd_disabled_withdraws_and_releases() {
        let db = Database::new();
        let mut mgr = StaticRouteBfdMgr::new(&db, None);

        mgr.handle_intf_event("Ethernet0|10.0.0.100/24", sonic_orch_common::Operation::Set)
            .unwrap();
        mgr.set_route(
            "192.168.0.0/24",
            &fvs(&[("nexthop", "10.0.0.1"), ("ifname", "Ethernet0"), ("bfd", "true")]),
        )
        .unwrap();
        mgr.handle_bfd_state_event("default|default|10.0.0.1", &fvs(&[("state", "Up")]));
        assert_eq!(db.table(APP_STATIC_ROUTE_TABLE).snapshot().len(), 1);

        mgr.set_route(
            "192.168.0.0/24",
            &fvs(&[("nexthop", "10.0.0.1"), ("ifname", "Ethernet0"), ("bfd", "false")]),
        )
        .unwrap();

        assert!(db.table(APP_STATIC_ROUTE_TABLE).snapshot().is_empty());
        assert!(db.table(CFG_BFD_SESSION_TABLE).snapshot().is_empty());
        // Config stays so a later bfd=true is seen as a transition.
        let cfg = mgr.store().route_config(&key("192.168.0.0/24")).unwrap();
        assert!(!cfg.bfd);
    }
}
