//! Output table publication
//!
//! All writes to the effective route table and the BFD session request
//! table go through here, so row layout lives in one place.

use sonic_orch_common::FieldValue;
use tracing::debug;

use crate::route_mgr::StaticRouteBfdMgr;
use crate::tables::{bfd_fields, defaults, route_fields};
use crate::types::{BfdSessionInfo, BfdSessionKey, Nexthop, RouteKey, StaticRouteConfig};

impl StaticRouteBfdMgr {
    /// Publishes the route with all configured nexthops, ignoring
    /// reachability. Used while the route is in nexthop hold.
    pub(crate) fn publish_route_unfiltered(&mut self, key: &RouteKey, cfg: &StaticRouteConfig) {
        let selected: Vec<&Nexthop> = cfg.nexthops.iter().collect();
        self.route_table
            .set(key.to_output_key(), build_route_row(cfg, &selected));
    }

    /// Removes the route's published row, if any.
    pub(crate) fn retract_route(&mut self, key: &RouteKey) {
        self.route_table.del(&key.to_output_key());
    }

    /// Re-publishes the route filtered to its reachable nexthops.
    ///
    /// With nothing reachable the row is withdrawn entirely rather than
    /// published empty, except while the route is in hold (the unfiltered
    /// hold row stays in place until the first session comes up).
    pub(crate) fn refresh_publication(&mut self, key: &RouteKey) {
        let Some(cfg) = self.store.route_config(key) else {
            return;
        };

        let selected: Vec<&Nexthop> = cfg
            .nexthops
            .iter()
            .filter(|nh| self.store.is_reachable(key, &nh.key()))
            .collect();

        if selected.is_empty() {
            if cfg.bfd_nh_hold {
                return;
            }
            debug!(route = %key, "no reachable nexthops, withdrawing route");
            self.route_table.del(&key.to_output_key());
            return;
        }

        let row = build_route_row(cfg, &selected);
        self.route_table.set(key.to_output_key(), row);
    }

    /// Writes a BFD session request row for a session we own.
    pub(crate) fn publish_bfd_request(&self, key: &BfdSessionKey, info: &BfdSessionInfo) {
        let mut row: Vec<FieldValue> = Vec::new();
        if let Some(local) = info.local_addr {
            row.push((bfd_fields::LOCAL_ADDR.to_string(), local.to_string()));
        }
        match &info.params {
            Some(params) => {
                row.push((
                    bfd_fields::MULTIHOP.to_string(),
                    params.multihop.to_string(),
                ));
                row.push((
                    bfd_fields::RX_INTERVAL.to_string(),
                    params.rx_interval.to_string(),
                ));
                row.push((
                    bfd_fields::TX_INTERVAL.to_string(),
                    params.tx_interval.to_string(),
                ));
                row.push((
                    bfd_fields::MULTIPLIER.to_string(),
                    params.multiplier.to_string(),
                ));
            }
            None => {
                row.push((
                    bfd_fields::MULTIHOP.to_string(),
                    defaults::BFD_MULTIHOP.to_string(),
                ));
                row.push((
                    bfd_fields::RX_INTERVAL.to_string(),
                    defaults::BFD_RX_INTERVAL.to_string(),
                ));
                row.push((
                    bfd_fields::TX_INTERVAL.to_string(),
                    defaults::BFD_TX_INTERVAL.to_string(),
                ));
            }
        }
        self.bfd_table.set(key.to_output_key(), row);
    }

    /// Removes a BFD session request row.
    pub(crate) fn retract_bfd_request(&self, key: &BfdSessionKey) {
        self.bfd_table.del(&key.to_output_key());
    }
}

/// Builds the effective route row from the selected nexthops.
///
/// The published row always carries `bfd=false` so the consumer does not
/// try to gate the route a second time, and `expiry=false` to pin it.
fn build_route_row(cfg: &StaticRouteConfig, selected: &[&Nexthop]) -> Vec<FieldValue> {
    let join = |pick: fn(&Nexthop) -> String| -> String {
        selected.iter().map(|nh| pick(nh)).collect::<Vec<_>>().join(",")
    };

    let mut row: Vec<FieldValue> = vec![
        (
            route_fields::NEXTHOP.to_string(),
            join(|nh| nh.ip.to_string()),
        ),
        (route_fields::IFNAME.to_string(), join(|nh| nh.ifname.clone())),
        (
            route_fields::DISTANCE.to_string(),
            join(|nh| nh.distance.clone()),
        ),
        (
            route_fields::NEXTHOP_VRF.to_string(),
            join(|nh| nh.vrf.clone()),
        ),
        (route_fields::BFD.to_string(), "false".to_string()),
        (
            route_fields::BFD_NH_HOLD.to_string(),
            cfg.bfd_nh_hold.to_string(),
        ),
        (route_fields::EXPIRY.to_string(), "false".to_string()),
    ];
    if let Some(advertise) = &cfg.advertise {
        row.push((route_fields::ADVERTISE.to_string(), advertise.clone()));
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::{APP_STATIC_ROUTE_TABLE, CFG_BFD_SESSION_TABLE};
    use crate::types::BfdSessionParams;
    use pretty_assertions::assert_eq;
    use sonic_orch_common::{Database, FieldValuesExt, Operation};

    fn fvs(pairs: &[(&str, &str)]) -> Vec<FieldValue> {
        pairs
            .iter()
            .map(|(f, v)| (f.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_route_row_layout() {
        let db = Database::new();
        let mut mgr = StaticRouteBfdMgr::new(&db, None);
        mgr.handle_intf_event("Ethernet0|10.0.0.100/24", Operation::Set)
            .unwrap();

        mgr.set_route(
            "Vrf_red|192.168.0.0/24",
            &fvs(&[
                ("nexthop", "10.0.0.1"),
                ("ifname", "Ethernet0"),
                ("distance", "10"),
                ("bfd", "true"),
                ("advertise", "true"),
            ]),
        )
        .unwrap();
        mgr.handle_bfd_state_event("Vrf_red|default|10.0.0.1", &fvs(&[("state", "Up")]));

        let rows = db.table(APP_STATIC_ROUTE_TABLE).snapshot();
        assert_eq!(rows.len(), 1);
        let (key, row) = &rows[0];
        assert_eq!(key, "Vrf_red:192.168.0.0/24");
        assert_eq!(row.get_field("nexthop"), Some("10.0.0.1"));
        assert_eq!(row.get_field("ifname"), Some("Ethernet0"));
        assert_eq!(row.get_field("distance"), Some("10"));
        assert_eq!(row.get_field("nexthop-vrf"), Some("Vrf_red"));
        assert_eq!(row.get_field("bfd"), Some("false"));
        assert_eq!(row.get_field("bfd_nh_hold"), Some("false"));
        assert_eq!(row.get_field("expiry"), Some("false"));
        assert_eq!(row.get_field("advertise"), Some("true"));
    }

    #[test]
    fn test_bfd_request_defaults() {
        let db = Database::new();
        let mut mgr = StaticRouteBfdMgr::new(&db, None);
        mgr.handle_intf_event("Ethernet0|10.0.0.100/24", Operation::Set)
            .unwrap();

        mgr.set_route(
            "192.168.0.0/24",
            &fvs(&[("nexthop", "10.0.0.1"), ("ifname", "Ethernet0"), ("bfd", "true")]),
        )
        .unwrap();

        let rows = db.table(CFG_BFD_SESSION_TABLE).snapshot();
        assert_eq!(rows.len(), 1);
        let (key, row) = &rows[0];
        assert_eq!(key, "default:default:10.0.0.1");
        assert_eq!(row.get_field("local_addr"), Some("10.0.0.100"));
        assert_eq!(row.get_field("multihop"), Some("false"));
        assert_eq!(row.get_field("rx_interval"), Some("50"));
        assert_eq!(row.get_field("tx_interval"), Some("50"));
        assert_eq!(row.get_field("multiplier"), None);
    }

    #[test]
    fn test_bfd_request_with_param_overrides() {
        let db = Database::new();
        let params = BfdSessionParams {
            multihop: true,
            rx_interval: 200,
            tx_interval: 300,
            multiplier: 5,
        };
        let mut mgr = StaticRouteBfdMgr::new(&db, Some(params));
        mgr.handle_intf_event("Ethernet0|10.0.0.100/24", Operation::Set)
            .unwrap();

        mgr.set_route(
            "192.168.0.0/24",
            &fvs(&[("nexthop", "10.0.0.1"), ("ifname", "Ethernet0"), ("bfd", "true")]),
        )
        .unwrap();

        let rows = db.table(CFG_BFD_SESSION_TABLE).snapshot();
        let row = &rows[0].1;
        assert_eq!(row.get_field("multihop"), Some("true"));
        assert_eq!(row.get_field("rx_interval"), Some("200"));
        assert_eq!(row.get_field("tx_interval"), Some("300"));
        assert_eq!(row.get_field("multiplier"), Some("5"));
    }

    #[test]
    fn test_ipv6_route_publishes_canonical_addresses() {
        let db = Database::new();
        let mut mgr = StaticRouteBfdMgr::new(&db, None);
        mgr.handle_intf_event("Ethernet0|2000:31::100/64", Operation::Set)
            .unwrap();

        mgr.set_route(
            "2000:32::/64",
            &fvs(&[
                ("nexthop", "2000:31:0:0::0001"),
                ("ifname", "Ethernet0"),
                ("bfd", "true"),
            ]),
        )
        .unwrap();
        mgr.handle_bfd_state_event("default|default|2000:31::1", &fvs(&[("state", "Up")]));

        let rows = db.table(APP_STATIC_ROUTE_TABLE).snapshot();
        assert_eq!(rows[0].0, "default:2000:32::/64");
        assert_eq!(rows[0].1.get_field("nexthop"), Some("2000:31::1"));

        let bfd_rows = db.table(CFG_BFD_SESSION_TABLE).snapshot();
        assert_eq!(bfd_rows[0].0, "default:default:2000:31::1");
    }
}
