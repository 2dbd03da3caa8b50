//! Type definitions for staticroutebfdd
//!
//! Composite table keys are typed structs rather than concatenated strings,
//! so a malformed key is rejected once at the parsing boundary and never
//! reaches the state maps.

use serde::{Deserialize, Serialize};
use sonic_types::{IpAddress, IpPrefix};
use std::fmt;

use crate::error::{RouteBfdError, RouteBfdResult};
use crate::tables::{DEFAULT_INTF, DEFAULT_VRF};

/// Key of a static route: `(vrf, prefix)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteKey {
    pub vrf: String,
    pub prefix: IpPrefix,
}

impl RouteKey {
    pub fn new(vrf: impl Into<String>, prefix: IpPrefix) -> Self {
        Self {
            vrf: vrf.into(),
            prefix,
        }
    }

    /// Parses a STATIC_ROUTE key of the form `[vrf|]prefix`.
    ///
    /// A missing vrf part means the default VRF. The prefix is validated and
    /// canonicalized, so IPv6 spelling variants collapse to one key.
    pub fn parse(raw: &str) -> RouteBfdResult<Self> {
        let (vrf, prefix_str) = match raw.split_once('|') {
            Some((vrf, rest)) if !vrf.is_empty() => (vrf, rest),
            Some((_, rest)) => (DEFAULT_VRF, rest),
            None => (DEFAULT_VRF, raw),
        };

        let prefix: IpPrefix = prefix_str
            .parse()
            .map_err(|e| RouteBfdError::invalid_key(raw, format!("{}", e)))?;

        Ok(Self::new(vrf, prefix))
    }

    /// Returns the key used for the effective route output table.
    pub fn to_output_key(&self) -> String {
        format!("{}:{}", self.vrf, self.prefix)
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.vrf, self.prefix)
    }
}

/// Key of a nexthop reference set: `(nexthop-vrf, nexthop IP)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NexthopKey {
    pub vrf: String,
    pub ip: IpAddress,
}

impl NexthopKey {
    pub fn new(vrf: impl Into<String>, ip: IpAddress) -> Self {
        Self {
            vrf: vrf.into(),
            ip,
        }
    }
}

impl fmt::Display for NexthopKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.vrf, self.ip)
    }
}

/// Key of a BFD session: `(vrf, interface-or-"default", peer IP)`.
///
/// Sessions created for static routes are multihop and not interface-scoped,
/// so their interface slot is always the `default` placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BfdSessionKey {
    pub vrf: String,
    pub intf: String,
    pub peer: IpAddress,
}

impl BfdSessionKey {
    pub fn new(vrf: impl Into<String>, intf: impl Into<String>, peer: IpAddress) -> Self {
        Self {
            vrf: vrf.into(),
            intf: intf.into(),
            peer,
        }
    }

    /// Builds the key for a static-route session toward `peer` in `vrf`.
    pub fn for_static_route(vrf: impl Into<String>, peer: IpAddress) -> Self {
        Self::new(vrf, DEFAULT_INTF, peer)
    }

    /// Parses a STATE_DB BFD session key.
    ///
    /// Accepted forms: `vrf|interface|peer`, `interface|peer` (default vrf),
    /// and a bare `peer` (default vrf and interface).
    pub fn parse_state_key(raw: &str) -> RouteBfdResult<Self> {
        let parts: Vec<&str> = raw.split('|').collect();
        let (vrf, intf, peer_str) = match parts.as_slice() {
            [peer] => (DEFAULT_VRF, DEFAULT_INTF, *peer),
            [intf, peer] => (DEFAULT_VRF, *intf, *peer),
            [vrf, intf, peer] => (*vrf, *intf, *peer),
            _ => {
                return Err(RouteBfdError::invalid_key(raw, "too many '|' separators"));
            }
        };

        let peer: IpAddress = peer_str
            .parse()
            .map_err(|e| RouteBfdError::invalid_key(raw, format!("{}", e)))?;

        Ok(Self::new(vrf, intf, peer))
    }

    /// Parses a BFD session request table key (`vrf:interface:peer`).
    ///
    /// The peer may itself contain ':' (IPv6), so only the first two
    /// separators split fields.
    pub fn parse_output_key(raw: &str) -> RouteBfdResult<Self> {
        let mut parts = raw.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(vrf), Some(intf), Some(peer_str)) if !vrf.is_empty() && !intf.is_empty() => {
                let peer: IpAddress = peer_str
                    .parse()
                    .map_err(|e| RouteBfdError::invalid_key(raw, format!("{}", e)))?;
                Ok(Self::new(vrf, intf, peer))
            }
            _ => Err(RouteBfdError::invalid_key(raw, "expected vrf:interface:peer")),
        }
    }

    /// Returns the key used for the BFD session request output table.
    pub fn to_output_key(&self) -> String {
        format!("{}:{}:{}", self.vrf, self.intf, self.peer)
    }

    /// Returns the nexthop this session monitors.
    pub fn nexthop(&self) -> NexthopKey {
        NexthopKey::new(self.vrf.clone(), self.peer)
    }
}

impl fmt::Display for BfdSessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.vrf, self.intf, self.peer)
    }
}

/// Reported state of a BFD session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BfdState {
    Up,
    Down,
}

impl BfdState {
    /// Parses a reported state string; anything other than `Up` counts as
    /// down (Init and Admin_Down sessions are not usable for forwarding).
    pub fn from_report(s: &str) -> Self {
        if s.eq_ignore_ascii_case("up") {
            BfdState::Up
        } else {
            BfdState::Down
        }
    }

    pub fn is_up(&self) -> bool {
        matches!(self, BfdState::Up)
    }
}

/// One nexthop of a static route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nexthop {
    /// Nexthop IP address
    pub ip: IpAddress,
    /// Egress interface name (may be empty)
    pub ifname: String,
    /// VRF the nexthop is resolved in
    pub vrf: String,
    /// Administrative distance, kept as configured text
    pub distance: String,
}

impl Nexthop {
    /// Returns the `(vrf, ip)` reference key for this nexthop.
    pub fn key(&self) -> NexthopKey {
        NexthopKey::new(self.vrf.clone(), self.ip)
    }
}

/// Parsed and normalized static route configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticRouteConfig {
    /// Nexthops, one row per parallel-list index
    pub nexthops: Vec<Nexthop>,
    /// Blackhole flag
    pub blackhole: bool,
    /// BFD gating requested by configuration
    pub bfd: bool,
    /// Hold-down: keep the route published unfiltered until the first
    /// nexthop reports UP
    pub bfd_nh_hold: bool,
    /// Advertise flag, passed through unmodified
    pub advertise: Option<String>,
}

impl StaticRouteConfig {
    /// Returns true if this route is actually gated by BFD: the flag is set
    /// and there are real nexthops to monitor.
    pub fn bfd_gated(&self) -> bool {
        self.bfd && !self.blackhole && !self.nexthops.is_empty()
    }

    /// Returns the nexthop reference keys, skipping unspecified addresses.
    pub fn nexthop_keys(&self) -> Vec<NexthopKey> {
        self.nexthops
            .iter()
            .filter(|nh| !nh.ip.is_zero())
            .map(Nexthop::key)
            .collect()
    }
}

/// BFD protocol parameter override bundle.
///
/// When configured, all four parameters are published together on every
/// created session; otherwise the per-field defaults apply and no multiplier
/// is emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BfdSessionParams {
    pub multihop: bool,
    pub rx_interval: u32,
    pub tx_interval: u32,
    pub multiplier: u32,
}

/// Locally tracked BFD session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BfdSessionInfo {
    /// Local address the session was created with; absent for sessions
    /// discovered at startup rather than created here
    pub local_addr: Option<IpAddress>,
    /// Parameter override bundle the session was created with
    pub params: Option<BfdSessionParams>,
    /// Last reported state, if any
    pub state: Option<BfdState>,
    /// True if this session exists because a static route needs it
    pub static_route_owned: bool,
}

impl BfdSessionInfo {
    /// A session created by the static route reconciler.
    pub fn owned(local_addr: IpAddress, params: Option<BfdSessionParams>) -> Self {
        Self {
            local_addr: Some(local_addr),
            params,
            state: None,
            static_route_owned: true,
        }
    }

    /// A pre-existing session discovered during startup.
    pub fn discovered() -> Self {
        Self {
            local_addr: None,
            params: None,
            state: None,
            static_route_owned: false,
        }
    }
}
