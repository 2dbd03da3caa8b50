//! Database table and field name constants for staticroutebfdd

// CONFIG_DB tables (subscribed)
/// Static route configuration table
pub const CFG_STATIC_ROUTE_TABLE: &str = "STATIC_ROUTE";

/// Interface address table
pub const CFG_INTF_TABLE: &str = "INTERFACE";

/// Loopback interface address table
pub const CFG_LOOPBACK_INTF_TABLE: &str = "LOOPBACK_INTERFACE";

/// PortChannel interface address table
pub const CFG_PORTCHANNEL_INTF_TABLE: &str = "PORTCHANNEL_INTERFACE";

// CONFIG_DB tables (written)
/// BFD session request table; the BFD implementation consumes these rows
pub const CFG_BFD_SESSION_TABLE: &str = "BFD_SESSION";

// STATE_DB tables
/// BFD session state table reported by the BFD implementation
pub const STATE_BFD_SESSION_TABLE: &str = "BFD_SESSION_TABLE";

// APPL_DB tables
/// Effective static route table consumed by the route programmer
pub const APP_STATIC_ROUTE_TABLE: &str = "STATIC_ROUTE_TABLE";

/// The implicit VRF and interface placeholder used in keys
pub const DEFAULT_VRF: &str = "default";
pub const DEFAULT_INTF: &str = "default";

/// STATIC_ROUTE and STATIC_ROUTE_TABLE field names
pub mod route_fields {
    pub const NEXTHOP: &str = "nexthop";
    pub const IFNAME: &str = "ifname";
    pub const DISTANCE: &str = "distance";
    pub const NEXTHOP_VRF: &str = "nexthop-vrf";
    pub const BLACKHOLE: &str = "blackhole";
    pub const BFD: &str = "bfd";
    pub const ADVERTISE: &str = "advertise";
    pub const BFD_NH_HOLD: &str = "bfd_nh_hold";
    pub const EXPIRY: &str = "expiry";
}

/// BFD_SESSION and BFD_SESSION_TABLE field names
pub mod bfd_fields {
    pub const LOCAL_ADDR: &str = "local_addr";
    pub const MULTIHOP: &str = "multihop";
    pub const RX_INTERVAL: &str = "rx_interval";
    pub const TX_INTERVAL: &str = "tx_interval";
    pub const MULTIPLIER: &str = "multiplier";
    pub const STATE: &str = "state";
}

/// Default values for BFD session requests and the event loop.
pub mod defaults {
    /// Default multihop flag for created sessions.
    pub const BFD_MULTIHOP: &str = "false";

    /// Default BFD receive interval in milliseconds.
    pub const BFD_RX_INTERVAL: &str = "50";

    /// Default BFD transmit interval in milliseconds.
    pub const BFD_TX_INTERVAL: &str = "50";

    /// Default select timeout in milliseconds.
    pub const SELECT_TIMEOUT_MS: u64 = 1000;

    /// Default distance for nexthops that do not specify one.
    pub const ROUTE_DISTANCE: &str = "0";
}
