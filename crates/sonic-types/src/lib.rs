//! Common SONiC types for route and BFD orchestration.
//!
//! This crate provides type-safe representations of the network primitives
//! used by the static-route/BFD control plane:
//!
//! - [`IpAddress`]: an IPv4 or IPv6 address with family discrimination
//! - [`IpPrefix`]: an IP network prefix (CIDR notation)
//! - [`Family`]: address family selector

mod ip;

pub use ip::{Family, IpAddress, IpPrefix};

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("invalid IP prefix format: {0}")]
    InvalidIpPrefix(String),
}
