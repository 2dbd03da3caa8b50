//! IP address and prefix types with safe parsing.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// Address family selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Family {
    Ipv4,
    Ipv6,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Family::Ipv4 => write!(f, "IPv4"),
            Family::Ipv6 => write!(f, "IPv6"),
        }
    }
}

/// An IPv4 or IPv6 address.
///
/// Parsing goes through [`std::net::IpAddr`], so textual input is validated
/// and re-rendered in canonical form. For IPv6 this means lowercase hex and
/// zero compression, which makes the `Display` output safe to use as a map or
/// table key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IpAddress(IpAddr);

impl IpAddress {
    pub const fn new(addr: IpAddr) -> Self {
        IpAddress(addr)
    }

    pub const fn inner(&self) -> IpAddr {
        self.0
    }

    /// Returns the address family.
    pub const fn family(&self) -> Family {
        match self.0 {
            IpAddr::V4(_) => Family::Ipv4,
            IpAddr::V6(_) => Family::Ipv6,
        }
    }

    /// Returns true if this is an IPv4 address.
    pub const fn is_ipv4(&self) -> bool {
        matches!(self.0, IpAddr::V4(_))
    }

    /// Returns true if this is an IPv6 address.
    pub const fn is_ipv6(&self) -> bool {
        matches!(self.0, IpAddr::V6(_))
    }

    /// Returns true if this is the all-zero address of its family.
    pub fn is_zero(&self) -> bool {
        self.0.is_unspecified()
    }
}

impl fmt::Display for IpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for IpAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<IpAddr>()
            .map(IpAddress)
            .map_err(|_| ParseError::InvalidIpAddress(s.to_string()))
    }
}

impl From<IpAddr> for IpAddress {
    fn from(addr: IpAddr) -> Self {
        IpAddress(addr)
    }
}

impl From<IpAddress> for IpAddr {
    fn from(addr: IpAddress) -> Self {
        addr.0
    }
}

/// An IP prefix in CIDR notation (e.g., 10.0.0.0/24 or 2001:db8::/32).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IpPrefix {
    address: IpAddress,
    prefix_len: u8,
}

impl IpPrefix {
    /// Creates a new IP prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix length is invalid for the address
    /// family (>32 for IPv4, >128 for IPv6).
    pub fn new(address: IpAddress, prefix_len: u8) -> Result<Self, ParseError> {
        let max_len = match address.family() {
            Family::Ipv4 => 32,
            Family::Ipv6 => 128,
        };

        if prefix_len > max_len {
            return Err(ParseError::InvalidIpPrefix(format!(
                "prefix length {} exceeds maximum {} for {}",
                prefix_len,
                max_len,
                address.family()
            )));
        }

        Ok(IpPrefix {
            address,
            prefix_len,
        })
    }

    /// Returns the network address of this prefix.
    pub const fn address(&self) -> &IpAddress {
        &self.address
    }

    /// Returns the prefix length in bits.
    pub const fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Returns the address family.
    pub const fn family(&self) -> Family {
        self.address.family()
    }
}

impl fmt::Display for IpPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

impl FromStr for IpPrefix {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr_str, len_str) = s
            .rsplit_once('/')
            .ok_or_else(|| ParseError::InvalidIpPrefix(s.to_string()))?;

        let address: IpAddress = addr_str
            .parse()
            .map_err(|_| ParseError::InvalidIpPrefix(s.to_string()))?;
        let prefix_len: u8 = len_str
            .parse()
            .map_err(|_| ParseError::InvalidIpPrefix(s.to_string()))?;

        IpPrefix::new(address, prefix_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_family_discrimination() {
        let v4: IpAddress = "10.0.0.1".parse().unwrap();
        assert_eq!(v4.family(), Family::Ipv4);
        assert!(v4.is_ipv4());
        assert!(!v4.is_ipv6());

        let v6: IpAddress = "2001:db8::1".parse().unwrap();
        assert_eq!(v6.family(), Family::Ipv6);
        assert!(v6.is_ipv6());
    }

    #[test]
    fn test_ipv6_canonical_display() {
        // Uppercase and redundant zeros collapse to one canonical rendering.
        let a: IpAddress = "2000::0001".parse().unwrap();
        let b: IpAddress = "2000::1".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "2000::1");

        let upper: IpAddress = "2001:DB8::AB".parse().unwrap();
        assert_eq!(upper.to_string(), "2001:db8::ab");
    }

    #[test]
    fn test_is_zero() {
        assert!("0.0.0.0".parse::<IpAddress>().unwrap().is_zero());
        assert!("::".parse::<IpAddress>().unwrap().is_zero());
        assert!(!"10.0.0.1".parse::<IpAddress>().unwrap().is_zero());
    }

    #[test]
    fn test_invalid_address() {
        assert!("10.0.0.300".parse::<IpAddress>().is_err());
        assert!("not-an-ip".parse::<IpAddress>().is_err());
    }

    #[test]
    fn test_prefix_parse() {
        let prefix: IpPrefix = "10.0.0.0/24".parse().unwrap();
        assert_eq!(prefix.family(), Family::Ipv4);
        assert_eq!(prefix.prefix_len(), 24);

        let v6_prefix: IpPrefix = "2001:db8::/32".parse().unwrap();
        assert_eq!(v6_prefix.family(), Family::Ipv6);
        assert_eq!(v6_prefix.to_string(), "2001:db8::/32");
    }

    #[test]
    fn test_invalid_prefix() {
        assert!("10.0.0.0".parse::<IpPrefix>().is_err());
        assert!("10.0.0.0/33".parse::<IpPrefix>().is_err());
        assert!("2001:db8::/129".parse::<IpPrefix>().is_err());
        assert!("10.0.0.0/x".parse::<IpPrefix>().is_err());
    }
}
