//! IPv4 CIDR blocks and subnet carving

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use thiserror::Error;

/// Smallest subnet a VPC accepts
pub const MAX_SUBNET_PREFIX: u8 = 28;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CidrError {
    #[error("'{0}' is not in address/prefix form")]
    Malformed(String),

    #[error("invalid IPv4 address '{0}'")]
    Address(String),

    #[error("prefix length {0} is out of range")]
    Prefix(String),

    #[error("{0} has host bits set")]
    Unaligned(String),
}

/// An IPv4 network in CIDR notation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Cidr {
    network: Ipv4Addr,
    prefix: u8,
}

impl Ipv4Cidr {
    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Number of subnets of the given prefix length that fit in this block
    pub fn subnet_capacity(&self, prefix: u8) -> u64 {
        if prefix < self.prefix || prefix > 32 {
            0
        } else {
            1u64 << (prefix - self.prefix)
        }
    }

    /// The `index`-th subnet of the given prefix length, counting from the
    /// start of the block
    pub fn subnet(&self, prefix: u8, index: u32) -> Option<Self> {
        if u64::from(index) >= self.subnet_capacity(prefix) {
            return None;
        }
        let size = 1u64 << (32 - prefix);
        let base = u64::from(u32::from(self.network)) + u64::from(index) * size;
        let network = u32::try_from(base).ok()?;
        Some(Self {
            network: Ipv4Addr::from(network),
            prefix,
        })
    }
}

impl FromStr for Ipv4Cidr {
    type Err = CidrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, prefix) = s
            .split_once('/')
            .ok_or_else(|| CidrError::Malformed(s.to_string()))?;
        let network: Ipv4Addr = addr
            .parse()
            .map_err(|_| CidrError::Address(addr.to_string()))?;
        let prefix: u8 = prefix
            .parse()
            .ok()
            .filter(|p| *p <= 32)
            .ok_or_else(|| CidrError::Prefix(prefix.to_string()))?;

        let mask = if prefix == 0 {
            0
        } else {
            u32::MAX << (32 - prefix)
        };
        if u32::from(network) & !mask != 0 {
            return Err(CidrError::Unaligned(s.to_string()));
        }
        Ok(Self { network, prefix })
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let cidr: Ipv4Cidr = "10.1.0.0/16".parse().unwrap();
        assert_eq!(cidr.prefix(), 16);
        assert_eq!(cidr.to_string(), "10.1.0.0/16");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!("10.1.0.0".parse::<Ipv4Cidr>(), Err(CidrError::Malformed(_))));
        assert!(matches!("10.1.0/16".parse::<Ipv4Cidr>(), Err(CidrError::Address(_))));
        assert!(matches!("10.1.0.0/33".parse::<Ipv4Cidr>(), Err(CidrError::Prefix(_))));
        assert!(matches!("10.1.2.0/16".parse::<Ipv4Cidr>(), Err(CidrError::Unaligned(_))));
    }

    #[test]
    fn test_subnet_carving() {
        let cidr: Ipv4Cidr = "10.1.0.0/16".parse().unwrap();
        assert_eq!(cidr.subnet(24, 0).unwrap().to_string(), "10.1.0.0/24");
        assert_eq!(cidr.subnet(24, 2).unwrap().to_string(), "10.1.2.0/24");
        assert_eq!(cidr.subnet(24, 255).unwrap().to_string(), "10.1.255.0/24");
        assert!(cidr.subnet(24, 256).is_none());
        assert!(cidr.subnet(8, 0).is_none());
    }

    #[test]
    fn test_capacity() {
        let cidr: Ipv4Cidr = "172.16.0.0/22".parse().unwrap();
        assert_eq!(cidr.subnet_capacity(24), 4);
        assert_eq!(cidr.subnet_capacity(22), 1);
        assert_eq!(cidr.subnet_capacity(20), 0);
    }
}
