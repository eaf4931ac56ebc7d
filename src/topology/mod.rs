//! Topology builders
//!
//! Each builder turns typed props into a [`resgraph::Declaration`]. Builders
//! are pure: they never read the environment or talk to a backend, and the
//! same props always yield the same node ids. Values owned by another
//! topology arrive as props, either literal ids or references.

pub mod cidr;
pub mod edge_network;
pub mod gateway;
pub mod global_network;
pub mod hub_fabric;
pub mod isolated_network;

pub use cidr::Ipv4Cidr;
pub use edge_network::EdgeNetworkProps;
pub use gateway::GatewayProps;
pub use global_network::GlobalNetworkProps;
pub use hub_fabric::{FabricNetwork, HubFabricProps};
pub use isolated_network::IsolatedNetworkProps;

use resgraph::{Error, Result};

/// Anywhere, for ingress rules and default routes
pub const ANY_IPV4: &str = "0.0.0.0/0";

/// Private 16-bit ASN range
const PRIVATE_ASN_16: std::ops::RangeInclusive<u32> = 64512..=65534;
/// Private 32-bit ASN range
const PRIVATE_ASN_32: std::ops::RangeInclusive<u32> = 4_200_000_000..=4_294_967_294;

/// Whether an ASN may be used on the provider side of a hub
pub fn is_private_asn(asn: u32) -> bool {
    PRIVATE_ASN_16.contains(&asn) || PRIVATE_ASN_32.contains(&asn)
}

/// Parse a CIDR block, reporting failures against a node attribute
pub fn parse_cidr(node: &str, attribute: &str, value: &str) -> Result<Ipv4Cidr> {
    value
        .parse()
        .map_err(|e: cidr::CidrError| Error::invalid(node, attribute, e.to_string()))
}

/// Carve `count` consecutive subnets of length `mask` out of `cidr`
pub fn carve_subnets(node: &str, cidr: &str, mask: u8, count: u32) -> Result<Vec<Ipv4Cidr>> {
    let block = parse_cidr(node, "cidrBlock", cidr)?;
    if mask < block.prefix() || mask > cidr::MAX_SUBNET_PREFIX {
        return Err(Error::invalid(
            node,
            "cidrMask",
            format!(
                "/{mask} must lie between /{} and /{}",
                block.prefix(),
                cidr::MAX_SUBNET_PREFIX
            ),
        ));
    }
    (0..count)
        .map(|i| {
            block.subnet(mask, i).ok_or_else(|| {
                Error::invalid(
                    node,
                    "cidrBlock",
                    format!(
                        "{block} has room for {} /{mask} subnets, not {count}",
                        block.subnet_capacity(mask)
                    ),
                )
            })
        })
        .collect()
}

/// Reject an empty prefix, the root of every node id a builder derives
pub fn require_prefix(topology: &str, prefix: &str) -> Result<()> {
    if prefix.trim().is_empty() {
        return Err(Error::invalid(topology, "prefix", "must not be empty"));
    }
    Ok(())
}
