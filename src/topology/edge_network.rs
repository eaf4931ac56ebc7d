//! Simulated on-premises edge: a public address and a small public network

use super::{carve_subnets, require_prefix};
use resgraph::{Declaration, ResourceKind, ResourceNode, Result, Topology};

/// Output of the address node holding its allocation id
pub const ALLOCATION_ID_OUTPUT: &str = "allocationId";

#[derive(Debug, Clone)]
pub struct EdgeNetworkProps {
    pub prefix: String,
    pub cidr: String,
    pub cidr_mask: u8,
}

impl EdgeNetworkProps {
    /// Id of the address node; its provider id is the public IP
    pub fn address_id(&self) -> String {
        format!("{}-EIP", self.prefix)
    }
}

impl Topology for EdgeNetworkProps {
    fn name(&self) -> String {
        format!("{} edge network", self.prefix)
    }

    fn declare(&self) -> Result<Declaration> {
        require_prefix("EdgeNetwork", &self.prefix)?;
        let p = &self.prefix;
        let vpc_id = format!("{p}-VPC");
        let subnets = carve_subnets(&vpc_id, &self.cidr, self.cidr_mask, 1)?;

        let mut decl = Declaration::new();
        let eip = decl.add(
            ResourceNode::new(self.address_id(), ResourceKind::ElasticAddress)
                .attr("domain", "vpc"),
        )?;
        let vpc = decl.add(
            ResourceNode::new(&vpc_id, ResourceKind::Vpc)
                .attr("cidrBlock", self.cidr.as_str())
                .name_tag(&vpc_id),
        )?;
        for (i, block) in subnets.iter().enumerate() {
            let id = format!("{vpc_id}-PublicSubnet{}", i + 1);
            decl.add(
                ResourceNode::new(&id, ResourceKind::Subnet)
                    .attr("vpcId", vpc.id_ref())
                    .attr("cidrBlock", block.to_string())
                    .attr("mapPublicIpOnLaunch", true)
                    .name_tag(format!("{p}-VPC | Public")),
            )?;
        }

        decl.export("eipAllocationId", "EIP allocation ID", &eip, ALLOCATION_ID_OUTPUT)?;
        Ok(decl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_network_nodes() {
        let props = EdgeNetworkProps {
            prefix: "OnPrem".into(),
            cidr: "172.16.0.0/16".into(),
            cidr_mask: 24,
        };
        let decl = props.declare().unwrap();
        let ids: Vec<_> = decl.nodes().iter().map(ResourceNode::id).collect();
        assert_eq!(ids, vec!["OnPrem-EIP", "OnPrem-VPC", "OnPrem-VPC-PublicSubnet1"]);
        assert_eq!(
            decl.node("OnPrem-VPC-PublicSubnet1")
                .and_then(|n| n.attribute("cidrBlock"))
                .and_then(|v| v.as_str()),
            Some("172.16.0.0/24")
        );
        assert_eq!(decl.exports()[0].output, ALLOCATION_ID_OUTPUT);

        let sealed = decl.seal().unwrap();
        assert_eq!(sealed.inferred.len(), 1);
    }

    #[test]
    fn test_edge_network_rejects_bad_cidr() {
        let props = EdgeNetworkProps {
            prefix: "OnPrem".into(),
            cidr: "172.16.0.0".into(),
            cidr_mask: 24,
        };
        assert!(props.declare().is_err());
    }
}
