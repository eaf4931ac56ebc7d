//! Stacks - the deployable units, each composed from topology builders
//!
//! A stack is applied on its own and hands identifiers to the next one only
//! through its exports: base network first, then hub routing (which needs
//! the hub, attachments and route tables of the base network plus the VPN
//! and peering attachments), and the global network once both regions have
//! a hub.

use crate::config::{
    self, DEVELOPMENT_VPC_ATTACHMENT_ID, DEVELOPMENT_VPC_ROUTE_TABLE_ID, EU_TGW_ARN,
    PEER_ATTACHMENT_ID, PRODUCTION_VPC_ATTACHMENT_ID, PRODUCTION_VPC_ROUTE_TABLE_ID,
    RegionParams, TGW_ID, US_TGW_ARN, VPN_ATTACHMENT_ID,
};
use crate::topology::{
    EdgeNetworkProps, FabricNetwork, GatewayProps, GlobalNetworkProps, HubFabricProps,
    IsolatedNetworkProps,
};
use clap::ValueEnum;
use resgraph::{
    AttributeValue, Declaration, Error, ID_OUTPUT, ResourceKind, ResourceNode, Result, Topology,
};
use std::fmt;

/// Lookup of identifiers owned by other stacks
pub type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum StackKind {
    /// Instance role, simulated on-premises edge, gateway and spoke networks
    BaseNetwork,
    /// Route tables and routes on the hub of an applied base network
    HubRouting,
    /// Global network registering the hubs of both regions
    GlobalNetwork,
}

impl StackKind {
    /// CLI name, also used for outputs files
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BaseNetwork => "base-network",
            Self::HubRouting => "hub-routing",
            Self::GlobalNetwork => "global-network",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::BaseNetwork => "Builds the base resources for the Transit Gateway Peering Demo",
            Self::HubRouting => {
                "Builds the transit gateway routing for the Network Segmentation Demo"
            }
            Self::GlobalNetwork => "Builds the global network for the Transit Gateway Peering Demo",
        }
    }

    /// Whether the stack reads the region parameter table
    pub fn needs_params(&self) -> bool {
        matches!(self, Self::BaseNetwork | Self::HubRouting)
    }

    /// Stack whose exports this stack consumes
    pub fn upstream(&self) -> Option<Self> {
        match self {
            Self::HubRouting => Some(Self::BaseNetwork),
            Self::BaseNetwork | Self::GlobalNetwork => None,
        }
    }
}

impl fmt::Display for StackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declare a stack
pub fn declare(
    kind: StackKind,
    params: Option<&RegionParams>,
    lookup: Lookup<'_>,
) -> Result<Declaration> {
    let require_params = || {
        params.ok_or_else(|| Error::invalid(kind.as_str(), "params", "no region parameters loaded"))
    };
    let decl = match kind {
        StackKind::BaseNetwork => base_network(require_params()?)?,
        StackKind::HubRouting => hub_routing(require_params()?, lookup)?,
        StackKind::GlobalNetwork => global_network(lookup)?,
    };
    log::debug!("declared {kind}: {} nodes, {} exports", decl.nodes().len(), decl.exports().len());
    Ok(decl)
}

/// Base network: instance role, on-premises edge, gateway, two spoke networks
pub fn base_network(params: &RegionParams) -> Result<Declaration> {
    let mut decl = Declaration::new();

    let role = decl.add(
        ResourceNode::new("svcRoleForEC2viaSSM", ResourceKind::InstanceRole)
            .attr("assumedBy", "ec2.amazonaws.com")
            .attr("description", "Service role for EC2 access via SSM session manager")
            .attr(
                "managedPolicies",
                vec!["AmazonSSMManagedInstanceCore", "AmazonSSMPatchAssociation"],
            ),
    )?;

    let edge = EdgeNetworkProps {
        prefix: "OnPrem".into(),
        cidr: params.on_prem_cidr.clone(),
        cidr_mask: params.cidr_mask,
    };
    let gateway = GatewayProps {
        prefix: "NetworkingDemo".into(),
        amazon_side_asn: params.amazon_side_asn,
        customer_side_asn: params.customer_side_asn,
        on_prem_ip_address: AttributeValue::reference(edge.address_id(), ID_OUTPUT),
    };
    let hub = AttributeValue::reference(gateway.hub_id(), ID_OUTPUT);

    let spokes = [
        ("Development", &params.development_cidr),
        ("Production", &params.production_cidr),
    ]
    .map(|(prefix, cidr)| {
        IsolatedNetworkProps::new(prefix, cidr.as_str(), params.cidr_mask, hub.clone())
            .with_instance_role(role.id_ref())
    });

    let topologies: [&dyn Topology; 4] = [&edge, &gateway, &spokes[0], &spokes[1]];
    for topology in topologies {
        log::trace!("declaring {}", topology.name());
        decl.merge(topology.declare()?)?;
    }
    Ok(decl)
}

/// Hub routing on an existing hub
pub fn hub_routing(params: &RegionParams, lookup: Lookup<'_>) -> Result<Declaration> {
    let need = |key: &str| config::require(lookup, key);
    let peer = |value: &Option<String>, name: &str| {
        value
            .clone()
            .ok_or_else(|| Error::invalid("params", name, "is not set for this region"))
    };

    HubFabricProps {
        prefix: "TransitGatewayRouting".into(),
        hub_id: need(TGW_ID)?,
        vpn_attachment_id: need(VPN_ATTACHMENT_ID)?,
        peering_attachment_id: need(PEER_ATTACHMENT_ID)?,
        networks: vec![
            FabricNetwork {
                name: "Development".into(),
                attachment_id: need(DEVELOPMENT_VPC_ATTACHMENT_ID)?,
                route_table_id: need(DEVELOPMENT_VPC_ROUTE_TABLE_ID)?,
                peer_destination: peer(&params.peer_development_cidr, "PeerDevelopmentCidr")?,
            },
            FabricNetwork {
                name: "Production".into(),
                attachment_id: need(PRODUCTION_VPC_ATTACHMENT_ID)?,
                route_table_id: need(PRODUCTION_VPC_ROUTE_TABLE_ID)?,
                peer_destination: peer(&params.peer_production_cidr, "PeerProductionCidr")?,
            },
        ],
    }
    .declare()
}

/// Global network over the hubs of both regions
pub fn global_network(lookup: Lookup<'_>) -> Result<Declaration> {
    GlobalNetworkProps {
        prefix: "TransitGatewayPeering".into(),
        description: "Global network for the Transit Gateway powered inter-region peering".into(),
        hub_arns: vec![config::require(lookup, US_TGW_ARN)?, config::require(lookup, EU_TGW_ARN)?],
    }
    .declare()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn params() -> RegionParams {
        RegionParams {
            on_prem_cidr: "172.16.0.0/16".into(),
            cidr_mask: 24,
            amazon_side_asn: 64512,
            customer_side_asn: 65000,
            development_cidr: "10.1.0.0/16".into(),
            production_cidr: "10.2.0.0/16".into(),
            peer_development_cidr: Some("10.11.0.0/16".into()),
            peer_production_cidr: Some("10.12.0.0/16".into()),
        }
    }

    fn inputs() -> HashMap<&'static str, String> {
        [
            (TGW_ID, "tgw-001"),
            (VPN_ATTACHMENT_ID, "tgw-attach-vpn"),
            (PEER_ATTACHMENT_ID, "tgw-attach-peer"),
            (DEVELOPMENT_VPC_ATTACHMENT_ID, "tgw-attach-dev"),
            (DEVELOPMENT_VPC_ROUTE_TABLE_ID, "tgw-rtb-dev"),
            (PRODUCTION_VPC_ATTACHMENT_ID, "tgw-attach-prod"),
            (PRODUCTION_VPC_ROUTE_TABLE_ID, "tgw-rtb-prod"),
            (US_TGW_ARN, "arn:aws:ec2:us-east-1:111122223333:transit-gateway/tgw-us"),
            (EU_TGW_ARN, "arn:aws:ec2:eu-west-1:111122223333:transit-gateway/tgw-eu"),
        ]
        .into_iter()
        .map(|(k, v)| (k, v.to_string()))
        .collect()
    }

    #[test]
    fn test_base_network_seals() {
        let decl = base_network(&params()).unwrap();
        assert_eq!(decl.nodes().len(), 61);
        assert_eq!(decl.exports().len(), 10);

        let sealed = decl.seal().unwrap();
        let order = sealed.graph.toposort().unwrap();
        let pos = |id: &str| order.iter().position(|n| *n == id).unwrap();
        assert!(pos("OnPrem-EIP") < pos("NetworkingDemo-CGW"));
        assert!(pos("NetworkingDemo-TGW") < pos("Development-Attachment"));
        assert!(pos("svcRoleForEC2viaSSM") < pos("Production-Instance"));
        assert!(pos("Production-Attachment") < pos("Production-tgw-route-2"));
    }

    #[test]
    fn test_hub_routing_from_lookup() {
        let values = inputs();
        let lookup = |k: &str| values.get(k).cloned();
        let decl = declare(StackKind::HubRouting, Some(&params()), &lookup).unwrap();
        assert_eq!(decl.count_kind(ResourceKind::HubRouteTablePropagation), 6);
        assert_eq!(
            decl.node("TransitGatewayRouting-Hub")
                .and_then(|n| n.attribute("value"))
                .and_then(|v| v.as_str()),
            Some("tgw-001")
        );
    }

    #[test]
    fn test_hub_routing_missing_input() {
        let mut values = inputs();
        values.remove(PEER_ATTACHMENT_ID);
        let lookup = |k: &str| values.get(k).cloned();
        let err = declare(StackKind::HubRouting, Some(&params()), &lookup).unwrap_err();
        assert_eq!(err, Error::invalid("environment", PEER_ATTACHMENT_ID, "is not set"));
    }

    #[test]
    fn test_hub_routing_needs_peer_cidrs() {
        let values = inputs();
        let lookup = |k: &str| values.get(k).cloned();
        let mut p = params();
        p.peer_production_cidr = None;
        let err = hub_routing(&p, &lookup).unwrap_err();
        assert!(err.to_string().contains("PeerProductionCidr"));
    }

    #[test]
    fn test_global_network_registers_both_hubs() {
        let values = inputs();
        let lookup = |k: &str| values.get(k).cloned();
        let decl = declare(StackKind::GlobalNetwork, None, &lookup).unwrap();
        assert_eq!(decl.count_kind(ResourceKind::HubRegistration), 2);
    }

    #[test]
    fn test_params_required() {
        let err = declare(StackKind::BaseNetwork, None, &|_| None).unwrap_err();
        assert!(matches!(err, Error::InvalidAttribute { .. }));
        assert_eq!(StackKind::HubRouting.upstream(), Some(StackKind::BaseNetwork));
    }
}
