//! Hub routing fabric
//!
//! Route tables, associations, propagations and static routes on a transit
//! hub that already exists. The hub and the per-network route tables belong
//! to another stack and are imported as lookup nodes, so every dependency of
//! the fabric is inferred from references.

use super::{parse_cidr, require_prefix};
use resgraph::{
    Declaration, Error, ID_OUTPUT, NodeRef, ResourceKind, ResourceNode, Result, Topology,
};
use std::collections::HashSet;

/// A spoke network routed through the fabric
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FabricNetwork {
    /// Short name used in node ids, e.g. `Development`
    pub name: String,
    /// Hub attachment of the network
    pub attachment_id: String,
    /// Hub route table of the network
    pub route_table_id: String,
    /// Network in the peer region reached through the peering attachment
    pub peer_destination: String,
}

#[derive(Debug, Clone)]
pub struct HubFabricProps {
    pub prefix: String,
    pub hub_id: String,
    pub vpn_attachment_id: String,
    pub peering_attachment_id: String,
    pub networks: Vec<FabricNetwork>,
}

impl HubFabricProps {
    fn validate(&self) -> Result<()> {
        require_prefix("HubFabric", &self.prefix)?;
        let p = &self.prefix;
        for (attribute, value) in [
            ("transitGatewayId", &self.hub_id),
            ("vpnAttachmentId", &self.vpn_attachment_id),
            ("peeringAttachmentId", &self.peering_attachment_id),
        ] {
            if value.trim().is_empty() {
                return Err(Error::invalid(p, attribute, "must not be empty"));
            }
        }

        let mut names = HashSet::new();
        for network in &self.networks {
            if network.name.trim().is_empty() {
                return Err(Error::invalid(p, "networks", "network name must not be empty"));
            }
            if !names.insert(network.name.as_str()) {
                return Err(Error::invalid(
                    p,
                    "networks",
                    format!("network {} is listed twice", network.name),
                ));
            }
            let route = format!("{p}-{}StaticRoute", network.name);
            parse_cidr(&route, "destinationCidrBlock", &network.peer_destination)?;
        }
        Ok(())
    }

    fn propagation(&self, id: String, attachment: &str, table: &NodeRef) -> ResourceNode {
        ResourceNode::new(id, ResourceKind::HubRouteTablePropagation)
            .attr("transitGatewayAttachmentId", attachment)
            .attr("transitGatewayRouteTableId", table.id_ref())
    }

    fn association(&self, id: String, attachment: &str, table: &NodeRef) -> ResourceNode {
        ResourceNode::new(id, ResourceKind::HubRouteTableAssociation)
            .attr("transitGatewayAttachmentId", attachment)
            .attr("transitGatewayRouteTableId", table.id_ref())
    }
}

impl Topology for HubFabricProps {
    fn name(&self) -> String {
        format!("{} hub routing", self.prefix)
    }

    fn declare(&self) -> Result<Declaration> {
        self.validate()?;
        let p = &self.prefix;
        let mut decl = Declaration::new();

        let hub = decl.add(
            ResourceNode::new(format!("{p}-Hub"), ResourceKind::Import)
                .attr("value", self.hub_id.as_str()),
        )?;
        let mut tables = Vec::with_capacity(self.networks.len());
        for network in &self.networks {
            tables.push(decl.add(
                ResourceNode::new(format!("{p}-{}RouteTable", network.name), ResourceKind::Import)
                    .attr("value", network.route_table_id.as_str()),
            )?);
        }

        // VPN side
        let vpn = decl.add(
            ResourceNode::new(format!("{p}-VPN"), ResourceKind::HubRouteTable)
                .attr("transitGatewayId", hub.id_ref())
                .name_tag("VPNRouteTable"),
        )?;
        decl.add(self.association(format!("{p}-VPNAssociation"), &self.vpn_attachment_id, &vpn))?;
        for network in &self.networks {
            decl.add(self.propagation(
                format!("{p}-VPN{}Propagation", network.name),
                &network.attachment_id,
                &vpn,
            ))?;
        }

        // Network side: learn the VPN routes, reach the peer region statically
        for (network, table) in self.networks.iter().zip(&tables) {
            decl.add(self.propagation(
                format!("{p}-{}VPNPropagation", network.name),
                &self.vpn_attachment_id,
                table,
            ))?;
        }
        for (network, table) in self.networks.iter().zip(&tables) {
            decl.add(
                ResourceNode::new(
                    format!("{p}-{}StaticRoute", network.name),
                    ResourceKind::HubRoute,
                )
                    .attr("transitGatewayAttachmentId", self.peering_attachment_id.as_str())
                    .attr("destinationCidrBlock", network.peer_destination.as_str())
                    .attr("transitGatewayRouteTableId", table.id_ref()),
            )?;
        }

        // Peering side
        let peer = decl.add(
            ResourceNode::new(format!("{p}-TGWPeer"), ResourceKind::HubRouteTable)
                .attr("transitGatewayId", hub.id_ref())
                .name_tag("TGWPeerRouteTable"),
        )?;
        decl.add(self.association(
            format!("{p}-TGWPeerAssociation"),
            &self.peering_attachment_id,
            &peer,
        ))?;
        for network in &self.networks {
            decl.add(self.propagation(
                format!("{p}-Peer{}Propagation", network.name),
                &network.attachment_id,
                &peer,
            ))?;
        }

        decl.export("VPNRouteTableId", "VPN route table ID", &vpn, ID_OUTPUT)?;
        decl.export("PeerRouteTableId", "Peering route table ID", &peer, ID_OUTPUT)?;
        Ok(decl)
    }
}
