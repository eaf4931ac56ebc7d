//! Hub gateway: transit hub, customer gateway and the VPN between them

use super::{is_private_asn, require_prefix};
use resgraph::{
    AttributeValue, Declaration, Error, ID_OUTPUT, ResourceKind, ResourceNode, Result, Topology,
};
use std::net::Ipv4Addr;

/// Highest ASN a customer gateway accepts
const MAX_CUSTOMER_ASN: u32 = 4_294_967_294;

#[derive(Debug, Clone)]
pub struct GatewayProps {
    pub prefix: String,
    pub amazon_side_asn: u32,
    pub customer_side_asn: u32,
    /// Public address of the on-premises side, a literal or a reference
    pub on_prem_ip_address: AttributeValue,
}

impl GatewayProps {
    /// Id of the transit hub node
    pub fn hub_id(&self) -> String {
        format!("{}-TGW", self.prefix)
    }

    fn validate(&self) -> Result<()> {
        require_prefix("Gateway", &self.prefix)?;
        let hub = self.hub_id();
        let cgw = format!("{}-CGW", self.prefix);

        if !is_private_asn(self.amazon_side_asn) {
            return Err(Error::invalid(
                hub,
                "amazonSideAsn",
                format!("{} is not a private ASN", self.amazon_side_asn),
            ));
        }
        if self.customer_side_asn == 0 || self.customer_side_asn > MAX_CUSTOMER_ASN {
            return Err(Error::invalid(
                &cgw,
                "bgpAsn",
                format!("{} is out of range", self.customer_side_asn),
            ));
        }
        if let Some(ip) = self.on_prem_ip_address.as_str()
            && ip.parse::<Ipv4Addr>().is_err()
        {
            return Err(Error::invalid(cgw, "ipAddress", format!("'{ip}' is not an IPv4 address")));
        }
        Ok(())
    }
}

impl Topology for GatewayProps {
    fn name(&self) -> String {
        format!("{} gateway", self.prefix)
    }

    fn declare(&self) -> Result<Declaration> {
        self.validate()?;
        let p = &self.prefix;
        let mut decl = Declaration::new();

        let hub = decl.add(
            ResourceNode::new(self.hub_id(), ResourceKind::TransitHub)
                .attr("amazonSideAsn", self.amazon_side_asn)
                .attr("description", "Transit Gateway for hybrid networking")
                .attr("autoAcceptSharedAttachments", "enable")
                .attr("defaultRouteTableAssociation", "disable")
                .attr("defaultRouteTablePropagation", "disable")
                .attr("dnsSupport", "enable")
                .attr("vpnEcmpSupport", "enable")
                .attr("multicastSupport", "enable")
                .name_tag(format!("{p}-TGW")),
        )?;

        let cgw = decl.add(
            ResourceNode::new(format!("{p}-CGW"), ResourceKind::CustomerGateway)
                .attr("bgpAsn", self.customer_side_asn)
                .attr("ipAddress", self.on_prem_ip_address.clone())
                .attr("type", "ipsec.1")
                .name_tag(format!("{p}-CGW")),
        )?;

        let vpn = decl.add(
            ResourceNode::new(format!("{p}-VPN"), ResourceKind::VpnConnection)
                .attr("customerGatewayId", cgw.id_ref())
                .attr("transitGatewayId", hub.id_ref())
                .attr("staticRoutesOnly", false)
                .attr("type", "ipsec.1")
                .name_tag(format!("{p}-VPN"))
                .depends_on(cgw.id())
                .depends_on(hub.id()),
        )?;

        decl.export("TransitGatewayId", "Transit Gateway ID", &hub, ID_OUTPUT)?;
        decl.export("CustomerGatewayId", "Customer Gateway ID", &cgw, ID_OUTPUT)?;
        decl.export("VPNConnectionId", "VPN Connection ID", &vpn, ID_OUTPUT)?;
        Ok(decl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resgraph::{Edge, EdgeKind};

    fn props() -> GatewayProps {
        GatewayProps {
            prefix: "Net".into(),
            amazon_side_asn: 64512,
            customer_side_asn: 65000,
            on_prem_ip_address: "203.0.113.5".into(),
        }
    }

    #[test]
    fn test_gateway_scenario() {
        let sealed = props().declare().unwrap().seal().unwrap();
        let graph = &sealed.graph;

        let ids: Vec<_> = graph.nodes().map(ResourceNode::id).collect();
        assert_eq!(ids, vec!["Net-TGW", "Net-CGW", "Net-VPN"]);

        assert_eq!(graph.edge_kind("Net-VPN", "Net-CGW"), Some(EdgeKind::Explicit));
        assert_eq!(graph.edge_kind("Net-VPN", "Net-TGW"), Some(EdgeKind::Explicit));
        assert_eq!(graph.edges().len(), 2);
        assert!(sealed.inferred.contains(&Edge::implicit("Net-VPN", "Net-TGW")));

        let order = graph.toposort().unwrap();
        assert_eq!(order.last(), Some(&"Net-VPN"));

        let exports: Vec<_> = sealed.exports.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(exports, vec!["TransitGatewayId", "CustomerGatewayId", "VPNConnectionId"]);
    }

    #[test]
    fn test_public_asn_rejected() {
        let mut p = props();
        p.amazon_side_asn = 16509;
        let err = p.declare().unwrap_err();
        assert_eq!(
            err,
            Error::invalid("Net-TGW", "amazonSideAsn", "16509 is not a private ASN")
        );
    }

    #[test]
    fn test_bad_literal_address_rejected() {
        let mut p = props();
        p.on_prem_ip_address = "not-an-ip".into();
        assert!(matches!(
            p.declare(),
            Err(Error::InvalidAttribute { ref attribute, .. }) if attribute == "ipAddress"
        ));
    }

    #[test]
    fn test_reference_address_accepted() {
        let mut p = props();
        p.on_prem_ip_address = AttributeValue::reference("OnPrem-EIP", ID_OUTPUT);
        let decl = p.declare().unwrap();
        // The referenced address node lives in another declaration
        assert_eq!(
            decl.seal().unwrap_err(),
            Error::DanglingReference {
                node: "Net-CGW".into(),
                attribute: "ipAddress".into(),
                target: "OnPrem-EIP".into(),
            }
        );
    }
}
