//! Global network with hub registrations

use super::require_prefix;
use resgraph::{Declaration, Error, ID_OUTPUT, ResourceKind, ResourceNode, Result, Topology};

#[derive(Debug, Clone)]
pub struct GlobalNetworkProps {
    pub prefix: String,
    pub description: String,
    /// ARNs of the hubs to register, one registration each
    pub hub_arns: Vec<String>,
}

impl Topology for GlobalNetworkProps {
    fn name(&self) -> String {
        format!("{} global network", self.prefix)
    }

    fn declare(&self) -> Result<Declaration> {
        require_prefix("GlobalNetwork", &self.prefix)?;
        let p = &self.prefix;
        let mut decl = Declaration::new();

        let network = decl.add(
            ResourceNode::new(format!("{p}-GlobalNetwork"), ResourceKind::GlobalNetwork)
                .attr("description", self.description.as_str()),
        )?;

        for (i, arn) in self.hub_arns.iter().enumerate() {
            let id = format!("{p}-RegisterTGW{}", i + 1);
            if !arn.starts_with("arn:") {
                let reason = format!("'{arn}' is not an ARN");
                return Err(Error::invalid(id, "transitGatewayArn", reason));
            }
            decl.add(
                ResourceNode::new(id, ResourceKind::HubRegistration)
                    .attr("globalNetworkId", network.id_ref())
                    .attr("transitGatewayArn", arn.as_str()),
            )?;
        }

        decl.export("GlobalNetworkId", "Global network ID", &network, ID_OUTPUT)?;
        Ok(decl)
    }
}
