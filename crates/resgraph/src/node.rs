//! Resource nodes
//!
//! A [`ResourceNode`] is one provisionable unit: a stable id, a kind, an
//! ordered set of attributes and the ids it explicitly depends on.

use crate::error::{Error, Result};
use crate::types::{AttributeValue, Attributes, ResourceKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Name of the output every provisioned node publishes
pub const ID_OUTPUT: &str = "id";

/// One declared infrastructure resource
///
/// # Example
///
/// ```
/// use resgraph::{ResourceKind, ResourceNode};
///
/// let vpc = ResourceNode::new("Development-VPC", ResourceKind::Vpc)
///     .attr("cidrBlock", "10.1.0.0/16");
/// let subnet = ResourceNode::new("Development-VPC-IsolatedSubnet1", ResourceKind::Subnet)
///     .attr("vpcId", vpc.output_ref())
///     .attr("cidrBlock", "10.1.0.0/24");
///
/// assert!(subnet.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceNode {
    id: String,
    kind: ResourceKind,
    attributes: Attributes,
    depends_on: BTreeSet<String>,
}

impl ResourceNode {
    /// Create a node with no attributes
    ///
    /// The id must be derived from builder inputs only, so that the same
    /// inputs always produce the same node.
    pub fn new(id: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            id: id.into(),
            kind,
            attributes: Attributes::new(),
            depends_on: BTreeSet::new(),
        }
    }

    /// Set an attribute
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.set(name, value.into());
        self
    }

    /// Set an attribute only when a value is supplied
    pub fn attr_opt(self, name: impl Into<String>, value: Option<AttributeValue>) -> Self {
        match value {
            Some(v) => self.attr(name, v),
            None => self,
        }
    }

    /// Add a `Name` tag, as every named resource carries one
    pub fn name_tag(self, name: impl Into<String>) -> Self {
        self.attr("tags", vec![format!("Name={}", name.into())])
    }

    /// Declare an explicit dependency on another node
    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        self.depends_on.insert(id.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// Explicit dependencies, in id order
    pub fn explicit_dependencies(&self) -> impl Iterator<Item = &str> {
        self.depends_on.iter().map(String::as_str)
    }

    /// Reference to this node's provider id
    pub fn output_ref(&self) -> AttributeValue {
        AttributeValue::reference(&self.id, ID_OUTPUT)
    }

    /// Reference to a named output of this node
    pub fn output(&self, name: &str) -> AttributeValue {
        AttributeValue::reference(&self.id, name)
    }

    /// Every `(attribute, referenced node)` pair, in attribute order
    pub fn references(&self) -> Vec<(&str, &str)> {
        let mut refs = Vec::new();
        for (name, value) in self.attributes.iter() {
            value.for_each_reference(&mut |node, _| refs.push((name, node)));
        }
        refs
    }

    /// Check the kind's static schema
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::invalid("<unnamed>", "id", "node id must not be empty"));
        }
        for required in self.kind.required_attributes() {
            if !self.attributes.contains(required) {
                return Err(Error::invalid(
                    &self.id,
                    *required,
                    format!("required by {}", self.kind),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_required_attribute() {
        let kind = ResourceKind::HubRouteTableAssociation;
        let assoc = ResourceNode::new("Dev-RouteTableAssociation", kind)
            .attr("transitGatewayAttachmentId", AttributeValue::reference("Dev-Attachment", "id"));

        let err = assoc.validate().unwrap_err();
        assert_eq!(
            err,
            Error::invalid(
                "Dev-RouteTableAssociation",
                "transitGatewayRouteTableId",
                "required by hub_route_table_association"
            )
        );
    }

    #[test]
    fn test_references_in_attribute_order() {
        let node = ResourceNode::new("Dev-Attachment", ResourceKind::HubAttachment)
            .attr("transitGatewayId", "tgw-123")
            .attr("vpcId", AttributeValue::reference("Dev-VPC", "id"))
            .attr(
                "subnetIds",
                vec![
                    AttributeValue::reference("Dev-Subnet1", "id"),
                    AttributeValue::reference("Dev-Subnet2", "id"),
                ],
            );

        assert_eq!(
            node.references(),
            vec![
                ("vpcId", "Dev-VPC"),
                ("subnetIds", "Dev-Subnet1"),
                ("subnetIds", "Dev-Subnet2"),
            ]
        );
    }

    #[test]
    fn test_empty_id_rejected() {
        let node = ResourceNode::new(" ", ResourceKind::GlobalNetwork);
        assert!(node.validate().is_err());
    }
}
