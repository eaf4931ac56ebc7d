//! Core types for resource graphs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Kind of a provisionable resource
///
/// Each kind carries a static schema of required attributes, checked when a
/// node is declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    TransitHub,
    CustomerGateway,
    VpnConnection,
    ElasticAddress,
    Vpc,
    Subnet,
    RouteTable,
    SubnetRouteTableAssociation,
    Route,
    SecurityGroup,
    Instance,
    InterfaceEndpoint,
    LogGroup,
    FlowLog,
    Alarm,
    HubAttachment,
    HubRouteTable,
    HubRouteTableAssociation,
    HubRouteTablePropagation,
    HubRoute,
    GlobalNetwork,
    HubRegistration,
    InstanceRole,
    /// Lookup of an identifier that already exists; never sent to the backend
    Import,
}

impl ResourceKind {
    /// Attributes every node of this kind must declare
    pub fn required_attributes(&self) -> &'static [&'static str] {
        match self {
            Self::TransitHub => &["amazonSideAsn"],
            Self::CustomerGateway => &["bgpAsn", "ipAddress", "type"],
            Self::VpnConnection => &["customerGatewayId", "transitGatewayId", "type"],
            Self::ElasticAddress => &["domain"],
            Self::Vpc => &["cidrBlock"],
            Self::Subnet => &["vpcId", "cidrBlock"],
            Self::RouteTable => &["vpcId"],
            Self::SubnetRouteTableAssociation => &["subnetId", "routeTableId"],
            Self::Route => &["routeTableId", "destinationCidrBlock"],
            Self::SecurityGroup => &["vpcId", "groupDescription"],
            Self::Instance => &["instanceType", "subnetId"],
            Self::InterfaceEndpoint => &["serviceName", "vpcId"],
            Self::LogGroup => &["retentionInDays"],
            Self::FlowLog => &["resourceId", "logGroupName", "trafficType"],
            Self::Alarm => &["namespace", "metricName", "threshold"],
            Self::HubAttachment => &["transitGatewayId", "vpcId", "subnetIds"],
            Self::HubRouteTable => &["transitGatewayId"],
            Self::HubRouteTableAssociation | Self::HubRouteTablePropagation => {
                &["transitGatewayAttachmentId", "transitGatewayRouteTableId"]
            }
            Self::HubRoute => &[
                "transitGatewayRouteTableId",
                "destinationCidrBlock",
                "transitGatewayAttachmentId",
            ],
            Self::GlobalNetwork => &[],
            Self::HubRegistration => &["globalNetworkId", "transitGatewayArn"],
            Self::InstanceRole => &["assumedBy"],
            Self::Import => &["value"],
        }
    }

    /// Whether nodes of this kind resolve locally instead of calling the backend
    pub fn is_lookup(&self) -> bool {
        matches!(self, Self::Import)
    }

    /// Stable snake_case name, used for grouping and display
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TransitHub => "transit_hub",
            Self::CustomerGateway => "customer_gateway",
            Self::VpnConnection => "vpn_connection",
            Self::ElasticAddress => "elastic_address",
            Self::Vpc => "vpc",
            Self::Subnet => "subnet",
            Self::RouteTable => "route_table",
            Self::SubnetRouteTableAssociation => "subnet_route_table_association",
            Self::Route => "route",
            Self::SecurityGroup => "security_group",
            Self::Instance => "instance",
            Self::InterfaceEndpoint => "interface_endpoint",
            Self::LogGroup => "log_group",
            Self::FlowLog => "flow_log",
            Self::Alarm => "alarm",
            Self::HubAttachment => "hub_attachment",
            Self::HubRouteTable => "hub_route_table",
            Self::HubRouteTableAssociation => "hub_route_table_association",
            Self::HubRouteTablePropagation => "hub_route_table_propagation",
            Self::HubRoute => "hub_route",
            Self::GlobalNetwork => "global_network",
            Self::HubRegistration => "hub_registration",
            Self::InstanceRole => "instance_role",
            Self::Import => "import",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A literal attribute value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Integer(i64),
    String(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

/// Value of a node attribute
///
/// A [`AttributeValue::Reference`] is how one node consumes another node's
/// output, and is the source of implicit dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeValue {
    Literal(Scalar),
    Reference { node: String, output: String },
    List(Vec<AttributeValue>),
}

impl AttributeValue {
    /// Reference to a named output of another node
    pub fn reference(node: impl Into<String>, output: impl Into<String>) -> Self {
        Self::Reference {
            node: node.into(),
            output: output.into(),
        }
    }

    /// Literal string value
    pub fn string(value: impl Into<String>) -> Self {
        Self::Literal(Scalar::String(value.into()))
    }

    /// Get the literal string, if this is one
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Literal(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Get the literal integer, if this is one
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Literal(Scalar::Integer(i)) => Some(*i),
            _ => None,
        }
    }

    /// Whether this value contains no reference at any depth
    pub fn is_resolved(&self) -> bool {
        match self {
            Self::Literal(_) => true,
            Self::Reference { .. } => false,
            Self::List(items) => items.iter().all(Self::is_resolved),
        }
    }

    /// Visit every reference in this value, depth first
    pub fn for_each_reference<'a, F: FnMut(&'a str, &'a str)>(&'a self, f: &mut F) {
        match self {
            Self::Literal(_) => {}
            Self::Reference { node, output } => f(node, output),
            Self::List(items) => {
                for item in items {
                    item.for_each_reference(f);
                }
            }
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(s) => write!(f, "{s}"),
            Self::Reference { node, output } => write!(f, "${{{node}.{output}}}"),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Literal(Scalar::String(value.to_string()))
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Literal(Scalar::String(value))
    }
}

impl From<&String> for AttributeValue {
    fn from(value: &String) -> Self {
        Self::Literal(Scalar::String(value.clone()))
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Literal(Scalar::Integer(value))
    }
}

impl From<u32> for AttributeValue {
    fn from(value: u32) -> Self {
        Self::Literal(Scalar::Integer(i64::from(value)))
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Literal(Scalar::Bool(value))
    }
}

impl<T: Into<AttributeValue>> From<Vec<T>> for AttributeValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

/// Ordered attribute mapping
///
/// Keeps declaration order so plans render and hash identically across runs.
/// Setting an existing name replaces the value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(Vec<(String, AttributeValue)>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute, keeping its original position if already present
    pub fn set(&mut self, name: impl Into<String>, value: AttributeValue) {
        let name = name.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, AttributeValue)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (String, AttributeValue)>>(iter: I) -> Self {
        let mut attrs = Self::new();
        for (name, value) in iter {
            attrs.set(name, value);
        }
        attrs
    }
}

/// Why an edge exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Declared directly by a builder
    Explicit,
    /// Inferred from a reference attribute
    Implicit,
}

/// A must-happen-before relationship: `depends_on` is provisioned before `node`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    pub node: String,
    pub depends_on: String,
    pub kind: EdgeKind,
}

impl Edge {
    pub fn explicit(node: impl Into<String>, depends_on: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            depends_on: depends_on.into(),
            kind: EdgeKind::Explicit,
        }
    }

    pub fn implicit(node: impl Into<String>, depends_on: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            depends_on: depends_on.into(),
            kind: EdgeKind::Implicit,
        }
    }
}

/// Phase of an apply run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Planning,
    Scheduled,
    Applying,
    Succeeded,
    Failed,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Per-node outcome of an apply run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum NodeStatus {
    /// Not yet submitted
    Pending,
    /// Provisioned by the backend (or resolved, for lookups)
    Succeeded { provider_id: String },
    /// The backend rejected the node
    Failed { error: String },
    /// Never attempted because an earlier node failed
    Skipped,
    /// Never attempted because the run deadline elapsed
    Aborted,
}

impl NodeStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Pending => "·",
            Self::Succeeded { .. } => "✓",
            Self::Failed { .. } => "✗",
            Self::Skipped => "⊘",
            Self::Aborted => "⏱",
        }
    }
}

/// How much of a graph ended up provisioned
///
/// Operators respond differently to each: nothing needs no cleanup, partial
/// needs inspection of [`crate::ApplyReport::cleanup_order`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionedState {
    Nothing,
    Partial,
    Complete,
}

/// Counts of node statuses after a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplySummary {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub aborted: usize,
    pub pending: usize,
}

impl ApplySummary {
    /// Add a status to the summary
    pub fn add_status(&mut self, status: &NodeStatus) {
        match status {
            NodeStatus::Pending => self.pending += 1,
            NodeStatus::Succeeded { .. } => self.succeeded += 1,
            NodeStatus::Failed { .. } => self.failed += 1,
            NodeStatus::Skipped => self.skipped += 1,
            NodeStatus::Aborted => self.aborted += 1,
        }
    }

    /// Total number of nodes counted
    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.skipped + self.aborted + self.pending
    }

    /// Check if every node was provisioned
    pub fn is_success(&self) -> bool {
        self.succeeded == self.total()
    }
}

/// Options for an apply run
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Maximum number of concurrent backend submissions within a layer
    pub jobs: usize,
    /// Deadline for the whole run, measured from the start of apply
    pub timeout: Option<Duration>,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            jobs: 4,
            timeout: None,
        }
    }
}
