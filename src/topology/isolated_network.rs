//! Routed isolated network with monitored compute
//!
//! An isolated VPC attached to the transit hub. Every subnet gets its own
//! route table with a default route through the hub, so the only way in or
//! out is the hub. The compute instance is reachable through interface
//! endpoints for session management.

use super::{ANY_IPV4, carve_subnets, require_prefix};
use resgraph::{
    AttributeValue, Declaration, Error, ID_OUTPUT, NodeRef, ResourceKind, ResourceNode, Result,
    Topology,
};

/// Default number of isolated subnets, one per availability zone
pub const DEFAULT_SUBNET_COUNT: u32 = 3;

/// Interface endpoints needed for session management, by node suffix and service
const ENDPOINTS: [(&str, &str); 4] = [
    ("SSM", "ssm"),
    ("SSM_MESSAGES", "ssmmessages"),
    ("EC2", "ec2"),
    ("EC2_MESSAGES", "ec2messages"),
];

/// Alarm definitions: node suffix, metric, threshold, evaluation periods, description
const ALARMS: [(&str, &str, i64, i64, &str); 2] = [
    ("HighNetworkIn", "NetworkIn", 1_000_000_000, 2, "High network input detected"),
    ("HighCPU", "CPUUtilization", 80, 3, "High CPU utilization detected"),
];

#[derive(Debug, Clone)]
pub struct IsolatedNetworkProps {
    pub prefix: String,
    pub cidr: String,
    pub cidr_mask: u8,
    pub subnet_count: u32,
    /// Transit hub the network attaches to
    pub hub: AttributeValue,
    /// Role assumed by the compute instance
    pub instance_role: Option<AttributeValue>,
}

impl IsolatedNetworkProps {
    pub fn new(
        prefix: impl Into<String>,
        cidr: impl Into<String>,
        cidr_mask: u8,
        hub: AttributeValue,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            cidr: cidr.into(),
            cidr_mask,
            subnet_count: DEFAULT_SUBNET_COUNT,
            hub,
            instance_role: None,
        }
    }

    pub fn with_instance_role(mut self, role: AttributeValue) -> Self {
        self.instance_role = Some(role);
        self
    }

    /// Id of the hub attachment node
    pub fn attachment_id(&self) -> String {
        format!("{}-Attachment", self.prefix)
    }

    /// Id of the hub route table node
    pub fn route_table_id(&self) -> String {
        format!("{}-RouteTable", self.prefix)
    }
}

/// One isolated subnet and its route table
struct SubnetNodes {
    subnet: NodeRef,
    route_table: NodeRef,
}

impl Topology for IsolatedNetworkProps {
    fn name(&self) -> String {
        format!("{} isolated network", self.prefix)
    }

    fn declare(&self) -> Result<Declaration> {
        require_prefix("IsolatedNetwork", &self.prefix)?;
        if self.subnet_count == 0 {
            return Err(Error::invalid(
                format!("{}-VPC", self.prefix),
                "subnetCount",
                "at least one subnet is required",
            ));
        }
        let p = &self.prefix;
        let vpc_id = format!("{p}-VPC");
        let blocks = carve_subnets(&vpc_id, &self.cidr, self.cidr_mask, self.subnet_count)?;

        let mut decl = Declaration::new();
        let vpc = decl.add(
            ResourceNode::new(&vpc_id, ResourceKind::Vpc)
                .attr("cidrBlock", self.cidr.as_str())
                .attr("enableDnsHostnames", true)
                .attr("enableDnsSupport", true)
                .name_tag(&vpc_id),
        )?;

        let mut subnets = Vec::with_capacity(blocks.len());
        for (i, block) in blocks.iter().enumerate() {
            let subnet_id = format!("{vpc_id}-IsolatedSubnet{}", i + 1);
            let subnet = decl.add(
                ResourceNode::new(&subnet_id, ResourceKind::Subnet)
                    .attr("vpcId", vpc.id_ref())
                    .attr("cidrBlock", block.to_string())
                    .attr("availabilityZoneIndex", i as i64)
                    .attr("mapPublicIpOnLaunch", false)
                    .name_tag(format!("{p}-VPC | Private Isolated")),
            )?;
            let route_table = decl.add(
                ResourceNode::new(format!("{subnet_id}-RouteTable"), ResourceKind::RouteTable)
                    .attr("vpcId", vpc.id_ref())
                    .name_tag(&subnet_id),
            )?;
            decl.add(
                ResourceNode::new(
                    format!("{subnet_id}-RouteTableAssociation"),
                    ResourceKind::SubnetRouteTableAssociation,
                )
                .attr("subnetId", subnet.id_ref())
                .attr("routeTableId", route_table.id_ref()),
            )?;
            subnets.push(SubnetNodes { subnet, route_table });
        }
        let subnet_ids: Vec<AttributeValue> = subnets.iter().map(|s| s.subnet.id_ref()).collect();

        let log_group = decl.add(
            ResourceNode::new(format!("{p}-FlowLogs"), ResourceKind::LogGroup)
                .attr("retentionInDays", 30i64)
                .attr("removalPolicy", "destroy"),
        )?;
        decl.add(
            ResourceNode::new(format!("{p}-VPCFlowLog"), ResourceKind::FlowLog)
                .attr("resourceId", vpc.id_ref())
                .attr("resourceType", "VPC")
                .attr("logGroupName", log_group.id_ref())
                .attr("trafficType", "ALL")
                .attr("flowLogName", format!("{p}-VPCFlowLog")),
        )?;

        let sg = decl.add(
            ResourceNode::new(format!("{p}-SG"), ResourceKind::SecurityGroup)
                .attr("vpcId", vpc.id_ref())
                .attr("groupDescription", "Allow ICMP ping and HTTPS")
                .attr(
                    "securityGroupIngress",
                    vec![format!("icmp:echo-request:{ANY_IPV4}"), format!("tcp:443:{ANY_IPV4}")],
                ),
        )?;

        for (suffix, service) in ENDPOINTS {
            decl.add(
                ResourceNode::new(format!("{p}-{suffix}"), ResourceKind::InterfaceEndpoint)
                    .attr("serviceName", service)
                    .attr("vpcId", vpc.id_ref())
                    .attr("vpcEndpointType", "Interface")
                    .attr("privateDnsEnabled", true)
                    .attr("subnetIds", subnet_ids.clone())
                    .attr("securityGroupIds", vec![sg.id_ref()]),
            )?;
        }

        let instance = decl.add(
            ResourceNode::new(format!("{p}-Instance"), ResourceKind::Instance)
                .attr("instanceType", "t2.micro")
                .attr("imageId", "amazon-linux-2-x86_64")
                .attr("subnetId", subnets[0].subnet.id_ref())
                .attr("securityGroupIds", vec![sg.id_ref()])
                .attr_opt("iamInstanceProfile", self.instance_role.clone())
                .attr("monitoring", true)
                .attr("requireImdsv2", true)
                .name_tag(format!("{p}-Instance")),
        )?;

        for (suffix, metric, threshold, periods, description) in ALARMS {
            decl.add(
                ResourceNode::new(format!("{p}-{suffix}"), ResourceKind::Alarm)
                    .attr("namespace", "AWS/EC2")
                    .attr("metricName", metric)
                    .attr("instanceId", instance.id_ref())
                    .attr("statistic", "Average")
                    .attr("threshold", threshold)
                    .attr("evaluationPeriods", periods)
                    .attr("comparisonOperator", "GreaterThanThreshold")
                    .attr("treatMissingData", "notBreaching")
                    .attr("alarmDescription", description),
            )?;
        }

        let route_table = decl.add(
            ResourceNode::new(self.route_table_id(), ResourceKind::HubRouteTable)
                .attr("transitGatewayId", self.hub.clone())
                .name_tag(self.route_table_id()),
        )?;
        let attachment = decl.add(
            ResourceNode::new(self.attachment_id(), ResourceKind::HubAttachment)
                .attr("transitGatewayId", self.hub.clone())
                .attr("vpcId", vpc.id_ref())
                .attr("subnetIds", subnet_ids)
                .name_tag(self.attachment_id()),
        )?;

        decl.add(
            ResourceNode::new(
                format!("{p}-RouteTableAssociation"),
                ResourceKind::HubRouteTableAssociation,
            )
                .attr("transitGatewayRouteTableId", route_table.id_ref())
                .attr("transitGatewayAttachmentId", attachment.id_ref())
                .depends_on(route_table.id())
                .depends_on(attachment.id()),
        )?;
        decl.add(
            ResourceNode::new(
                format!("{p}-RouteTablePropagation"),
                ResourceKind::HubRouteTablePropagation,
            )
                .attr("transitGatewayRouteTableId", route_table.id_ref())
                .attr("transitGatewayAttachmentId", attachment.id_ref())
                .depends_on(route_table.id())
                .depends_on(attachment.id()),
        )?;

        // Default route of every subnet through the hub; a route through the
        // hub is only accepted once the network is attached.
        let routes: Vec<ResourceNode> = subnets
            .iter()
            .enumerate()
            .map(|(index, s)| {
                ResourceNode::new(format!("{p}-tgw-route-{index}"), ResourceKind::Route)
                    .attr("routeTableId", s.route_table.id_ref())
                    .attr("destinationCidrBlock", ANY_IPV4)
                    .attr("transitGatewayId", self.hub.clone())
                    .depends_on(attachment.id())
            })
            .collect();
        for route in routes {
            decl.add(route)?;
        }

        decl.export(format!("{p}VPCId"), "VPCId for the environment", &vpc, ID_OUTPUT)?;
        decl.export(
            format!("{p}TGWAttachmentId"),
            "TGWAttachmentId for the VPC",
            &attachment,
            ID_OUTPUT,
        )?;
        decl.export(
            format!("{p}TGWRouteTableId"),
            "TGWRouteTableId for the VPC",
            &route_table,
            ID_OUTPUT,
        )?;
        Ok(decl)
    }
}
