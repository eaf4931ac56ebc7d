//! Simulated provisioning backend
//!
//! An in-memory stand-in for a cloud API. Provider ids are derived from the
//! node id with blake3, so repeated runs hand out the same ids, and creating
//! a node that already exists converges on the existing resource.

use anyhow::{Result, bail};
use resgraph::{Provisioned, Provisioner, Request, ResourceKind};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

/// Output of an address node holding its allocation id
const ALLOCATION_ID: &str = "allocationId";

/// A resource held by the simulated backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedResource {
    pub kind: ResourceKind,
    pub provider_id: String,
    pub outputs: BTreeMap<String, String>,
    /// Hash of the attributes the resource was created with
    pub fingerprint: String,
}

#[derive(Debug, Default)]
pub struct SimulatedBackend {
    resources: Mutex<BTreeMap<String, SimulatedResource>>,
    fail_on: HashSet<String>,
    latency: Duration,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject creation of the given nodes
    pub fn fail_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fail_on.extend(ids.into_iter().map(Into::into));
        self
    }

    /// Sleep this long on every create
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// A resource by node id
    #[cfg(test)]
    pub fn resource(&self, node: &str) -> Option<SimulatedResource> {
        self.lock().get(node).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, SimulatedResource>> {
        match self.resources.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Provisioner for SimulatedBackend {
    fn create(&self, request: &Request<'_>) -> Result<Provisioned> {
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
        if self.fail_on.contains(request.node) {
            bail!("simulated failure creating {} ({})", request.node, request.kind);
        }

        let fingerprint = attributes_fingerprint(request)?;
        let mut resources = self.lock();

        if let Some(existing) = resources.get_mut(request.node) {
            if existing.kind != request.kind {
                bail!(
                    "{} already exists as {}, not {}",
                    request.node,
                    existing.kind,
                    request.kind
                );
            }
            if existing.fingerprint != fingerprint {
                log::debug!("updating {} in place", request.node);
                existing.fingerprint = fingerprint;
            }
            return Ok(Provisioned {
                provider_id: existing.provider_id.clone(),
                outputs: existing.outputs.clone(),
            });
        }

        let digest = blake3::hash(request.node.as_bytes());
        let (provider_id, outputs) = match request.kind {
            ResourceKind::ElasticAddress => {
                let bytes = digest.as_bytes();
                let ip = format!("203.0.{}.{}", 113 + bytes[0] % 2, 1 + bytes[1] % 254);
                let mut outputs = BTreeMap::new();
                let allocation = format!("eipalloc-{}", short_hex(&digest));
                outputs.insert(ALLOCATION_ID.to_string(), allocation);
                (ip, outputs)
            }
            kind => (provider_id(kind, request.node, &digest), BTreeMap::new()),
        };

        log::debug!("simulated create {} -> {provider_id}", request.node);
        resources.insert(
            request.node.to_string(),
            SimulatedResource {
                kind: request.kind,
                provider_id: provider_id.clone(),
                outputs: outputs.clone(),
                fingerprint,
            },
        );
        Ok(Provisioned { provider_id, outputs })
    }

    fn delete(&self, node: &str, kind: ResourceKind, provider_id: &str) -> Result<()> {
        let mut resources = self.lock();
        match resources.get(node) {
            Some(existing) if existing.kind == kind && existing.provider_id == provider_id => {
                resources.remove(node);
                Ok(())
            }
            Some(existing) => bail!(
                "{node} is {} {}, not {kind} {provider_id}",
                existing.kind,
                existing.provider_id
            ),
            None => bail!("{node} ({provider_id}) does not exist"),
        }
    }
}

fn attributes_fingerprint(request: &Request<'_>) -> Result<String> {
    let json = serde_json::to_vec(&request.attributes)?;
    Ok(blake3::hash(&json).to_hex().to_string())
}

fn short_hex(digest: &blake3::Hash) -> String {
    digest.to_hex()[..17].to_string()
}

/// Provider-style id for a kind
fn provider_id(kind: ResourceKind, node: &str, digest: &blake3::Hash) -> String {
    let prefix = match kind {
        ResourceKind::TransitHub => "tgw",
        ResourceKind::CustomerGateway => "cgw",
        ResourceKind::VpnConnection => "vpn",
        ResourceKind::Vpc => "vpc",
        ResourceKind::Subnet => "subnet",
        ResourceKind::RouteTable => "rtb",
        ResourceKind::SubnetRouteTableAssociation => "rtbassoc",
        ResourceKind::Route => "r",
        ResourceKind::SecurityGroup => "sg",
        ResourceKind::Instance => "i",
        ResourceKind::InterfaceEndpoint => "vpce",
        ResourceKind::FlowLog => "fl",
        ResourceKind::HubAttachment => "tgw-attach",
        ResourceKind::HubRouteTable => "tgw-rtb",
        ResourceKind::HubRouteTableAssociation => "tgw-rtbassoc",
        ResourceKind::HubRouteTablePropagation => "tgw-rtbprop",
        ResourceKind::HubRoute => "tgw-route",
        ResourceKind::GlobalNetwork => "global-network",
        ResourceKind::HubRegistration => "tgw-reg",
        // Named resources are identified by name
        ResourceKind::LogGroup
        | ResourceKind::Alarm
        | ResourceKind::InstanceRole
        | ResourceKind::ElasticAddress
        | ResourceKind::Import => return node.to_string(),
    };
    format!("{prefix}-{}", short_hex(digest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use resgraph::Attributes;

    fn create(
        backend: &SimulatedBackend,
        node: &str,
        kind: ResourceKind,
        cidr: &str,
    ) -> Result<Provisioned> {
        let mut attributes = Attributes::new();
        attributes.set("cidrBlock", cidr.into());
        backend.create(&Request { node, kind, attributes })
    }

    #[test]
    fn test_ids_are_deterministic() {
        let fresh = || {
            let backend = SimulatedBackend::new();
            create(&backend, "Dev-VPC", ResourceKind::Vpc, "10.1.0.0/16")
        };
        let a = fresh().unwrap();
        let b = fresh().unwrap();
        assert_eq!(a, b);
        assert!(a.provider_id.starts_with("vpc-"));
        assert_eq!(a.provider_id.len(), "vpc-".len() + 17);
    }

    #[test]
    fn test_create_is_idempotent() {
        let backend = SimulatedBackend::new();
        let first = create(&backend, "Dev-VPC", ResourceKind::Vpc, "10.1.0.0/16").unwrap();
        let again = create(&backend, "Dev-VPC", ResourceKind::Vpc, "10.1.0.0/16").unwrap();
        let changed = create(&backend, "Dev-VPC", ResourceKind::Vpc, "10.9.0.0/16").unwrap();
        assert_eq!(first, again);
        assert_eq!(first.provider_id, changed.provider_id);
        assert_eq!(backend.len(), 1);
    }

    #[test]
    fn test_kind_conflict() {
        let backend = SimulatedBackend::new();
        create(&backend, "Thing", ResourceKind::Vpc, "10.1.0.0/16").unwrap();
        assert!(create(&backend, "Thing", ResourceKind::Subnet, "10.1.0.0/24").is_err());
    }

    #[test]
    fn test_address_publishes_allocation() {
        let backend = SimulatedBackend::new();
        let eip = create(&backend, "OnPrem-EIP", ResourceKind::ElasticAddress, "").unwrap();
        assert!(eip.provider_id.parse::<std::net::Ipv4Addr>().is_ok());
        assert!(eip.outputs[ALLOCATION_ID].starts_with("eipalloc-"));
    }

    #[test]
    fn test_failure_injection() {
        let backend = SimulatedBackend::new().fail_on(["Dev-VPC"]);
        let err = create(&backend, "Dev-VPC", ResourceKind::Vpc, "10.1.0.0/16").unwrap_err();
        assert!(err.to_string().contains("simulated failure"));
        assert!(backend.is_empty());
    }

    #[test]
    fn test_delete() {
        let backend = SimulatedBackend::new();
        let vpc = create(&backend, "Dev-VPC", ResourceKind::Vpc, "10.1.0.0/16").unwrap();
        assert!(backend.delete("Dev-VPC", ResourceKind::Vpc, "vpc-other").is_err());
        backend.delete("Dev-VPC", ResourceKind::Vpc, &vpc.provider_id).unwrap();
        assert!(backend.resource("Dev-VPC").is_none());
        assert!(backend.delete("Dev-VPC", ResourceKind::Vpc, &vpc.provider_id).is_err());
    }
}
