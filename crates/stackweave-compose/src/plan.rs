//! The resource plan and the append-only builder that assembles it.
//!
//! Components only ever append to a [`PlanBuilder`]. Every reference a
//! component makes is checked against what is already declared and
//! recorded as a dependency edge. [`PlanBuilder::finish`] validates the
//! result and freezes it into an immutable [`ResourcePlan`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use stackweave_common::error::{Result, StackweaveError};
use stackweave_common::types::{Protocol, ResourceId, ResourceKind, Visibility};

use crate::credentials::{CredentialHandle, CredentialStore, SecretString};
use crate::graph::DependencyGraph;
use crate::network::Network;
use crate::provision::{CacheResource, CacheSubnetGroup, DatabaseResource};
use crate::security::{IngressRule, Peer, SecurityBindings, SecurityGroup};
use crate::service::{AttributeRef, Service};

/// A resource declared in a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredResource {
    /// Logical id.
    pub id: ResourceId,
    /// Resource kind.
    pub kind: ResourceKind,
}

/// `dependent` cannot be provisioned before `dependency`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// Resource holding the reference.
    pub dependent: ResourceId,
    /// Referenced resource.
    pub dependency: ResourceId,
}

/// Append-only builder for a [`ResourcePlan`].
#[derive(Debug)]
pub struct PlanBuilder {
    stack_name: String,
    network: Option<Network>,
    security: SecurityBindings,
    credentials: CredentialStore,
    databases: Vec<DatabaseResource>,
    cache_subnet_groups: Vec<CacheSubnetGroup>,
    caches: Vec<CacheResource>,
    services: Vec<Service>,
    resources: Vec<DeclaredResource>,
    dependencies: Vec<Dependency>,
}

impl PlanBuilder {
    /// Starts an empty plan for the named stack.
    #[must_use]
    pub fn new(stack_name: impl Into<String>) -> Self {
        Self {
            stack_name: stack_name.into(),
            network: None,
            security: SecurityBindings::new(),
            credentials: CredentialStore::new(),
            databases: Vec::new(),
            cache_subnet_groups: Vec::new(),
            caches: Vec::new(),
            services: Vec::new(),
            resources: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    /// Returns `true` if a resource with this id has been declared.
    #[must_use]
    pub fn contains(&self, id: &ResourceId) -> bool {
        self.kind_of(id).is_some()
    }

    /// Returns the kind of a declared resource.
    #[must_use]
    pub fn kind_of(&self, id: &ResourceId) -> Option<ResourceKind> {
        self.resources.iter().find(|r| &r.id == id).map(|r| r.kind)
    }

    /// Checks that `id` is declared with the expected kind.
    ///
    /// # Errors
    ///
    /// Returns [`StackweaveError::DependencyOrder`] if `id` is not declared
    /// yet and [`StackweaveError::Config`] if it is declared with another kind.
    pub fn require(&self, requester: &ResourceId, id: &ResourceId, kind: ResourceKind) -> Result<()> {
        match self.kind_of(id) {
            Some(found) if found == kind => Ok(()),
            Some(found) => Err(StackweaveError::config(format!(
                "{requester} references {id} as a {kind}, but it is a {found}"
            ))),
            None => Err(StackweaveError::dependency_order(
                requester.as_str(),
                format!("{kind} {id}"),
            )),
        }
    }

    /// Checks that `network` is the network declared in this plan.
    ///
    /// # Errors
    ///
    /// Returns [`StackweaveError::DependencyOrder`] if it is not.
    pub fn require_network(&self, requester: &ResourceId, network: &Network) -> Result<()> {
        match &self.network {
            Some(declared) if declared.id == network.id => Ok(()),
            _ => Err(StackweaveError::dependency_order(
                requester.as_str(),
                format!("network {}", network.id),
            )),
        }
    }

    /// Security groups declared so far.
    #[must_use]
    pub const fn security(&self) -> &SecurityBindings {
        &self.security
    }

    /// Credential store of this plan.
    #[must_use]
    pub const fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Declares the network and its subnets.
    ///
    /// # Errors
    ///
    /// Returns [`StackweaveError::Config`] if a network is already declared.
    pub fn add_network(&mut self, network: Network) -> Result<&Network> {
        if let Some(existing) = &self.network {
            return Err(StackweaveError::config(format!(
                "network {} is already declared",
                existing.id
            )));
        }
        self.declare(&network.id, ResourceKind::Network, &[])?;
        for subnet in &network.subnets {
            self.declare(&subnet.id, ResourceKind::Subnet, &[&network.id])?;
        }
        tracing::debug!(network = %network.id, subnets = network.subnets.len(), "network declared");
        Ok(self.network.insert(network))
    }

    /// Creates an empty security group inside the declared network.
    ///
    /// # Errors
    ///
    /// Returns [`StackweaveError::DependencyOrder`] if no network is declared
    /// and [`StackweaveError::Config`] if the id is taken.
    pub fn create_security_group(
        &mut self,
        id: &ResourceId,
        owner: &ResourceId,
        description: impl Into<String>,
    ) -> Result<ResourceId> {
        let network = self
            .network
            .as_ref()
            .map(|n| n.id.clone())
            .ok_or_else(|| StackweaveError::dependency_order(id.as_str(), "network"))?;
        self.declare(id, ResourceKind::SecurityGroup, &[&network])?;
        let group = self
            .security
            .create(id.clone(), owner.clone(), network, description)?;
        tracing::debug!(group = %group.id, owner = %group.owner, "security group declared");
        Ok(group.id.clone())
    }

    /// Adds an ingress rule on `to` permitting traffic from `from`.
    ///
    /// # Errors
    ///
    /// Returns [`StackweaveError::DependencyOrder`] if either endpoint is not
    /// in the plan yet, and [`StackweaveError::Config`] if the rule's id is
    /// already taken by a resource of another kind.
    pub fn allow(
        &mut self,
        from: Peer,
        to: &ResourceId,
        port: u16,
        protocol: Protocol,
        description: impl Into<String>,
    ) -> Result<IngressRule> {
        if let Some(id) = self.security.rule_id(&from, to, port, protocol) {
            match self.kind_of(&id) {
                None | Some(ResourceKind::IngressRule) => {}
                Some(kind) => {
                    return Err(StackweaveError::config(format!(
                        "ingress rule id \"{id}\" on {to} is already declared as {kind}"
                    )));
                }
            }
        }
        let rule = self.security.allow(from, to, port, protocol, description)?;
        if self.kind_of(&rule.id).is_none() {
            let mut depends_on = vec![&rule.target];
            if let Some(source) = rule.source.security_group() {
                depends_on.push(source);
            }
            self.declare(&rule.id, ResourceKind::IngressRule, &depends_on)?;
        }
        Ok(rule)
    }

    /// Generates (once) the credential stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StackweaveError::Config`] if `id` is taken by another kind.
    pub fn generate_credential(&mut self, id: &ResourceId, username: &str) -> Result<CredentialHandle> {
        match self.kind_of(id) {
            None => self.declare(id, ResourceKind::Secret, &[])?,
            Some(ResourceKind::Secret) => {}
            Some(kind) => {
                return Err(StackweaveError::config(format!(
                    "cannot store a credential under {id}: it is a {kind}"
                )));
            }
        }
        Ok(self.credentials.generate(id, username))
    }

    /// Attaches a derived field to a generated credential.
    ///
    /// # Errors
    ///
    /// See [`CredentialStore::attach`].
    pub fn attach_secret_field(
        &mut self,
        handle: &CredentialHandle,
        field: &str,
        value: impl Into<String>,
    ) -> Result<()> {
        self.credentials.attach(handle, field, value)
    }

    /// Declares a database.
    ///
    /// # Errors
    ///
    /// Returns [`StackweaveError::DependencyOrder`] if its security group,
    /// credential, or subnets are not declared.
    pub fn add_database(&mut self, database: DatabaseResource) -> Result<()> {
        let mut depends_on = vec![&database.security_group, database.credential.id()];
        depends_on.extend(database.subnets.iter());
        self.declare(&database.id, ResourceKind::Database, &depends_on)?;
        self.databases.push(database);
        Ok(())
    }

    /// Declares a cache subnet group.
    ///
    /// # Errors
    ///
    /// Returns [`StackweaveError::DependencyOrder`] if a subnet is not declared.
    pub fn add_cache_subnet_group(&mut self, group: CacheSubnetGroup) -> Result<()> {
        let depends_on: Vec<&ResourceId> = group.subnets.iter().collect();
        self.declare(&group.id, ResourceKind::CacheSubnetGroup, &depends_on)?;
        self.cache_subnet_groups.push(group);
        Ok(())
    }

    /// Declares a cache.
    ///
    /// # Errors
    ///
    /// Returns [`StackweaveError::DependencyOrder`] if its subnet group or
    /// security group is not declared.
    pub fn add_cache(&mut self, cache: CacheResource) -> Result<()> {
        self.declare(
            &cache.id,
            ResourceKind::Cache,
            &[&cache.subnet_group, &cache.security_group],
        )?;
        self.caches.push(cache);
        Ok(())
    }

    /// Declares a service and its load balancer.
    ///
    /// # Errors
    ///
    /// Returns [`StackweaveError::DependencyOrder`] if its security group,
    /// subnets, or any environment source is not declared.
    pub fn add_service(&mut self, service: Service) -> Result<()> {
        let lb = &service.load_balancer;
        let mut lb_deps = vec![&service.security_group];
        lb_deps.extend(lb.subnets.iter());
        self.declare(&lb.id, ResourceKind::LoadBalancer, &lb_deps)?;

        let mut depends_on = vec![&service.security_group, &lb.id];
        depends_on.extend(service.subnets.iter());
        depends_on.extend(
            service
                .environment
                .iter()
                .filter_map(|b| b.source.as_ref())
                .map(|s| &s.resource),
        );
        self.declare(&service.id, ResourceKind::Service, &depends_on)?;
        self.services.push(service);
        Ok(())
    }

    /// Validates the assembled plan and freezes it.
    ///
    /// # Errors
    ///
    /// Returns [`StackweaveError::Config`] if no network was declared, or any
    /// error raised by [`crate::validator::validate`].
    pub fn finish(self) -> Result<ResourcePlan> {
        let network = self
            .network
            .ok_or_else(|| StackweaveError::config("plan has no network"))?;
        let plan = ResourcePlan {
            stack_name: self.stack_name,
            generated_at: Utc::now(),
            network,
            security_groups: self.security.groups().to_vec(),
            secrets: self.credentials,
            databases: self.databases,
            cache_subnet_groups: self.cache_subnet_groups,
            caches: self.caches,
            services: self.services,
            resources: self.resources,
            dependencies: self.dependencies,
        };
        crate::validator::validate(&plan)?;
        Ok(plan)
    }

    fn declare(&mut self, id: &ResourceId, kind: ResourceKind, depends_on: &[&ResourceId]) -> Result<()> {
        if let Some(existing) = self.kind_of(id) {
            return Err(StackweaveError::config(format!(
                "duplicate resource id \"{id}\" (already declared as {existing})"
            )));
        }
        if let Some(missing) = depends_on.iter().find(|dep| !self.contains(dep)) {
            return Err(StackweaveError::dependency_order(
                format!("{kind} {id}"),
                missing.as_str(),
            ));
        }
        self.resources.push(DeclaredResource {
            id: id.clone(),
            kind,
        });
        for dependency in depends_on {
            let edge = Dependency {
                dependent: id.clone(),
                dependency: (*dependency).clone(),
            };
            if !self.dependencies.contains(&edge) {
                self.dependencies.push(edge);
            }
        }
        Ok(())
    }
}

/// The finished, immutable resource graph.
#[derive(Debug, Clone, Serialize)]
pub struct ResourcePlan {
    stack_name: String,
    generated_at: DateTime<Utc>,
    network: Network,
    security_groups: Vec<SecurityGroup>,
    secrets: CredentialStore,
    databases: Vec<DatabaseResource>,
    cache_subnet_groups: Vec<CacheSubnetGroup>,
    caches: Vec<CacheResource>,
    services: Vec<Service>,
    resources: Vec<DeclaredResource>,
    dependencies: Vec<Dependency>,
}

impl ResourcePlan {
    /// Stack name.
    #[must_use]
    pub fn stack_name(&self) -> &str {
        &self.stack_name
    }

    /// When the plan was composed.
    #[must_use]
    pub const fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    /// The network.
    #[must_use]
    pub const fn network(&self) -> &Network {
        &self.network
    }

    /// Every security group, in creation order.
    #[must_use]
    pub fn security_groups(&self) -> &[SecurityGroup] {
        &self.security_groups
    }

    /// Looks up a security group.
    #[must_use]
    pub fn security_group(&self, id: &ResourceId) -> Option<&SecurityGroup> {
        self.security_groups.iter().find(|g| &g.id == id)
    }

    /// Every ingress rule in the plan.
    pub fn ingress_rules(&self) -> impl Iterator<Item = &IngressRule> {
        self.security_groups.iter().flat_map(|g| g.ingress().iter())
    }

    /// Declared databases.
    #[must_use]
    pub fn databases(&self) -> &[DatabaseResource] {
        &self.databases
    }

    /// Declared cache subnet groups.
    #[must_use]
    pub fn cache_subnet_groups(&self) -> &[CacheSubnetGroup] {
        &self.cache_subnet_groups
    }

    /// Declared caches.
    #[must_use]
    pub fn caches(&self) -> &[CacheResource] {
        &self.caches
    }

    /// Declared services.
    #[must_use]
    pub fn services(&self) -> &[Service] {
        &self.services
    }

    /// Every declared resource, in declaration order.
    #[must_use]
    pub fn resources(&self) -> &[DeclaredResource] {
        &self.resources
    }

    /// Every dependency edge.
    #[must_use]
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Returns `true` if the resource is part of this plan.
    #[must_use]
    pub fn contains(&self, id: &ResourceId) -> bool {
        self.resources.iter().any(|r| &r.id == id)
    }

    /// Returns the kind of a resource in this plan.
    #[must_use]
    pub fn kind_of(&self, id: &ResourceId) -> Option<ResourceKind> {
        self.resources.iter().find(|r| &r.id == id).map(|r| r.kind)
    }

    /// Reveals one field of a generated credential.
    ///
    /// # Errors
    ///
    /// Returns [`StackweaveError::SecretUnavailable`] if there is no such
    /// credential or field.
    pub fn secret_value(&self, handle: &CredentialHandle, field: &str) -> Result<SecretString> {
        self.secrets.reveal(handle, field)
    }

    /// Topological provisioning order: every resource after what it references.
    ///
    /// # Errors
    ///
    /// Returns [`StackweaveError::DependencyOrder`] on a cycle.
    pub fn deployment_order(&self) -> Result<Vec<ResourceId>> {
        let mut graph = DependencyGraph::new();
        for resource in &self.resources {
            let _ = graph.add_resource(&resource.id);
        }
        for edge in &self.dependencies {
            graph.add_dependency(&edge.dependent, &edge.dependency)?;
        }
        graph.resolve_order()
    }

    /// Credential-free structural description of the plan.
    #[must_use]
    pub fn shape(&self) -> PlanShape {
        let count = |v| self.network.subnets_of(v).count();
        PlanShape {
            availability_domains: self.network.availability_domains.len(),
            public_subnets: count(Visibility::Public),
            private_subnets: count(Visibility::Private),
            resources: self.resources.clone(),
            rules: self
                .ingress_rules()
                .map(|r| RuleShape {
                    target: r.target.clone(),
                    source: r.source.clone(),
                    port: r.port,
                    protocol: r.protocol,
                })
                .collect(),
            environment: self
                .services
                .iter()
                .flat_map(|s| {
                    s.environment.iter().map(|b| EnvShape {
                        service: s.id.clone(),
                        name: b.name.clone(),
                        source: b.source.clone(),
                    })
                })
                .collect(),
            dependencies: self.dependencies.clone(),
        }
    }

    /// SHA-256 hex digest of [`Self::shape`]. Equal for equal configurations.
    ///
    /// # Errors
    ///
    /// Returns [`StackweaveError::Serialization`] if the shape cannot be encoded.
    pub fn fingerprint(&self) -> Result<String> {
        let bytes = serde_json::to_vec(&self.shape())?;
        Ok(format!("{:x}", Sha256::digest(&bytes)))
    }

    /// Encodes the plan as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`StackweaveError::Serialization`] on encoding failure.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Structural shape of one ingress rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleShape {
    /// Group the rule is attached to.
    pub target: ResourceId,
    /// Traffic origin.
    pub source: Peer,
    /// Destination port.
    pub port: u16,
    /// Transport protocol.
    pub protocol: Protocol,
}

/// Structural shape of one environment binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvShape {
    /// Service the variable belongs to.
    pub service: ResourceId,
    /// Variable name.
    pub name: String,
    /// Resource attribute the value was resolved from.
    pub source: Option<AttributeRef>,
}

/// Everything about a plan except generated values and timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanShape {
    /// Number of availability domains.
    pub availability_domains: usize,
    /// Number of public subnets.
    pub public_subnets: usize,
    /// Number of private subnets.
    pub private_subnets: usize,
    /// Declared resources, in order.
    pub resources: Vec<DeclaredResource>,
    /// Ingress rules.
    pub rules: Vec<RuleShape>,
    /// Environment bindings.
    pub environment: Vec<EnvShape>,
    /// Dependency edges.
    pub dependencies: Vec<Dependency>,
}
