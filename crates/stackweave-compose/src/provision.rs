//! Managed database and cache declarations.
//!
//! The database sits in the public subnets and is publicly reachable. This
//! trades isolation for operational simplicity and holds only for this
//! topology. The cache sits in the private subnets of every domain.

use serde::Serialize;
use stackweave_common::config::{CacheSettings, DatabaseSettings};
use stackweave_common::constants::DATABASE_STORAGE_GIB;
use stackweave_common::error::{Result, StackweaveError};
use stackweave_common::types::{Endpoint, ResourceId, ResourceKind, Visibility};

use crate::credentials::{CredentialHandle, CredentialStore, SecretString};
use crate::network::Network;
use crate::plan::PlanBuilder;

/// Secret field holding the engine name.
pub const FIELD_ENGINE: &str = "engine";
/// Secret field holding the endpoint host.
pub const FIELD_HOST: &str = "host";
/// Secret field holding the endpoint port.
pub const FIELD_PORT: &str = "port";
/// Secret field holding the logical database name.
pub const FIELD_DBNAME: &str = "dbname";

/// The managed relational database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseResource {
    /// Logical id.
    pub id: ResourceId,
    /// Engine name.
    pub engine: String,
    /// Engine version.
    pub engine_version: String,
    /// Instance class.
    pub instance_class: String,
    /// Logical database name.
    pub name: String,
    /// Allocated storage in GiB.
    pub allocated_storage_gib: u32,
    /// Whether the instance has a public address.
    pub publicly_accessible: bool,
    /// Subnet tier the instance is placed in.
    pub placement: Visibility,
    /// Subnets the instance may be placed in.
    pub subnets: Vec<ResourceId>,
    /// Owning security group.
    pub security_group: ResourceId,
    /// Generated master credential.
    pub credential: CredentialHandle,
    /// Derived endpoint.
    pub endpoint: Endpoint,
}

impl DatabaseResource {
    /// Reveals one field of the database's credential.
    ///
    /// # Errors
    ///
    /// Returns [`StackweaveError::SecretUnavailable`] if the credential has
    /// not been generated in `store` or has no such field.
    pub fn secret_value(&self, store: &CredentialStore, field: &str) -> Result<SecretString> {
        store.reveal(&self.credential, field)
    }
}

/// Subnet group a cache is launched into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheSubnetGroup {
    /// Logical id.
    pub id: ResourceId,
    /// Human-readable description.
    pub description: String,
    /// Member subnets.
    pub subnets: Vec<ResourceId>,
}

/// The managed in-memory cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheResource {
    /// Logical id.
    pub id: ResourceId,
    /// Engine name.
    pub engine: String,
    /// Node type.
    pub node_type: String,
    /// Number of nodes.
    pub node_count: u32,
    /// Subnet tier; always private.
    pub placement: Visibility,
    /// Subnet group the cluster is launched into.
    pub subnet_group: ResourceId,
    /// Subnets of that group.
    pub subnets: Vec<ResourceId>,
    /// Owning security group.
    pub security_group: ResourceId,
    /// Derived endpoint.
    pub endpoint: Endpoint,
}

/// Declares the database with default settings and the given name.
///
/// # Errors
///
/// See [`provision_database_with`].
pub fn provision_database(
    plan: &mut PlanBuilder,
    network: &Network,
    security_group: &ResourceId,
    name: &str,
) -> Result<DatabaseResource> {
    let settings = DatabaseSettings {
        name: name.to_owned(),
        ..DatabaseSettings::default()
    };
    provision_database_with(plan, network, security_group, &settings)
}

/// Declares the database and generates its credential.
///
/// # Errors
///
/// Returns [`StackweaveError::DependencyOrder`] if the network or security
/// group is not in the plan, and [`StackweaveError::Config`] on invalid
/// settings.
pub fn provision_database_with(
    plan: &mut PlanBuilder,
    network: &Network,
    security_group: &ResourceId,
    settings: &DatabaseSettings,
) -> Result<DatabaseResource> {
    let id = ResourceId::new(&settings.id);
    if settings.name.trim().is_empty() {
        return Err(StackweaveError::config(format!("database {id} has no name")));
    }
    if settings.allocated_storage_gib < DATABASE_STORAGE_GIB {
        return Err(StackweaveError::config(format!(
            "database {id} storage {} GiB is below the {DATABASE_STORAGE_GIB} GiB minimum",
            settings.allocated_storage_gib
        )));
    }
    plan.require_network(&id, network)?;
    plan.require(&id, security_group, ResourceKind::SecurityGroup)?;

    let placement = if settings.publicly_accessible {
        Visibility::Public
    } else {
        Visibility::Private
    };
    let endpoint = Endpoint::new(
        format!("{}.{}.db.internal", id.as_str().to_lowercase(), network.region),
        settings.port,
    );

    let credential = plan.generate_credential(&id.child("Secret"), &settings.username)?;
    plan.attach_secret_field(&credential, FIELD_ENGINE, settings.engine.as_str())?;
    plan.attach_secret_field(&credential, FIELD_HOST, endpoint.host.as_str())?;
    plan.attach_secret_field(&credential, FIELD_PORT, endpoint.port.to_string())?;
    plan.attach_secret_field(&credential, FIELD_DBNAME, settings.name.as_str())?;

    let database = DatabaseResource {
        id,
        engine: settings.engine.clone(),
        engine_version: settings.engine_version.clone(),
        instance_class: settings.instance_class.clone(),
        name: settings.name.clone(),
        allocated_storage_gib: settings.allocated_storage_gib,
        publicly_accessible: settings.publicly_accessible,
        placement,
        subnets: network.subnet_ids(placement),
        security_group: security_group.clone(),
        credential,
        endpoint,
    };
    plan.add_database(database.clone())?;
    tracing::info!(
        database = %database.id,
        placement = %database.placement,
        port = database.endpoint.port,
        "database provisioned"
    );
    Ok(database)
}

/// Declares the cache with default settings and the given node layout.
///
/// # Errors
///
/// See [`provision_cache_with`].
pub fn provision_cache(
    plan: &mut PlanBuilder,
    network: &Network,
    security_group: &ResourceId,
    node_count: u32,
    node_type: &str,
) -> Result<CacheResource> {
    let settings = CacheSettings {
        node_count,
        node_type: node_type.to_owned(),
        ..CacheSettings::default()
    };
    provision_cache_with(plan, network, security_group, &settings)
}

/// Declares the cache and its subnet group over every private subnet.
///
/// # Errors
///
/// Returns [`StackweaveError::DependencyOrder`] if the network or security
/// group is not in the plan, and [`StackweaveError::Config`] on invalid
/// settings.
pub fn provision_cache_with(
    plan: &mut PlanBuilder,
    network: &Network,
    security_group: &ResourceId,
    settings: &CacheSettings,
) -> Result<CacheResource> {
    let id = ResourceId::new(&settings.id);
    if settings.node_count < 1 {
        return Err(StackweaveError::config(format!(
            "cache {id} needs at least one node"
        )));
    }
    if settings.node_type.trim().is_empty() {
        return Err(StackweaveError::config(format!("cache {id} has no node type")));
    }
    plan.require_network(&id, network)?;
    plan.require(&id, security_group, ResourceKind::SecurityGroup)?;

    let subnets = network.subnet_ids(Visibility::Private);
    if subnets.is_empty() {
        return Err(StackweaveError::config(format!(
            "network {} has no private subnets for cache {id}",
            network.id
        )));
    }
    let subnet_group = CacheSubnetGroup {
        id: id.child("SubnetGroup"),
        description: settings.subnet_group_description.clone(),
        subnets: subnets.clone(),
    };
    let subnet_group_id = subnet_group.id.clone();
    plan.add_cache_subnet_group(subnet_group)?;

    let cache = CacheResource {
        endpoint: Endpoint::new(
            format!("{}.{}.cache.internal", id.as_str().to_lowercase(), network.region),
            settings.port,
        ),
        id,
        engine: settings.engine.clone(),
        node_type: settings.node_type.clone(),
        node_count: settings.node_count,
        placement: Visibility::Private,
        subnet_group: subnet_group_id,
        subnets,
        security_group: security_group.clone(),
    };
    plan.add_cache(cache.clone())?;
    tracing::info!(
        cache = %cache.id,
        nodes = cache.node_count,
        port = cache.endpoint.port,
        "cache provisioned"
    );
    Ok(cache)
}
