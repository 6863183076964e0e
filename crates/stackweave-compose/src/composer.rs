//! Topology composition entry point.
//!
//! Steps run in a fixed order, because each step's output feeds a later
//! step's security rule:
//!
//! 1. network
//! 2. database and cache, each with its own security group
//! 3. service, with the database and cache endpoints in its environment
//! 4. ingress rules: database from any address, cache from the service
//!
//! Adding the cache ingress rule before the service's security group exists
//! fails with [`StackweaveError::DependencyOrder`]; it is never skipped.
//!
//! [`StackweaveError::DependencyOrder`]: stackweave_common::error::StackweaveError::DependencyOrder

use stackweave_common::config::{Config, TopologySettings};
use stackweave_common::error::Result;
use stackweave_common::types::{Protocol, ResourceId};

use crate::network::build_network_with;
use crate::plan::{PlanBuilder, ResourcePlan};
use crate::provision::{CacheResource, DatabaseResource, provision_cache_with, provision_database_with};
use crate::security::{IngressRule, Peer};
use crate::service::{compose_service_with, resolve_environment};

/// Composes the full topology with default settings.
///
/// # Errors
///
/// See [`compose_with`].
pub fn compose(config: &Config) -> Result<ResourcePlan> {
    compose_with(config, &TopologySettings::default())
}

/// Composes the full topology.
///
/// The configuration is validated before anything is declared, so an
/// invalid configuration never yields a partial plan.
///
/// # Errors
///
/// Returns [`StackweaveError::Config`] on invalid input and
/// [`StackweaveError::DependencyOrder`] if a step references something not
/// yet declared.
///
/// [`StackweaveError::Config`]: stackweave_common::error::StackweaveError::Config
/// [`StackweaveError::DependencyOrder`]: stackweave_common::error::StackweaveError::DependencyOrder
pub fn compose_with(config: &Config, settings: &TopologySettings) -> Result<ResourcePlan> {
    config.validate()?;
    tracing::info!(stack = %settings.network.stack_name, "composing topology");

    let mut plan = PlanBuilder::new(settings.network.stack_name.as_str());
    let network = plan.add_network(build_network_with(&settings.network)?)?.clone();

    let database_group = plan.create_security_group(
        &ResourceId::new(&settings.database.security_group_id),
        &ResourceId::new(&settings.database.id),
        format!("Security group for {}", settings.database.engine),
    )?;
    let database = provision_database_with(&mut plan, &network, &database_group, &settings.database)?;

    let cache_group = plan.create_security_group(
        &ResourceId::new(&settings.cache.security_group_id),
        &ResourceId::new(&settings.cache.id),
        format!("Security group for {}", settings.cache.engine),
    )?;
    let cache = provision_cache_with(&mut plan, &network, &cache_group, &settings.cache)?;

    let environment = resolve_environment(&plan, &database, &cache)?;
    let service = compose_service_with(
        &mut plan,
        &network,
        &config.image_url,
        environment,
        &settings.service,
    )?;

    let _ = bind_database_ingress(&mut plan, &database)?;
    let _ = bind_cache_ingress(&mut plan, &cache, &service.security_group)?;

    let plan = plan.finish()?;
    tracing::info!(
        stack = %plan.stack_name(),
        resources = plan.resources().len(),
        rules = plan.ingress_rules().count(),
        "topology composed"
    );
    Ok(plan)
}

/// Opens the database port to any IPv4 address.
///
/// This is a relaxed posture kept for this topology only.
///
/// # Errors
///
/// Returns [`StackweaveError::DependencyOrder`] if the database's security
/// group is not in the plan.
///
/// [`StackweaveError::DependencyOrder`]: stackweave_common::error::StackweaveError::DependencyOrder
pub fn bind_database_ingress(plan: &mut PlanBuilder, database: &DatabaseResource) -> Result<IngressRule> {
    let rule = plan.allow(
        Peer::any_ipv4(),
        &database.security_group,
        database.endpoint.port,
        Protocol::Tcp,
        "Allow server to PostgreSQL",
    )?;
    tracing::debug!(rule = %rule.id, port = rule.port, "database ingress bound");
    Ok(rule)
}

/// Opens the cache port to the service's security group only.
///
/// # Errors
///
/// Returns [`StackweaveError::DependencyOrder`] if the service's or the
/// cache's security group is not in the plan.
///
/// [`StackweaveError::DependencyOrder`]: stackweave_common::error::StackweaveError::DependencyOrder
pub fn bind_cache_ingress(
    plan: &mut PlanBuilder,
    cache: &CacheResource,
    service_security_group: &ResourceId,
) -> Result<IngressRule> {
    let rule = plan.allow(
        Peer::group(service_security_group),
        &cache.security_group,
        cache.endpoint.port,
        Protocol::Tcp,
        "Allow server to Redis",
    )?;
    tracing::debug!(rule = %rule.id, port = rule.port, "cache ingress bound");
    Ok(rule)
}
