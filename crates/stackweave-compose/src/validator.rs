//! Static analysis of an assembled plan.
//!
//! Runs before a plan is handed out, so an executor never receives a plan
//! with dangling references or a lopsided network.

use std::collections::HashSet;

use stackweave_common::error::{Result, StackweaveError};
use stackweave_common::types::{ResourceId, ResourceKind, Visibility};

use crate::plan::ResourcePlan;

/// Fewest availability domains a composed plan may span.
pub const MIN_AVAILABILITY_DOMAINS: usize = 2;

/// Validates a plan for structural correctness.
///
/// # Checks performed
///
/// 1. No duplicate resource ids.
/// 2. The network spans at least two domains, each with one public and one
///    private subnet.
/// 3. Every dependency edge joins two declared resources.
/// 4. Every ingress rule's target and source group exist.
/// 5. Every environment value resolved from a resource names a resource in
///    the plan and is non-empty.
/// 6. Caches sit in private subnets only; databases sit in the tier they
///    declare.
///
/// # Errors
///
/// Returns [`StackweaveError::Config`] for malformed structure and
/// [`StackweaveError::DependencyOrder`] for dangling references.
pub fn validate(plan: &ResourcePlan) -> Result<()> {
    tracing::debug!(resources = plan.resources().len(), "validating plan");
    check_unique_ids(plan)?;
    check_network_tiers(plan)?;
    check_dependencies(plan)?;
    check_rule_endpoints(plan)?;
    check_environment_sources(plan)?;
    check_placement(plan)?;
    Ok(())
}

fn check_unique_ids(plan: &ResourcePlan) -> Result<()> {
    let mut seen = HashSet::new();
    for resource in plan.resources() {
        if !seen.insert(&resource.id) {
            return Err(StackweaveError::config(format!(
                "duplicate resource id: \"{}\"",
                resource.id
            )));
        }
    }
    Ok(())
}

fn check_network_tiers(plan: &ResourcePlan) -> Result<()> {
    let network = plan.network();
    let domains = &network.availability_domains;
    if domains.len() < MIN_AVAILABILITY_DOMAINS {
        return Err(StackweaveError::config(format!(
            "network {} spans {} availability domain(s); at least {MIN_AVAILABILITY_DOMAINS} required",
            network.id,
            domains.len()
        )));
    }
    for domain in domains {
        for tier in [Visibility::Public, Visibility::Private] {
            let count = network
                .subnets_of(tier)
                .filter(|s| &s.availability_domain == domain)
                .count();
            if count != 1 {
                return Err(StackweaveError::config(format!(
                    "availability domain {domain} has {count} {tier} subnet(s); expected 1"
                )));
            }
        }
    }
    Ok(())
}

fn check_dependencies(plan: &ResourcePlan) -> Result<()> {
    for edge in plan.dependencies() {
        for id in [&edge.dependent, &edge.dependency] {
            if !plan.contains(id) {
                return Err(StackweaveError::dependency_order(
                    format!("edge {} -> {}", edge.dependent, edge.dependency),
                    id.as_str(),
                ));
            }
        }
    }
    Ok(())
}

fn check_rule_endpoints(plan: &ResourcePlan) -> Result<()> {
    for rule in plan.ingress_rules() {
        let endpoints = std::iter::once(&rule.target).chain(rule.source.security_group());
        for group in endpoints {
            if plan.kind_of(group) != Some(ResourceKind::SecurityGroup) {
                return Err(StackweaveError::dependency_order(
                    rule.id.as_str(),
                    format!("security-group {group}"),
                ));
            }
        }
    }
    Ok(())
}

fn check_environment_sources(plan: &ResourcePlan) -> Result<()> {
    for service in plan.services() {
        for binding in service.environment.iter() {
            let Some(source) = &binding.source else {
                continue;
            };
            if !plan.contains(&source.resource) {
                return Err(StackweaveError::dependency_order(
                    format!("{} variable {}", service.id, binding.name),
                    source.resource.as_str(),
                ));
            }
            if binding.value.expose().is_empty() {
                return Err(StackweaveError::config(format!(
                    "{} variable {} resolved from {source} is empty",
                    service.id, binding.name
                )));
            }
        }
    }
    Ok(())
}

fn check_placement(plan: &ResourcePlan) -> Result<()> {
    let network = plan.network();
    let tier_of = |id: &ResourceId| network.subnet(id).map(|s| s.visibility);
    for cache in plan.caches() {
        if let Some(subnet) = cache
            .subnets
            .iter()
            .find(|&s| tier_of(s) != Some(Visibility::Private))
        {
            return Err(StackweaveError::config(format!(
                "cache {} is placed in non-private subnet {subnet}",
                cache.id
            )));
        }
    }
    for database in plan.databases() {
        if let Some(subnet) = database
            .subnets
            .iter()
            .find(|&s| tier_of(s) != Some(database.placement))
        {
            return Err(StackweaveError::config(format!(
                "database {} declares {} placement but uses subnet {subnet}",
                database.id, database.placement
            )));
        }
    }
    Ok(())
}
