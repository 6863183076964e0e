//! End-to-end tests for topology composition.
//!
//! These tests drive the public entry point and check the finished plan:
//! 1. Full scenario (resources, placement, ports, health check, replicas)
//! 2. Environment resolution
//! 3. Ingress rule asymmetry
//! 4. Ordering violations
//! 5. Input validation
//! 6. Structural determinism across runs
//! 7. Deployment order

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use stackweave_common::config::Config;
use stackweave_common::constants::env;
use stackweave_common::error::StackweaveError;
use stackweave_common::types::{Protocol, ResourceId, ResourceKind, Visibility};
use stackweave_compose::composer::{bind_cache_ingress, bind_database_ingress};
use stackweave_compose::credentials::FIELD_PASSWORD;
use stackweave_compose::network::build_network;
use stackweave_compose::plan::PlanBuilder;
use stackweave_compose::provision::{provision_cache, provision_database};
use stackweave_compose::security::Peer;
use stackweave_compose::{ResourcePlan, compose};

fn plan() -> ResourcePlan {
    compose(&Config::new("repo/image:tag")).expect("should compose")
}

fn position(order: &[ResourceId], id: &ResourceId) -> usize {
    order
        .iter()
        .position(|r| r == id)
        .unwrap_or_else(|| panic!("{id} missing from deployment order"))
}

// ── Scenario ─────────────────────────────────────────────────────────

#[test]
fn scenario_full_topology() {
    let plan = plan();
    let network = plan.network();

    assert_eq!(plan.databases().len(), 1);
    let db = &plan.databases()[0];
    assert_eq!(db.placement, Visibility::Public);
    assert_eq!(db.subnets, network.subnet_ids(Visibility::Public));
    assert_eq!(db.endpoint.port, 5432);

    assert_eq!(plan.caches().len(), 1);
    let cache = &plan.caches()[0];
    assert_eq!(cache.placement, Visibility::Private);
    assert_eq!(cache.subnets, network.subnet_ids(Visibility::Private));
    assert_eq!(cache.endpoint.port, 6379);
    assert_eq!(cache.node_count, 1);

    assert_eq!(plan.services().len(), 1);
    let service = &plan.services()[0];
    assert_eq!(service.image, "repo/image:tag");
    assert_eq!(service.container_port, 8080);
    assert_eq!(service.desired_count, 1);
    assert_eq!(service.limits.memory_mib, 512);
    assert_eq!(service.limits.cpu_units, 256);
    assert_eq!(service.load_balancer.health_check.path, "/health");
    assert!(service.load_balancer.public);
    assert_eq!(service.subnets, network.subnet_ids(Visibility::Private));

    assert_eq!(plan.ingress_rules().count(), 2);
}

#[test]
fn scenario_network_has_four_subnets_over_two_domains() {
    let plan = plan();
    let shape = plan.shape();
    assert_eq!(shape.availability_domains, 2);
    assert_eq!(shape.public_subnets, 2);
    assert_eq!(shape.private_subnets, 2);
    assert_eq!(plan.network().subnets.len(), 4);
}

#[test]
fn scenario_cache_subnet_group_spans_every_private_subnet() {
    let plan = plan();
    let group = &plan.cache_subnet_groups()[0];
    assert_eq!(group.subnets, plan.network().subnet_ids(Visibility::Private));
    assert_eq!(plan.caches()[0].subnet_group, group.id);
}

// ── Environment ──────────────────────────────────────────────────────

#[test]
fn environment_sourced_values_are_non_empty() {
    let plan = plan();
    let service = &plan.services()[0];
    for binding in service.environment.iter().filter(|b| b.source.is_some()) {
        assert!(
            !binding.value.expose().is_empty(),
            "{} resolved to an empty value",
            binding.name
        );
    }
}

#[test]
fn environment_carries_resolved_endpoints() {
    let plan = plan();
    let db = &plan.databases()[0];
    let cache = &plan.caches()[0];
    let environment = &plan.services()[0].environment;
    let value = |name: &str| {
        environment
            .get(name)
            .unwrap_or_else(|| panic!("{name} missing"))
            .value
            .expose()
            .to_owned()
    };

    assert_eq!(value(env::DB_HOST), db.endpoint.host);
    assert_eq!(value(env::DB_USER), "postgres");
    assert_eq!(value(env::DB_NAME), "gowit");
    assert_eq!(value(env::DB_PORT), "5432");
    assert_eq!(value(env::REDIS_ADDR), format!("{}:6379", cache.endpoint.host));
    assert_eq!(value(env::REDIS_PASS), "");
}

#[test]
fn environment_password_matches_generated_credential() {
    let plan = plan();
    let db = &plan.databases()[0];
    let binding = plan.services()[0]
        .environment
        .get(env::DB_PASSWORD)
        .expect("DB_PASSWORD");
    assert!(binding.value.is_sensitive());
    let secret = plan
        .secret_value(&db.credential, FIELD_PASSWORD)
        .expect("password");
    assert_eq!(binding.value.expose(), secret.expose_secret());
    assert!(!binding.value.to_string().contains(secret.expose_secret()));
}

// ── Ingress rules ────────────────────────────────────────────────────

#[test]
fn rules_are_asymmetric() {
    let plan = plan();
    let db = &plan.databases()[0];
    let cache = &plan.caches()[0];
    let service = &plan.services()[0];

    let db_rule = plan
        .ingress_rules()
        .find(|r| r.target == db.security_group)
        .expect("database rule");
    assert_eq!(db_rule.source, Peer::any_ipv4());
    assert_eq!(db_rule.port, 5432);
    assert_eq!(db_rule.protocol, Protocol::Tcp);

    let cache_rule = plan
        .ingress_rules()
        .find(|r| r.target == cache.security_group)
        .expect("cache rule");
    assert_eq!(cache_rule.source, Peer::group(&service.security_group));
    assert_eq!(cache_rule.port, 6379);
    assert_eq!(cache_rule.protocol, Protocol::Tcp);
}

#[test]
fn security_groups_allow_all_outbound() {
    let plan = plan();
    assert_eq!(plan.security_groups().len(), 3);
    assert!(plan.security_groups().iter().all(|g| g.allow_all_outbound));
}

// ── Ordering violations ──────────────────────────────────────────────

#[test]
fn cache_ingress_before_service_is_dependency_error() {
    let mut builder = PlanBuilder::new("OrderingStack");
    let network = builder
        .add_network(build_network(2).expect("network"))
        .expect("add network")
        .clone();
    let cache_group = builder
        .create_security_group(
            &ResourceId::new("CacheSecurityGroup"),
            &ResourceId::new("RedisCluster"),
            "cache",
        )
        .expect("cache group");
    let cache = provision_cache(&mut builder, &network, &cache_group, 1, "cache.t3.micro")
        .expect("cache");

    let err = bind_cache_ingress(&mut builder, &cache, &ResourceId::new("AppServiceSecurityGroup"))
        .unwrap_err();
    assert!(
        matches!(err, StackweaveError::DependencyOrder { .. }),
        "expected dependency error, got: {err}"
    );
}

#[test]
fn database_ingress_before_its_group_is_dependency_error() {
    let mut builder = PlanBuilder::new("OrderingStack");
    let network = builder
        .add_network(build_network(2).expect("network"))
        .expect("add network")
        .clone();
    let group = builder
        .create_security_group(
            &ResourceId::new("DatabaseSecurityGroup"),
            &ResourceId::new("PostgresInstance"),
            "database",
        )
        .expect("group");
    let mut db = provision_database(&mut builder, &network, &group, "gowit").expect("db");
    db.security_group = ResourceId::new("NotDeclared");

    let err = bind_database_ingress(&mut builder, &db).unwrap_err();
    assert!(matches!(err, StackweaveError::DependencyOrder { .. }), "got: {err}");
}

#[test]
fn database_on_undeclared_group_is_dependency_error() {
    let mut builder = PlanBuilder::new("OrderingStack");
    let network = builder
        .add_network(build_network(2).expect("network"))
        .expect("add network")
        .clone();
    let err = provision_database(&mut builder, &network, &ResourceId::new("Missing"), "gowit")
        .unwrap_err();
    assert!(matches!(err, StackweaveError::DependencyOrder { .. }), "got: {err}");
}

// ── Input validation ─────────────────────────────────────────────────

#[test]
fn empty_image_is_config_error() {
    let err = compose(&Config::new("")).unwrap_err();
    assert!(matches!(err, StackweaveError::Config { .. }), "got: {err}");
}

#[test]
fn blank_image_is_config_error() {
    let err = compose(&Config::new("   ")).unwrap_err();
    assert!(matches!(err, StackweaveError::Config { .. }), "got: {err}");
}

#[test]
fn zero_domains_is_config_error() {
    let err = build_network(0).unwrap_err();
    assert!(matches!(err, StackweaveError::Config { .. }), "got: {err}");
}

// ── Determinism ──────────────────────────────────────────────────────

#[test]
fn repeated_compose_is_structurally_equal() {
    let first = plan();
    let second = plan();
    assert_eq!(first.shape(), second.shape());
    assert_eq!(
        first.fingerprint().expect("fingerprint"),
        second.fingerprint().expect("fingerprint")
    );

    let password = |p: &ResourcePlan| {
        let db = &p.databases()[0];
        p.secret_value(&db.credential, FIELD_PASSWORD)
            .expect("password")
            .expose_secret()
            .to_owned()
    };
    assert_ne!(password(&first), password(&second));
}

#[test]
fn different_image_keeps_fingerprint() {
    let a = plan();
    let b = compose(&Config::new("repo/other:v2")).expect("plan");
    assert_eq!(a.fingerprint().expect("a"), b.fingerprint().expect("b"));
}

// ── Deployment order ─────────────────────────────────────────────────

#[test]
fn deployment_order_respects_references() {
    let plan = plan();
    let order = plan.deployment_order().expect("acyclic");
    assert_eq!(order.len(), plan.resources().len());

    let network = &plan.network().id;
    let db = &plan.databases()[0];
    let cache = &plan.caches()[0];
    let service = &plan.services()[0];
    let cache_rule = plan
        .ingress_rules()
        .find(|r| r.target == cache.security_group)
        .expect("cache rule");

    assert!(position(&order, network) < position(&order, &db.id));
    assert!(position(&order, db.credential.id()) < position(&order, &db.id));
    assert!(position(&order, &cache.subnet_group) < position(&order, &cache.id));
    assert!(position(&order, &db.id) < position(&order, &service.id));
    assert!(position(&order, &cache.id) < position(&order, &service.id));
    assert!(position(&order, &service.load_balancer.id) < position(&order, &service.id));
    assert!(position(&order, &service.security_group) < position(&order, &cache_rule.id));
}

#[test]
fn every_resource_kind_is_declared() {
    let plan = plan();
    let kinds: Vec<ResourceKind> = plan.resources().iter().map(|r| r.kind).collect();
    for kind in [
        ResourceKind::Network,
        ResourceKind::Subnet,
        ResourceKind::SecurityGroup,
        ResourceKind::IngressRule,
        ResourceKind::Secret,
        ResourceKind::Database,
        ResourceKind::CacheSubnetGroup,
        ResourceKind::Cache,
        ResourceKind::LoadBalancer,
        ResourceKind::Service,
    ] {
        assert!(kinds.contains(&kind), "{kind} missing");
    }
}
