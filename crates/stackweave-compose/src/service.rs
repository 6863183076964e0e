//! The load-balanced container service and its runtime environment.
//!
//! Environment values are resolved while composing, from attributes of
//! resources already in the plan. Each value remembers which attribute it
//! came from so the plan can be checked for dangling references.
//!
//! `DB_PASSWORD` is handed to the container as a plaintext environment
//! variable, with no rotation or scoping. This is a reduced-security
//! posture kept deliberately for this topology.

use std::fmt;

use serde::Serialize;
use stackweave_common::config::{ServiceSettings, validate_image};
use stackweave_common::constants::env;
use stackweave_common::error::{Result, StackweaveError};
use stackweave_common::types::{ResourceId, ResourceKind, ResourceLimits, Visibility};

use crate::credentials::{FIELD_PASSWORD, FIELD_USERNAME, SecretString};
use crate::network::Network;
use crate::plan::PlanBuilder;
use crate::provision::{CacheResource, DatabaseResource};

/// A named attribute of a declared resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AttributeRef {
    /// Resource the attribute belongs to.
    pub resource: ResourceId,
    /// Attribute name, e.g. `endpoint.host`.
    pub attribute: String,
}

impl AttributeRef {
    /// Creates an attribute reference.
    #[must_use]
    pub fn new(resource: &ResourceId, attribute: &str) -> Self {
        Self {
            resource: resource.clone(),
            attribute: attribute.to_owned(),
        }
    }
}

impl fmt::Display for AttributeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource, self.attribute)
    }
}

/// Value of an environment variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "value")]
pub enum EnvValue {
    /// Ordinary value.
    Plain(String),
    /// Credential material.
    Sensitive(SecretString),
}

impl EnvValue {
    /// Returns the raw value.
    #[must_use]
    pub fn expose(&self) -> &str {
        match self {
            Self::Plain(value) => value,
            Self::Sensitive(secret) => secret.expose_secret(),
        }
    }

    /// Returns `true` for credential material.
    #[must_use]
    pub const fn is_sensitive(&self) -> bool {
        matches!(self, Self::Sensitive(_))
    }
}

impl fmt::Display for EnvValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(value) => f.write_str(value),
            Self::Sensitive(secret) => write!(f, "{secret}"),
        }
    }
}

/// One environment variable of the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvBinding {
    /// Variable name.
    pub name: String,
    /// Resolved value.
    pub value: EnvValue,
    /// Attribute the value was resolved from; `None` for literals.
    pub source: Option<AttributeRef>,
}

/// Ordered, name-unique set of environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Environment {
    bindings: Vec<EnvBinding>,
}

impl Environment {
    /// Creates an empty environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a literal value.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.insert(name, EnvValue::Plain(value.into()), None);
    }

    /// Sets a value resolved from a resource attribute.
    pub fn bind(&mut self, name: &str, value: EnvValue, source: AttributeRef) {
        self.insert(name, value, Some(source));
    }

    /// Looks up a variable.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&EnvBinding> {
        self.bindings.iter().find(|b| b.name == name)
    }

    /// Iterates over the variables in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &EnvBinding> {
        self.bindings.iter()
    }

    /// Number of variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns `true` if there are no variables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    fn insert(&mut self, name: &str, value: EnvValue, source: Option<AttributeRef>) {
        let binding = EnvBinding {
            name: name.to_owned(),
            value,
            source,
        };
        match self.bindings.iter_mut().find(|b| b.name == name) {
            Some(existing) => *existing = binding,
            None => self.bindings.push(binding),
        }
    }
}

/// Load balancer health check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    /// HTTP path polled.
    pub path: String,
    /// Port checked on each task.
    pub port: u16,
}

/// Application load balancer in front of the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadBalancer {
    /// Logical id.
    pub id: ResourceId,
    /// Whether it is internet-facing.
    pub public: bool,
    /// Listener port.
    pub listener_port: u16,
    /// Container port traffic is forwarded to.
    pub target_port: u16,
    /// Subnets the load balancer is placed in.
    pub subnets: Vec<ResourceId>,
    /// Target group health check.
    pub health_check: HealthCheck,
}

/// The container-backed, load-balanced service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Service {
    /// Logical id.
    pub id: ResourceId,
    /// Container image reference.
    pub image: String,
    /// Port the container listens on.
    pub container_port: u16,
    /// Desired replica count.
    pub desired_count: u32,
    /// Task resource limits.
    pub limits: ResourceLimits,
    /// Runtime environment.
    pub environment: Environment,
    /// Security group created by the load balancer wiring.
    pub security_group: ResourceId,
    /// Subnets the tasks run in.
    pub subnets: Vec<ResourceId>,
    /// Load balancer in front of the tasks.
    pub load_balancer: LoadBalancer,
}

/// Resolves the service environment from the database and cache.
///
/// # Errors
///
/// Returns [`StackweaveError::DependencyOrder`] if either resource is not
/// in the plan, and [`StackweaveError::SecretUnavailable`] if the database
/// credential cannot be revealed.
pub fn resolve_environment(
    plan: &PlanBuilder,
    database: &DatabaseResource,
    cache: &CacheResource,
) -> Result<Environment> {
    let requester = ResourceId::new("environment");
    plan.require(&requester, &database.id, ResourceKind::Database)?;
    plan.require(&requester, &cache.id, ResourceKind::Cache)?;

    let store = plan.credentials();
    let secret = database.credential.id();
    let username = database.secret_value(store, FIELD_USERNAME)?;
    let password = database.secret_value(store, FIELD_PASSWORD)?;

    let mut environment = Environment::new();
    environment.bind(
        env::DB_HOST,
        EnvValue::Plain(database.endpoint.host.clone()),
        AttributeRef::new(&database.id, "endpoint.host"),
    );
    environment.bind(
        env::DB_USER,
        EnvValue::Plain(username.expose_secret().to_owned()),
        AttributeRef::new(secret, FIELD_USERNAME),
    );
    environment.bind(
        env::DB_PASSWORD,
        EnvValue::Sensitive(password),
        AttributeRef::new(secret, FIELD_PASSWORD),
    );
    environment.bind(
        env::DB_NAME,
        EnvValue::Plain(database.name.clone()),
        AttributeRef::new(&database.id, "name"),
    );
    environment.bind(
        env::DB_PORT,
        EnvValue::Plain(database.endpoint.port.to_string()),
        AttributeRef::new(&database.id, "endpoint.port"),
    );
    environment.bind(
        env::REDIS_ADDR,
        EnvValue::Plain(cache.endpoint.address()),
        AttributeRef::new(&cache.id, "endpoint.address"),
    );
    environment.set(env::REDIS_PASS, "");
    Ok(environment)
}

/// Composes the service with default settings and the given health check path and port.
///
/// # Errors
///
/// See [`compose_service_with`].
pub fn compose_service(
    plan: &mut PlanBuilder,
    network: &Network,
    image: &str,
    env: Environment,
    health_check_path: &str,
    port: u16,
) -> Result<Service> {
    let settings = ServiceSettings {
        health_check_path: health_check_path.to_owned(),
        container_port: port,
        ..ServiceSettings::default()
    };
    compose_service_with(plan, network, image, env, &settings)
}

/// Composes the load-balanced service.
///
/// The image reference is checked before anything is added to the plan.
/// The load balancer wiring creates the service's security group.
///
/// # Errors
///
/// Returns [`StackweaveError::Config`] on an empty image or invalid
/// settings, and [`StackweaveError::DependencyOrder`] if the network or an
/// environment source is not in the plan.
pub fn compose_service_with(
    plan: &mut PlanBuilder,
    network: &Network,
    image: &str,
    env: Environment,
    settings: &ServiceSettings,
) -> Result<Service> {
    validate_image(image)?;
    let id = ResourceId::new(&settings.id);
    if !settings.health_check_path.starts_with('/') {
        return Err(StackweaveError::config(format!(
            "health check path \"{}\" must start with '/'",
            settings.health_check_path
        )));
    }
    if settings.container_port == 0 {
        return Err(StackweaveError::config(format!(
            "service {id} needs a non-zero container port"
        )));
    }
    plan.require_network(&id, network)?;
    for source in env.iter().filter_map(|b| b.source.as_ref()) {
        if !plan.contains(&source.resource) {
            return Err(StackweaveError::dependency_order(
                format!("{id} environment"),
                source.to_string(),
            ));
        }
    }

    let security_group = plan.create_security_group(
        &id.child("SecurityGroup"),
        &id,
        format!("Load balancer target group for {id}"),
    )?;
    let lb_tier = if settings.public_load_balancer {
        Visibility::Public
    } else {
        Visibility::Private
    };
    let load_balancer = LoadBalancer {
        id: id.child("LoadBalancer"),
        public: settings.public_load_balancer,
        listener_port: settings.listener_port,
        target_port: settings.container_port,
        subnets: network.subnet_ids(lb_tier),
        health_check: HealthCheck {
            path: settings.health_check_path.clone(),
            port: settings.container_port,
        },
    };

    let service = Service {
        id,
        image: image.to_owned(),
        container_port: settings.container_port,
        desired_count: settings.desired_count,
        limits: settings.limits,
        environment: env,
        security_group,
        subnets: network.subnet_ids(Visibility::Private),
        load_balancer,
    };
    plan.add_service(service.clone())?;
    tracing::info!(
        service = %service.id,
        image = %service.image,
        port = service.container_port,
        replicas = service.desired_count,
        env_vars = service.environment.len(),
        "service composed"
    );
    Ok(service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::build_network;
    use crate::provision::{provision_cache, provision_database};

    struct Fixture {
        plan: PlanBuilder,
        network: Network,
        database: DatabaseResource,
        cache: CacheResource,
    }

    fn fixture() -> Fixture {
        let mut plan = PlanBuilder::new("TestStack");
        let network = plan
            .add_network(build_network(2).expect("network"))
            .expect("add")
            .clone();
        let db_sg = plan
            .create_security_group(
                &ResourceId::new("DatabaseSecurityGroup"),
                &ResourceId::new("PostgresInstance"),
                "db",
            )
            .expect("db sg");
        let cache_sg = plan
            .create_security_group(
                &ResourceId::new("CacheSecurityGroup"),
                &ResourceId::new("RedisCluster"),
                "cache",
            )
            .expect("cache sg");
        let database = provision_database(&mut plan, &network, &db_sg, "gowit").expect("db");
        let cache =
            provision_cache(&mut plan, &network, &cache_sg, 1, "cache.t3.micro").expect("cache");
        Fixture {
            plan,
            network,
            database,
            cache,
        }
    }

    #[test]
    fn environment_exposes_runtime_contract() {
        let f = fixture();
        let environment = resolve_environment(&f.plan, &f.database, &f.cache).expect("env");
        let names: Vec<&str> = environment.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "DB_HOST",
                "DB_USER",
                "DB_PASSWORD",
                "DB_NAME",
                "DB_PORT",
                "REDIS_ADDR",
                "REDIS_PASS"
            ]
        );
        let get = |name: &str| environment.get(name).expect(name).value.expose().to_owned();
        assert_eq!(get("DB_USER"), "postgres");
        assert_eq!(get("DB_NAME"), "gowit");
        assert_eq!(get("DB_PORT"), "5432");
        assert_eq!(get("REDIS_ADDR"), format!("{}:6379", f.cache.endpoint.host));
        assert_eq!(get("REDIS_PASS"), "");
        assert_eq!(get("DB_HOST"), f.database.endpoint.host);
    }

    #[test]
    fn password_is_sensitive_and_redacted_on_display() {
        let f = fixture();
        let environment = resolve_environment(&f.plan, &f.database, &f.cache).expect("env");
        let password = &environment.get("DB_PASSWORD").expect("password").value;
        assert!(password.is_sensitive());
        assert_eq!(password.to_string(), "[REDACTED]");
        assert_eq!(password.expose().len(), 30);
    }

    #[test]
    fn set_replaces_existing_variable() {
        let mut environment = Environment::new();
        environment.set("A", "1");
        environment.set("A", "2");
        assert_eq!(environment.len(), 1);
        assert_eq!(environment.get("A").expect("A").value.expose(), "2");
    }

    #[test]
    fn service_uses_fixed_defaults() {
        let mut f = fixture();
        let environment = resolve_environment(&f.plan, &f.database, &f.cache).expect("env");
        let service = compose_service(
            &mut f.plan,
            &f.network,
            "repo/image:tag",
            environment,
            "/health",
            8080,
        )
        .expect("service");
        assert_eq!(service.desired_count, 1);
        assert_eq!(service.limits.memory_mib, 512);
        assert_eq!(service.limits.cpu_units, 256);
        assert_eq!(service.load_balancer.health_check.path, "/health");
        assert_eq!(service.load_balancer.target_port, 8080);
        assert!(service.load_balancer.public);
        assert_eq!(
            f.plan.kind_of(&service.security_group),
            Some(ResourceKind::SecurityGroup)
        );
    }

    #[test]
    fn empty_image_fails_before_anything_is_declared() {
        let mut f = fixture();
        let before = f.plan.security().groups().len();
        let err = compose_service(&mut f.plan, &f.network, "", Environment::new(), "/health", 8080)
            .unwrap_err();
        assert!(matches!(err, StackweaveError::Config { .. }), "got: {err}");
        assert_eq!(f.plan.security().groups().len(), before);
        assert!(!f.plan.contains(&ResourceId::new("AppServiceSecurityGroup")));
    }

    #[test]
    fn dangling_environment_source_is_dependency_error() {
        let mut f = fixture();
        let mut environment = Environment::new();
        environment.bind(
            "GHOST",
            EnvValue::Plain("x".into()),
            AttributeRef::new(&ResourceId::new("Ghost"), "endpoint.host"),
        );
        let err = compose_service(
            &mut f.plan,
            &f.network,
            "repo/image:tag",
            environment,
            "/health",
            8080,
        )
        .unwrap_err();
        assert!(matches!(err, StackweaveError::DependencyOrder { .. }), "got: {err}");
    }

    #[test]
    fn health_path_must_be_absolute() {
        let mut f = fixture();
        let err = compose_service(
            &mut f.plan,
            &f.network,
            "repo/image:tag",
            Environment::new(),
            "health",
            8080,
        )
        .unwrap_err();
        assert!(err.to_string().contains("must start with"), "got: {err}");
    }
}
