//! Configuration model for topology composition.
//!
//! [`Config`] is the caller-supplied input. [`TopologySettings`] holds the
//! fixed knobs of the topology; every field has a default, so a settings
//! file only needs to name what it overrides.

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{Result, StackweaveError};
use crate::types::ResourceLimits;

/// Caller-supplied composition input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Container image reference for the service (e.g. `repo/image:tag`).
    pub image_url: String,
}

impl Config {
    /// Creates a configuration for the given image reference.
    #[must_use]
    pub fn new(image_url: impl Into<String>) -> Self {
        Self {
            image_url: image_url.into(),
        }
    }

    /// Checks the caller contract.
    ///
    /// # Errors
    ///
    /// Returns [`StackweaveError::Config`] if the image reference is empty
    /// or contains whitespace.
    pub fn validate(&self) -> Result<()> {
        validate_image(&self.image_url)
    }
}

/// Rejects empty or whitespace-bearing image references.
///
/// # Errors
///
/// Returns [`StackweaveError::Config`] on an invalid reference.
pub fn validate_image(image: &str) -> Result<()> {
    if image.trim().is_empty() {
        return Err(StackweaveError::config("container image reference is empty"));
    }
    if image.chars().any(char::is_whitespace) {
        return Err(StackweaveError::config(format!(
            "container image reference contains whitespace: \"{image}\""
        )));
    }
    Ok(())
}

/// Root of the fixed topology settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologySettings {
    /// Network layout.
    pub network: NetworkSettings,
    /// Managed database.
    pub database: DatabaseSettings,
    /// Managed cache.
    pub cache: CacheSettings,
    /// Load-balanced service.
    pub service: ServiceSettings,
}

impl TopologySettings {
    /// Parses settings from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid JSON for this model.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Network layout settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Stack name recorded on the plan.
    pub stack_name: String,
    /// Region the availability domains belong to.
    pub region: String,
    /// Logical id of the network.
    pub id: String,
    /// Address space in CIDR notation.
    pub cidr: String,
    /// Prefix length of every subnet.
    pub subnet_mask: u8,
    /// Requested availability domains, clamped to the provider maximum.
    pub max_availability_domains: u32,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            stack_name: constants::DEFAULT_STACK_NAME.into(),
            region: constants::DEFAULT_REGION.into(),
            id: "AppVpc".into(),
            cidr: constants::DEFAULT_NETWORK_CIDR.into(),
            subnet_mask: constants::DEFAULT_SUBNET_MASK,
            max_availability_domains: constants::PROVIDER_MAX_AVAILABILITY_DOMAINS,
        }
    }
}

/// Managed database settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Logical id of the database instance.
    pub id: String,
    /// Logical id of its security group.
    pub security_group_id: String,
    /// Engine name.
    pub engine: String,
    /// Engine major version.
    pub engine_version: String,
    /// Instance class.
    pub instance_class: String,
    /// Allocated storage in GiB.
    pub allocated_storage_gib: u32,
    /// Logical database name.
    pub name: String,
    /// Fixed username of the generated credential.
    pub username: String,
    /// Whether the instance gets a public address.
    pub publicly_accessible: bool,
    /// Listener port.
    pub port: u16,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            id: "PostgresInstance".into(),
            security_group_id: "DatabaseSecurityGroup".into(),
            engine: "postgres".into(),
            engine_version: "13".into(),
            instance_class: "t3.micro".into(),
            allocated_storage_gib: constants::DATABASE_STORAGE_GIB,
            name: constants::DATABASE_NAME.into(),
            username: constants::DATABASE_USERNAME.into(),
            publicly_accessible: true,
            port: constants::DATABASE_PORT,
        }
    }
}

/// Managed cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Logical id of the cache cluster.
    pub id: String,
    /// Logical id of its security group.
    pub security_group_id: String,
    /// Engine name.
    pub engine: String,
    /// Description recorded on the cache subnet group.
    pub subnet_group_description: String,
    /// Node type.
    pub node_type: String,
    /// Number of cache nodes.
    pub node_count: u32,
    /// Listener port.
    pub port: u16,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            id: "RedisCluster".into(),
            security_group_id: "CacheSecurityGroup".into(),
            engine: "redis".into(),
            subnet_group_description: "Subnet group for Redis".into(),
            node_type: constants::CACHE_NODE_TYPE.into(),
            node_count: 1,
            port: constants::CACHE_PORT,
        }
    }
}

/// Load-balanced service settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Logical id of the service.
    pub id: String,
    /// Port the container listens on.
    pub container_port: u16,
    /// Desired replica count.
    pub desired_count: u32,
    /// Task resource limits.
    pub limits: ResourceLimits,
    /// Path polled by the load balancer health check.
    pub health_check_path: String,
    /// Whether the load balancer is internet-facing.
    pub public_load_balancer: bool,
    /// Listener port of the load balancer.
    pub listener_port: u16,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            id: "AppService".into(),
            container_port: constants::SERVICE_PORT,
            desired_count: constants::DEFAULT_DESIRED_COUNT,
            limits: ResourceLimits::default(),
            health_check_path: constants::HEALTH_CHECK_PATH.into(),
            public_load_balancer: true,
            listener_port: constants::LOAD_BALANCER_PORT,
        }
    }
}
