//! Topology-wide constants and defaults.

/// Application name used in CLI output.
pub const APP_NAME: &str = "stackweave";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "stackweave";

/// Environment variable the CLI reads the container image reference from.
pub const IMAGE_URL_ENV: &str = "IMAGE_URL";

/// Default stack name.
pub const DEFAULT_STACK_NAME: &str = "InfraStack";

/// Default deployment region; availability domains are suffixed onto it.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Most availability domains the provider hands out to one network.
pub const PROVIDER_MAX_AVAILABILITY_DOMAINS: u32 = 2;

/// Address space of the isolated network.
pub const DEFAULT_NETWORK_CIDR: &str = "10.0.0.0/16";

/// Prefix length of every subnet.
pub const DEFAULT_SUBNET_MASK: u8 = 24;

/// Address range matching every IPv4 source.
pub const ANY_IPV4_CIDR: &str = "0.0.0.0/0";

/// `PostgreSQL` listener port.
pub const DATABASE_PORT: u16 = 5432;

/// Redis listener port.
pub const CACHE_PORT: u16 = 6379;

/// Port the service container listens on.
pub const SERVICE_PORT: u16 = 8080;

/// Public listener port of the load balancer.
pub const LOAD_BALANCER_PORT: u16 = 80;

/// Health-check path polled by the load balancer.
pub const HEALTH_CHECK_PATH: &str = "/health";

/// Fixed database username.
pub const DATABASE_USERNAME: &str = "postgres";

/// Default logical database name.
pub const DATABASE_NAME: &str = "gowit";

/// Minimum allocated storage tier, in GiB.
pub const DATABASE_STORAGE_GIB: u32 = 20;

/// Length of generated passwords.
pub const GENERATED_PASSWORD_LENGTH: usize = 30;

/// Default cache node type.
pub const CACHE_NODE_TYPE: &str = "cache.t3.micro";

/// Default number of service replicas.
pub const DEFAULT_DESIRED_COUNT: u32 = 1;

/// Default service memory limit, in MiB.
pub const DEFAULT_MEMORY_MIB: u32 = 512;

/// Default service CPU allotment, in provider CPU units.
pub const DEFAULT_CPU_UNITS: u32 = 256;

/// Environment variable names exposed to the deployed service.
pub mod env {
    /// Database endpoint host.
    pub const DB_HOST: &str = "DB_HOST";
    /// Database username.
    pub const DB_USER: &str = "DB_USER";
    /// Database password.
    pub const DB_PASSWORD: &str = "DB_PASSWORD";
    /// Logical database name.
    pub const DB_NAME: &str = "DB_NAME";
    /// Database endpoint port.
    pub const DB_PORT: &str = "DB_PORT";
    /// Cache `host:port` address.
    pub const REDIS_ADDR: &str = "REDIS_ADDR";
    /// Cache password placeholder.
    pub const REDIS_PASS: &str = "REDIS_PASS";
}
