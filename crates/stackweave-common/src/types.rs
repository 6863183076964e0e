//! Domain primitive types used across the stackweave workspace.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Logical identifier of a declared resource, unique within one plan.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId(String);

impl ResourceId {
    /// Creates a resource ID from a string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derives a child identifier, e.g. `AppVpc` + `PublicSubnet1`.
    #[must_use]
    pub fn child(&self, suffix: &str) -> Self {
        Self(format!("{}{suffix}", self.0))
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Kind of a declared resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    /// The isolated network.
    Network,
    /// One subnet of the network.
    Subnet,
    /// A security group.
    SecurityGroup,
    /// One ingress rule attached to a security group.
    IngressRule,
    /// A generated credential.
    Secret,
    /// The managed relational database.
    Database,
    /// The subnet group the cache is placed into.
    CacheSubnetGroup,
    /// The managed in-memory cache.
    Cache,
    /// The public load balancer in front of the service.
    LoadBalancer,
    /// The container-backed service.
    Service,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Network => "network",
            Self::Subnet => "subnet",
            Self::SecurityGroup => "security-group",
            Self::IngressRule => "ingress-rule",
            Self::Secret => "secret",
            Self::Database => "database",
            Self::CacheSubnetGroup => "cache-subnet-group",
            Self::Cache => "cache",
            Self::LoadBalancer => "load-balancer",
            Self::Service => "service",
        };
        f.write_str(name)
    }
}

/// Reachability tier of a subnet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Routed to the internet gateway.
    Public,
    /// Egress only, through a NAT.
    Private,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Private => write!(f, "private"),
        }
    }
}

/// Transport protocol of an ingress rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// TCP.
    Tcp,
    /// UDP.
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
            Self::Udp => write!(f, "udp"),
        }
    }
}

/// Network endpoint derived from a managed resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// Hostname.
    pub host: String,
    /// Listener port.
    pub port: u16,
}

impl Endpoint {
    /// Creates an endpoint.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Returns `host:port`.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Resource limits for a service task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Memory limit in MiB.
    pub memory_mib: u32,
    /// CPU allotment in provider units (1024 = one vCPU).
    pub cpu_units: u32,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            memory_mib: crate::constants::DEFAULT_MEMORY_MIB,
            cpu_units: crate::constants::DEFAULT_CPU_UNITS,
        }
    }
}
