//! Security groups and the ingress bindings between them.
//!
//! Rule sets only grow: a rule, once added, is never removed or narrowed.
//! Both endpoints of a rule must already exist when it is added.

use std::fmt;

use serde::{Deserialize, Serialize};
use stackweave_common::constants::ANY_IPV4_CIDR;
use stackweave_common::error::{Result, StackweaveError};
use stackweave_common::types::{Protocol, ResourceId};

use crate::network::parse_cidr;

/// Traffic origin of an ingress rule.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "type", content = "value")]
pub enum Peer {
    /// Members of another security group.
    SecurityGroup(ResourceId),
    /// A raw IPv4 address range.
    Cidr(String),
}

impl Peer {
    /// Any IPv4 address.
    #[must_use]
    pub fn any_ipv4() -> Self {
        Self::Cidr(ANY_IPV4_CIDR.into())
    }

    /// Members of the given security group.
    #[must_use]
    pub fn group(id: &ResourceId) -> Self {
        Self::SecurityGroup(id.clone())
    }

    /// Returns the group id for identity-based peers.
    #[must_use]
    pub const fn security_group(&self) -> Option<&ResourceId> {
        match self {
            Self::SecurityGroup(id) => Some(id),
            Self::Cidr(_) => None,
        }
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SecurityGroup(id) => write!(f, "sg:{id}"),
            Self::Cidr(cidr) => write!(f, "{cidr}"),
        }
    }
}

/// A unidirectional ingress permission on a security group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressRule {
    /// Logical id of the rule.
    pub id: ResourceId,
    /// Group the rule is attached to.
    pub target: ResourceId,
    /// Where the permitted traffic comes from.
    pub source: Peer,
    /// Destination port.
    pub port: u16,
    /// Transport protocol.
    pub protocol: Protocol,
    /// Human-readable description.
    pub description: String,
}

impl IngressRule {
    /// Returns `true` if the rule admits the same traffic as `other`.
    #[must_use]
    pub fn same_permission(&self, other: &Self) -> bool {
        self.target == other.target
            && self.source == other.source
            && self.port == other.port
            && self.protocol == other.protocol
    }
}

/// A named set of ingress permissions attached to one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroup {
    /// Logical id.
    pub id: ResourceId,
    /// Resource the group is attached to.
    pub owner: ResourceId,
    /// Network the group lives in.
    pub network: ResourceId,
    /// Human-readable description.
    pub description: String,
    /// Whether all outbound traffic is permitted.
    pub allow_all_outbound: bool,
    ingress: Vec<IngressRule>,
}

impl SecurityGroup {
    /// Returns the ingress rules, in the order they were added.
    #[must_use]
    pub fn ingress(&self) -> &[IngressRule] {
        &self.ingress
    }
}

/// The append-only collection of security groups in a plan.
#[derive(Debug, Clone, Default)]
pub struct SecurityBindings {
    groups: Vec<SecurityGroup>,
}

impl SecurityBindings {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if a group with this id exists.
    #[must_use]
    pub fn contains(&self, id: &ResourceId) -> bool {
        self.groups.iter().any(|g| &g.id == id)
    }

    /// Looks up a group by id.
    #[must_use]
    pub fn get(&self, id: &ResourceId) -> Option<&SecurityGroup> {
        self.groups.iter().find(|g| &g.id == id)
    }

    /// All groups, in creation order.
    #[must_use]
    pub fn groups(&self) -> &[SecurityGroup] {
        &self.groups
    }

    /// Creates an empty group.
    ///
    /// # Errors
    ///
    /// Returns [`StackweaveError::Config`] if the id is already taken.
    pub fn create(
        &mut self,
        id: ResourceId,
        owner: ResourceId,
        network: ResourceId,
        description: impl Into<String>,
    ) -> Result<&SecurityGroup> {
        if self.contains(&id) {
            return Err(StackweaveError::config(format!(
                "security group \"{id}\" already exists"
            )));
        }
        self.groups.push(SecurityGroup {
            id,
            owner,
            network,
            description: description.into(),
            allow_all_outbound: true,
            ingress: Vec::new(),
        });
        let last = self.groups.len() - 1;
        Ok(&self.groups[last])
    }

    /// Id the rule for this permission has or would get, if `to` exists.
    #[must_use]
    pub fn rule_id(
        &self,
        from: &Peer,
        to: &ResourceId,
        port: u16,
        protocol: Protocol,
    ) -> Option<ResourceId> {
        let target = self.get(to)?;
        let existing = target
            .ingress
            .iter()
            .find(|r| &r.source == from && r.port == port && r.protocol == protocol);
        Some(existing.map_or_else(|| next_rule_id(target), |r| r.id.clone()))
    }

    /// Permits `from` to reach members of `to` on `port`.
    ///
    /// Adding a permission that already exists returns the existing rule.
    ///
    /// # Errors
    ///
    /// Returns [`StackweaveError::DependencyOrder`] if `to`, or the group
    /// named by `from`, does not exist yet, and [`StackweaveError::Config`]
    /// if `from` is a malformed address range.
    pub fn allow(
        &mut self,
        from: Peer,
        to: &ResourceId,
        port: u16,
        protocol: Protocol,
        description: impl Into<String>,
    ) -> Result<IngressRule> {
        let rule_name = format!("ingress rule on {to} from {from} port {port}/{protocol}");
        match &from {
            Peer::SecurityGroup(source) if !self.contains(source) => {
                return Err(StackweaveError::dependency_order(rule_name, source.as_str()));
            }
            Peer::Cidr(cidr) => {
                let _ = parse_cidr(cidr)?;
            }
            Peer::SecurityGroup(_) => {}
        }
        let target = self
            .groups
            .iter_mut()
            .find(|g| &g.id == to)
            .ok_or_else(|| StackweaveError::dependency_order(rule_name, to.as_str()))?;

        let rule = IngressRule {
            id: next_rule_id(target),
            target: to.clone(),
            source: from,
            port,
            protocol,
            description: description.into(),
        };
        if let Some(existing) = target.ingress.iter().find(|r| r.same_permission(&rule)) {
            return Ok(existing.clone());
        }
        tracing::debug!(
            rule = %rule.id,
            target = %rule.target,
            source = %rule.source,
            port,
            "ingress rule added"
        );
        target.ingress.push(rule.clone());
        Ok(rule)
    }

    /// Iterates over every rule of every group.
    pub fn rules(&self) -> impl Iterator<Item = &IngressRule> {
        self.groups.iter().flat_map(|g| g.ingress.iter())
    }
}

fn next_rule_id(group: &SecurityGroup) -> ResourceId {
    group.id.child(&format!("Ingress{}", group.ingress.len() + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings_with(groups: &[&str]) -> SecurityBindings {
        let mut bindings = SecurityBindings::new();
        for name in groups {
            let _ = bindings
                .create(
                    ResourceId::new(*name),
                    ResourceId::new("owner"),
                    ResourceId::new("AppVpc"),
                    "test group",
                )
                .expect("create");
        }
        bindings
    }

    #[test]
    fn allow_from_cidr_needs_only_target() {
        let mut bindings = bindings_with(&["db"]);
        let rule = bindings
            .allow(Peer::any_ipv4(), &ResourceId::new("db"), 5432, Protocol::Tcp, "any")
            .expect("allow");
        assert_eq!(rule.source, Peer::Cidr("0.0.0.0/0".into()));
        assert_eq!(rule.id.as_str(), "dbIngress1");
        assert_eq!(bindings.rules().count(), 1);
    }

    #[test]
    fn allow_before_target_exists_is_dependency_error() {
        let mut bindings = bindings_with(&["svc"]);
        let err = bindings
            .allow(
                Peer::group(&ResourceId::new("svc")),
                &ResourceId::new("cache"),
                6379,
                Protocol::Tcp,
                "svc to cache",
            )
            .unwrap_err();
        assert!(matches!(err, StackweaveError::DependencyOrder { .. }), "got: {err}");
    }

    #[test]
    fn allow_before_source_exists_is_dependency_error() {
        let mut bindings = bindings_with(&["cache"]);
        let err = bindings
            .allow(
                Peer::group(&ResourceId::new("svc")),
                &ResourceId::new("cache"),
                6379,
                Protocol::Tcp,
                "svc to cache",
            )
            .unwrap_err();
        assert!(err.to_string().contains("svc"), "got: {err}");
        assert_eq!(bindings.rules().count(), 0);
    }

    #[test]
    fn duplicate_permission_is_not_added_twice() {
        let mut bindings = bindings_with(&["db"]);
        let target = ResourceId::new("db");
        let first = bindings
            .allow(Peer::any_ipv4(), &target, 5432, Protocol::Tcp, "first")
            .expect("allow");
        let second = bindings
            .allow(Peer::any_ipv4(), &target, 5432, Protocol::Tcp, "second")
            .expect("allow");
        assert_eq!(first, second);
        assert_eq!(bindings.get(&target).expect("group").ingress().len(), 1);
    }

    #[test]
    fn rules_accumulate_per_group() {
        let mut bindings = bindings_with(&["db"]);
        let target = ResourceId::new("db");
        let _ = bindings
            .allow(Peer::any_ipv4(), &target, 5432, Protocol::Tcp, "tcp")
            .expect("allow");
        let udp = bindings
            .allow(Peer::any_ipv4(), &target, 5432, Protocol::Udp, "udp")
            .expect("allow");
        assert_eq!(udp.id.as_str(), "dbIngress2");
        assert_eq!(bindings.get(&target).expect("group").ingress().len(), 2);
    }

    #[test]
    fn duplicate_group_is_rejected() {
        let mut bindings = bindings_with(&["db"]);
        let err = bindings
            .create(
                ResourceId::new("db"),
                ResourceId::new("owner"),
                ResourceId::new("AppVpc"),
                "again",
            )
            .unwrap_err();
        assert!(err.to_string().contains("already exists"), "got: {err}");
    }

    #[test]
    fn groups_allow_all_outbound() {
        let bindings = bindings_with(&["db"]);
        assert!(bindings.groups()[0].allow_all_outbound);
    }

    #[test]
    fn malformed_cidr_peer_is_rejected() {
        let mut bindings = bindings_with(&["db"]);
        let target = ResourceId::new("db");
        for cidr in ["anywhere", "10.0.0.0", "10.0.0.0/33", "10.0.0.1/8"] {
            let err = bindings
                .allow(Peer::Cidr(cidr.into()), &target, 5432, Protocol::Tcp, "bad")
                .unwrap_err();
            assert!(matches!(err, StackweaveError::Config { .. }), "{cidr}: {err}");
        }
        assert_eq!(bindings.rules().count(), 0);
    }

    #[test]
    fn narrower_cidr_peer_is_accepted() {
        let mut bindings = bindings_with(&["db"]);
        let rule = bindings
            .allow(
                Peer::Cidr("10.0.0.0/16".into()),
                &ResourceId::new("db"),
                5432,
                Protocol::Tcp,
                "vpc only",
            )
            .expect("allow");
        assert_eq!(rule.source.to_string(), "10.0.0.0/16");
    }

    #[test]
    fn rule_id_predicts_next_and_existing_ids() {
        let mut bindings = bindings_with(&["db"]);
        let target = ResourceId::new("db");
        let any = Peer::any_ipv4();
        assert_eq!(
            bindings.rule_id(&any, &target, 5432, Protocol::Tcp),
            Some(ResourceId::new("dbIngress1"))
        );
        let _ = bindings
            .allow(any.clone(), &target, 5432, Protocol::Tcp, "any")
            .expect("allow");
        assert_eq!(
            bindings.rule_id(&any, &target, 5432, Protocol::Tcp),
            Some(ResourceId::new("dbIngress1"))
        );
        assert_eq!(
            bindings.rule_id(&any, &target, 6379, Protocol::Tcp),
            Some(ResourceId::new("dbIngress2"))
        );
        assert_eq!(bindings.rule_id(&any, &ResourceId::new("ghost"), 1, Protocol::Tcp), None);
    }
}
