//! Isolated network layout.
//!
//! Splits the network's address space into one public and one private
//! subnet per availability domain. Nothing is allocated here; the result
//! is a value object the plan records.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};
use stackweave_common::config::NetworkSettings;
use stackweave_common::constants::PROVIDER_MAX_AVAILABILITY_DOMAINS;
use stackweave_common::error::{Result, StackweaveError};
use stackweave_common::types::{ResourceId, Visibility};

/// One subnet of the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    /// Logical id.
    pub id: ResourceId,
    /// Address range in CIDR notation.
    pub cidr: String,
    /// Reachability tier.
    pub visibility: Visibility,
    /// Availability domain the subnet lives in.
    pub availability_domain: String,
}

/// The isolated network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    /// Logical id.
    pub id: ResourceId,
    /// Region the availability domains belong to.
    pub region: String,
    /// Address space in CIDR notation.
    pub cidr: String,
    /// Availability domains, in allocation order.
    pub availability_domains: Vec<String>,
    /// All subnets, public tier first.
    pub subnets: Vec<Subnet>,
}

impl Network {
    /// Iterates over the subnets of one tier, in domain order.
    pub fn subnets_of(&self, visibility: Visibility) -> impl Iterator<Item = &Subnet> {
        self.subnets
            .iter()
            .filter(move |s| s.visibility == visibility)
    }

    /// Collects the ids of every subnet in one tier, across all domains.
    #[must_use]
    pub fn subnet_ids(&self, visibility: Visibility) -> Vec<ResourceId> {
        self.subnets_of(visibility).map(|s| s.id.clone()).collect()
    }

    /// Looks up a subnet by id.
    #[must_use]
    pub fn subnet(&self, id: &ResourceId) -> Option<&Subnet> {
        self.subnets.iter().find(|s| &s.id == id)
    }
}

/// Builds the network with default settings and the given domain count.
///
/// # Errors
///
/// Returns [`StackweaveError::Config`] if `max_availability_domains` is zero.
pub fn build_network(max_availability_domains: u32) -> Result<Network> {
    let settings = NetworkSettings {
        max_availability_domains,
        ..NetworkSettings::default()
    };
    build_network_with(&settings)
}

/// Builds the network described by `settings`.
///
/// The domain count is clamped to the provider maximum. Subnets are carved
/// out of the address space in order: every public subnet, then every
/// private subnet, one per domain.
///
/// # Errors
///
/// Returns [`StackweaveError::Config`] if the domain count is zero, the
/// address space is malformed, or the subnets do not fit into it.
pub fn build_network_with(settings: &NetworkSettings) -> Result<Network> {
    if settings.max_availability_domains < 1 {
        return Err(StackweaveError::config(
            "max availability domains must be at least 1",
        ));
    }
    let domains = settings
        .max_availability_domains
        .min(PROVIDER_MAX_AVAILABILITY_DOMAINS);
    let availability_domains: Vec<String> = ('a'..='z')
        .take(domains as usize)
        .map(|suffix| format!("{}{suffix}", settings.region))
        .collect();

    let (base, prefix) = parse_cidr(&settings.cidr)?;
    let mask = settings.subnet_mask;
    if mask < prefix || mask > 30 {
        return Err(StackweaveError::config(format!(
            "subnet mask /{mask} does not fit address space {}",
            settings.cidr
        )));
    }
    let tiers = [Visibility::Public, Visibility::Private];
    let needed = u64::from(domains) * 2;
    let available = 1_u64 << (mask - prefix);
    if needed > available {
        return Err(StackweaveError::config(format!(
            "address space {} holds {available} /{mask} subnets, {needed} required",
            settings.cidr
        )));
    }

    let id = ResourceId::new(&settings.id);
    let block = 1_u32 << (32 - mask);
    let mut subnets = Vec::with_capacity(availability_domains.len() * tiers.len());
    let mut offset = 0_u32;
    for visibility in tiers {
        let label = match visibility {
            Visibility::Public => "PublicSubnet",
            Visibility::Private => "PrivateSubnet",
        };
        for (n, domain) in availability_domains.iter().enumerate() {
            let start = Ipv4Addr::from(u32::from(base) + offset * block);
            subnets.push(Subnet {
                id: id.child(&format!("{label}{}", n + 1)),
                cidr: format!("{start}/{mask}"),
                visibility,
                availability_domain: domain.clone(),
            });
            offset += 1;
        }
    }

    tracing::debug!(
        network = %id,
        domains = availability_domains.len(),
        subnets = subnets.len(),
        "network layout built"
    );

    Ok(Network {
        id,
        region: settings.region.clone(),
        cidr: settings.cidr.clone(),
        availability_domains,
        subnets,
    })
}

/// Parses `a.b.c.d/n`, rejecting host bits below the prefix.
pub(crate) fn parse_cidr(cidr: &str) -> Result<(Ipv4Addr, u8)> {
    let invalid = || StackweaveError::config(format!("invalid address space: \"{cidr}\""));
    let (addr, prefix) = cidr.split_once('/').ok_or_else(invalid)?;
    let addr: Ipv4Addr = addr.parse().map_err(|_| invalid())?;
    let prefix: u8 = prefix.parse().map_err(|_| invalid())?;
    if prefix > 32 {
        return Err(invalid());
    }
    let host_bits = u32::MAX.checked_shr(u32::from(prefix)).unwrap_or(0);
    if u32::from(addr) & host_bits != 0 {
        return Err(invalid());
    }
    Ok((addr, prefix))
}
