//! Formatted output helpers for CLI commands.
//!
//! Renders a plan as a readable summary and masks sensitive values in
//! structured output.

use std::fmt::Write as _;

use serde_json::Value;
use stackweave_compose::ResourcePlan;

/// Replacement printed in place of a sensitive value.
pub const REDACTED: &str = "[REDACTED]";

/// A horizontal rule `width` characters wide.
#[must_use]
pub fn banner(width: usize) -> String {
    "\u{2550}".repeat(width)
}

/// Formats a size in MiB into a human-readable string (e.g., "512 MiB").
#[must_use]
pub fn format_mib(mib: u32) -> String {
    if mib >= 1024 && mib % 1024 == 0 {
        format!("{} GiB", mib / 1024)
    } else {
        format!("{mib} MiB")
    }
}

/// Masks every `{"kind": "sensitive", "value": ...}` object in place.
pub fn redact(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if map.get("kind").and_then(Value::as_str) == Some("sensitive")
                && map.contains_key("value")
            {
                let _ = map.insert("value".to_owned(), Value::String(REDACTED.to_owned()));
                return;
            }
            map.values_mut().for_each(redact);
        }
        Value::Array(items) => items.iter_mut().for_each(redact),
        _ => {}
    }
}

/// Renders the plan as a readable summary.
///
/// # Errors
///
/// Returns an error if writing to the buffer fails.
pub fn render_text(plan: &ResourcePlan, reveal_secrets: bool) -> Result<String, std::fmt::Error> {
    let mut out = String::new();
    let network = plan.network();

    writeln!(out, "Deployment Plan for: {}", plan.stack_name())?;
    writeln!(out, "Generated: {}", plan.generated_at().to_rfc3339())?;
    writeln!(out, "{}", banner(35))?;
    writeln!(out)?;

    writeln!(out, "  + network {} ({}, {})", network.id, network.cidr, network.region)?;
    for subnet in &network.subnets {
        writeln!(
            out,
            "      {:<8} {} {} {}",
            subnet.visibility.to_string(),
            subnet.id,
            subnet.cidr,
            subnet.availability_domain
        )?;
    }

    for group in plan.security_groups() {
        writeln!(out, "  + security-group {} (owner {})", group.id, group.owner)?;
    }

    for db in plan.databases() {
        writeln!(
            out,
            "  + database {} ({} {}, {}, {} GiB, {} subnets)",
            db.id, db.engine, db.engine_version, db.instance_class, db.allocated_storage_gib, db.placement
        )?;
        writeln!(out, "      endpoint: {}", db.endpoint)?;
        writeln!(out, "      credential: {}", db.credential)?;
    }

    for cache in plan.caches() {
        writeln!(
            out,
            "  + cache {} ({}, {} x{}, {} subnets)",
            cache.id, cache.engine, cache.node_type, cache.node_count, cache.placement
        )?;
        writeln!(out, "      endpoint: {}", cache.endpoint)?;
        writeln!(out, "      subnet group: {}", cache.subnet_group)?;
    }

    for service in plan.services() {
        let lb = &service.load_balancer;
        writeln!(out, "  + service {}", service.id)?;
        writeln!(out, "      image: {}", service.image)?;
        writeln!(
            out,
            "      port: {}  replicas: {}  memory: {}  cpu: {}",
            service.container_port,
            service.desired_count,
            format_mib(service.limits.memory_mib),
            service.limits.cpu_units
        )?;
        writeln!(
            out,
            "      load balancer: {} ({}, :{} -> :{}, health {})",
            lb.id,
            if lb.public { "public" } else { "internal" },
            lb.listener_port,
            lb.target_port,
            lb.health_check.path
        )?;
        writeln!(out, "      env:")?;
        for binding in service.environment.iter() {
            let value = if reveal_secrets {
                binding.value.expose().to_owned()
            } else {
                binding.value.to_string()
            };
            writeln!(out, "        {}={value}", binding.name)?;
        }
    }

    writeln!(out)?;
    writeln!(out, "  Ingress rules:")?;
    for rule in plan.ingress_rules() {
        writeln!(
            out,
            "    {} <- {} {}/{} ({})",
            rule.target, rule.source, rule.protocol, rule.port, rule.description
        )?;
    }

    writeln!(out)?;
    writeln!(out, "  {} resource(s) will be provisioned.", plan.resources().len())?;
    Ok(out)
}
