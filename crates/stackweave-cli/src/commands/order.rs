//! `stackweave order`: print the provisioning order of every resource.

use std::fmt::Write as _;

use clap::Args;
use stackweave_compose::ResourcePlan;

use super::Context;
use crate::output;

/// Arguments for the `order` command.
#[derive(Args, Debug)]
pub struct OrderArgs {
    /// Print only resource ids, one per line.
    #[arg(long)]
    pub ids_only: bool,
}

/// Renders the provisioning order, either bare ids or a numbered listing.
///
/// # Errors
///
/// Returns an error if the dependency graph has a cycle.
pub fn render(plan: &ResourcePlan, ids_only: bool) -> anyhow::Result<String> {
    let order = plan.deployment_order()?;
    let mut out = String::new();

    if ids_only {
        for id in &order {
            writeln!(out, "{id}")?;
        }
        return Ok(out);
    }

    writeln!(out, "Deployment order for: {}", plan.stack_name())?;
    writeln!(out, "{}", output::banner(35))?;
    for (step, id) in order.iter().enumerate() {
        let kind = plan
            .kind_of(id)
            .map_or_else(|| "?".to_owned(), |k| k.to_string());
        writeln!(out, "  {:>3}. {id} ({kind})", step + 1)?;
    }
    writeln!(out)?;
    writeln!(out, "  {} resource(s) in order.", order.len())?;
    Ok(out)
}

/// Executes the `order` command.
///
/// # Errors
///
/// Returns an error if composition fails or the dependency graph has a cycle.
pub fn execute(context: &Context, args: OrderArgs) -> anyhow::Result<()> {
    let plan = context.compose()?;
    print!("{}", render(&plan, args.ids_only)?);
    Ok(())
}
