//! CLI command definitions and dispatch.

pub mod fingerprint;
pub mod order;
pub mod plan;

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use stackweave_common::config::{Config, TopologySettings};
use stackweave_common::constants::{BIN_NAME, IMAGE_URL_ENV};
use stackweave_compose::ResourcePlan;

/// Stackweave: compose a network, database, cache, and load-balanced service.
#[derive(Parser, Debug)]
#[command(name = BIN_NAME, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Container image reference for the service.
    #[arg(long, global = true, env = IMAGE_URL_ENV, default_value = "")]
    pub image: String,

    /// Topology settings file (`.yaml`, `.yml`, or `.json`).
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    pub log_json: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compose the topology and print the plan.
    Plan(plan::PlanArgs),
    /// Print the order resources must be provisioned in.
    Order(order::OrderArgs),
    /// Print the structural fingerprint of the plan.
    Fingerprint(fingerprint::FingerprintArgs),
}

/// Inputs shared by every subcommand.
#[derive(Debug, Clone)]
pub struct Context {
    /// Image reference handed to the composer.
    pub image: String,
    /// Optional settings file.
    pub settings: Option<PathBuf>,
}

impl Context {
    /// Loads settings and composes the plan.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings file cannot be read or parsed, or
    /// if composition fails.
    pub fn compose(&self) -> anyhow::Result<ResourcePlan> {
        let settings = load_settings(self.settings.as_deref())?;
        let config = Config::new(self.image.as_str());
        let plan = stackweave_compose::compose_with(&config, &settings)?;
        Ok(plan)
    }
}

/// Reads topology settings, falling back to defaults when no file is given.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<TopologySettings> {
    let Some(path) = path else {
        return Ok(TopologySettings::default());
    };
    tracing::debug!(path = %path.display(), "loading settings");
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file {}", path.display()))?;
    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));
    let settings: TopologySettings = if is_yaml {
        serde_yaml::from_str(&content)
            .with_context(|| format!("invalid settings in {}", path.display()))?
    } else {
        TopologySettings::from_json(&content)
            .with_context(|| format!("invalid settings in {}", path.display()))?
    };
    Ok(settings)
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let context = Context {
        image: cli.image,
        settings: cli.settings,
    };
    match cli.command {
        Command::Plan(args) => plan::execute(&context, args),
        Command::Order(args) => order::execute(&context, args),
        Command::Fingerprint(args) => fingerprint::execute(&context, args),
    }
}
