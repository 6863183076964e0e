//! # stackweave: topology composer CLI
//!
//! Composes the deployment topology from an image reference and optional
//! settings file, and prints the resulting plan, its deployment order, or
//! its structural fingerprint.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

mod commands;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::commands::Cli;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
    tracing::debug!(
        app = stackweave_common::constants::APP_NAME,
        version = env!("CARGO_PKG_VERSION"),
        "starting"
    );

    commands::execute(cli)
}
