//! `stackweave fingerprint`: print the structural digest of the plan.

use clap::Args;

use super::Context;

/// Arguments for the `fingerprint` command.
#[derive(Args, Debug)]
pub struct FingerprintArgs {
    /// Exit with an error unless the digest equals this value.
    #[arg(long)]
    pub expect: Option<String>,
}

/// Executes the `fingerprint` command.
///
/// The digest covers structure only, so it is stable across runs even
/// though generated credentials differ.
///
/// # Errors
///
/// Returns an error if composition fails or the digest does not match
/// `--expect`.
pub fn execute(context: &Context, args: FingerprintArgs) -> anyhow::Result<()> {
    let plan = context.compose()?;
    let digest = plan.fingerprint()?;
    println!("{digest}");

    if let Some(expected) = args.expect {
        if !expected.eq_ignore_ascii_case(&digest) {
            anyhow::bail!("fingerprint mismatch: expected {expected}, got {digest}");
        }
        tracing::info!(%digest, "fingerprint matches");
    }
    Ok(())
}
