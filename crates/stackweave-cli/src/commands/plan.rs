//! `stackweave plan`: compose the topology and print the resulting plan.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Args, ValueEnum};
use stackweave_compose::ResourcePlan;

use super::Context;
use crate::output;

/// Output encodings for the plan.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanFormat {
    /// Human-readable summary.
    Text,
    /// Pretty-printed JSON document.
    Json,
    /// YAML document.
    Yaml,
}

/// Arguments for the `plan` command.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Output encoding.
    #[arg(short, long, value_enum, default_value_t = PlanFormat::Text)]
    pub format: PlanFormat,

    /// Write output to a file instead of stdout.
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Print sensitive environment values instead of masking them.
    #[arg(long)]
    pub reveal_secrets: bool,
}

/// Renders the plan in `format`, masking sensitive values unless `reveal_secrets`.
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn render(
    plan: &ResourcePlan,
    format: PlanFormat,
    reveal_secrets: bool,
) -> anyhow::Result<String> {
    let rendered = match format {
        PlanFormat::Text => output::render_text(plan, reveal_secrets)?,
        PlanFormat::Json if reveal_secrets => plan.to_json_pretty()? + "\n",
        PlanFormat::Json | PlanFormat::Yaml => {
            let mut document = serde_json::to_value(plan)?;
            if !reveal_secrets {
                output::redact(&mut document);
            }
            if format == PlanFormat::Json {
                serde_json::to_string_pretty(&document)? + "\n"
            } else {
                serde_yaml::to_string(&document)?
            }
        }
    };
    Ok(rendered)
}

/// Executes the `plan` command.
///
/// Composes the plan and renders it in the requested format. Sensitive
/// values are masked unless `--reveal-secrets` is given.
///
/// # Errors
///
/// Returns an error if composition, encoding, or writing fails.
pub fn execute(context: &Context, args: PlanArgs) -> anyhow::Result<()> {
    let plan = context.compose()?;
    let rendered = render(&plan, args.format, args.reveal_secrets)?;

    if let Some(ref path) = args.out {
        std::fs::write(path, &rendered)
            .with_context(|| format!("failed to write plan to {}", path.display()))?;
        tracing::info!(path = %path.display(), format = ?args.format, "plan written");
        println!("Plan for {} written to {}", plan.stack_name(), path.display());
    } else {
        print!("{rendered}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use stackweave_common::constants::DEFAULT_STACK_NAME;
    use stackweave_compose::credentials::FIELD_PASSWORD;

    use super::*;

    fn context() -> Context {
        Context {
            image: "repo/image:tag".to_owned(),
            settings: None,
        }
    }

    fn args(format: PlanFormat, out: &Path, reveal_secrets: bool) -> PlanArgs {
        PlanArgs {
            format,
            out: Some(out.to_path_buf()),
            reveal_secrets,
        }
    }

    fn password(plan: &ResourcePlan) -> String {
        let db = &plan.databases()[0];
        plan.secret_value(&db.credential, FIELD_PASSWORD)
            .expect("password")
            .expose_secret()
            .to_owned()
    }

    #[test]
    fn json_out_file_is_written_masked() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("plan.json");
        execute(&context(), args(PlanFormat::Json, &path, false)).expect("plan");

        let content = std::fs::read_to_string(&path).expect("read");
        let doc: serde_json::Value = serde_json::from_str(&content).expect("json");
        assert_eq!(doc["stack_name"], DEFAULT_STACK_NAME);
        assert!(content.contains(output::REDACTED));
    }

    #[test]
    fn yaml_out_file_is_written_masked() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("plan.yaml");
        execute(&context(), args(PlanFormat::Yaml, &path, false)).expect("plan");

        let content = std::fs::read_to_string(&path).expect("read");
        let doc: serde_yaml::Value = serde_yaml::from_str(&content).expect("yaml");
        assert!(doc.get("resources").is_some());
        assert!(content.contains(output::REDACTED));
    }

    #[test]
    fn json_hides_password_unless_revealed() {
        let plan = context().compose().expect("plan");
        let secret = password(&plan);

        let masked = render(&plan, PlanFormat::Json, false).expect("render");
        assert!(!masked.contains(&secret));
        assert!(masked.contains(output::REDACTED));

        let revealed = render(&plan, PlanFormat::Json, true).expect("render");
        assert!(revealed.contains(&secret));
        assert!(!revealed.contains(output::REDACTED));
    }

    #[test]
    fn yaml_hides_password_unless_revealed() {
        let plan = context().compose().expect("plan");
        let secret = password(&plan);

        let masked = render(&plan, PlanFormat::Yaml, false).expect("render");
        assert!(!masked.contains(&secret));

        let revealed = render(&plan, PlanFormat::Yaml, true).expect("render");
        assert!(revealed.contains(&secret));
    }

    #[test]
    fn unwritable_out_path_is_reported() {
        let path = Path::new("/nonexistent/dir/plan.txt");
        let err = execute(&context(), args(PlanFormat::Text, path, false)).unwrap_err();
        assert!(err.to_string().contains("failed to write plan to"), "got: {err}");
    }
}
