//! Path lookups and the raw status document.

use serde_json::Value;

use poolcop_core::StatusSnapshot;

use crate::cli::{GetArgs, GlobalOpts, OutputFormat};
use crate::config::Resolved;
use crate::error::CliError;
use crate::output;

use super::fetch_once;

/// Scalars print bare; containers print as compact JSON.
fn plain_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Resolve `path` below `prefix`, or report it as not found.
pub fn lookup<'a>(
    snapshot: &'a StatusSnapshot,
    prefix: &str,
    path: &str,
) -> Result<&'a Value, CliError> {
    snapshot
        .status_value_with_prefix(prefix, path)
        .ok_or_else(|| CliError::NotFound {
            resource_type: "Status path".into(),
            identifier: format!("{prefix}.{path}"),
            list_command: "raw".into(),
        })
}

pub async fn get(resolved: &Resolved, args: &GetArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let fetched = fetch_once(resolved).await?;
    let value = lookup(&fetched.snapshot, &args.prefix, &args.path)?;

    let out = match global.output {
        OutputFormat::Table | OutputFormat::Plain => plain_value(value),
        _ => output::render_single(&global.output, value, plain_value, plain_value)?,
    };
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn raw(resolved: &Resolved, global: &GlobalOpts) -> Result<(), CliError> {
    let fetched = fetch_once(resolved).await?;
    let doc = fetched.snapshot.raw();

    // A table has nothing to tabulate here; fall back to pretty JSON.
    let format = match global.output {
        OutputFormat::Table | OutputFormat::Plain => OutputFormat::Json,
        ref other => other.clone(),
    };
    let out = output::render_single(&format, doc, plain_value, plain_value)?;
    output::print_output(&out, global.quiet);
    Ok(())
}
