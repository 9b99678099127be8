//! Import listing (`seed freeze`).
//!
//! Asks the Go toolchain which packages the current module imports. A missing
//! `go` binary or a failing `go list` is an error, not an empty list.

use anyhow::{Context, Result, bail};
use std::collections::BTreeSet;
use std::path::Path;
use std::process::Command;

const IMPORTS_TEMPLATE: &str = r#"{{ join .Imports "\n" }}"#;

pub fn list_imports(dir: &Path) -> Result<Vec<String>> {
    let output = Command::new("go")
        .args(["list", "-f", IMPORTS_TEMPLATE, "./..."])
        .current_dir(dir)
        .output()
        .context("Failed to run 'go list'. Is Go installed?")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("go list failed: {}", stderr.trim());
    }

    Ok(parse_imports(&String::from_utf8_lossy(&output.stdout)))
}

/// One import per line, quotes stripped, sorted and de-duplicated.
fn parse_imports(raw: &str) -> Vec<String> {
    raw.lines()
        .map(|line| line.trim().trim_matches('\'').trim())
        .filter(|line| !line.is_empty())
        .map(ToOwned::to_owned)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
