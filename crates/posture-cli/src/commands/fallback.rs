// Fallback derivation from self-test report and build manifest

use std::path::Path;

use anyhow::Context;
use posture_types::fallback::{load_manifest, load_self_test_report};
use posture_types::{compliance_fallback, ComplianceView};
use tracing::info;

/// Build the fallback view from whichever records are given.
pub fn derive(report: Option<&Path>, manifest: Option<&Path>) -> anyhow::Result<ComplianceView> {
    let report = report.map(load_self_test_report).transpose()?;
    let manifest = manifest.map(load_manifest).transpose()?;
    Ok(compliance_fallback(report.as_ref(), manifest.as_ref()))
}

/// Print the derived fallback as JSON.
pub fn print_fallback(report: Option<&Path>, manifest: Option<&Path>) -> anyhow::Result<()> {
    let view = derive(report, manifest)?;
    let counts = view.status_counts();
    info!(
        sections = view.section_count(),
        items = counts.total(),
        verdict = %view.verdict(),
        "Derived fallback view"
    );
    let json = serde_json::to_string_pretty(&view).context("failed to render view")?;
    println!("{json}");
    Ok(())
}
