use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, info};

use crate::audit::AuditReport;
use crate::models::AuditRecord;

/// Render the audit report as GitHub-flavored markdown.
pub fn render(report: &AuditReport) -> String {
    let mut out = String::new();

    if !report.resolution_stats.is_empty() {
        out.push_str("### 🎯 License Resolution Statistics\n\n");
        out.push_str("| Resolution Method | Count |\n");
        out.push_str("| :--- | :---: |\n");
        for (method, count) in &report.resolution_stats {
            out.push_str(&format!("| {} | {} |\n", method, count));
        }
        out.push('\n');
    }

    out.push_str("## License Audit Report\n\n");

    if !report.denied.is_empty() {
        out.push_str("### ❌ DENIED PACKAGES\n\n");
        out.push_str("| Package | License | Policy | PURL |\n");
        out.push_str("| :--- | :--- | :--- | :--- |\n");
        for record in &report.denied {
            out.push_str(&format!(
                "| `{}` | `{}` | **{}** | `{}` |\n",
                record.package,
                license_display(record),
                policy_display(record),
                record.purl
            ));
        }
        out.push('\n');
    }

    if !report.needs_review.is_empty() {
        out.push_str("### ⚠️ PACKAGES NEEDING REVIEW\n\n");
        out.push_str("| Package | License | Policy | PURL |\n");
        out.push_str("| :--- | :--- | :--- | :--- |\n");
        for record in &report.needs_review {
            out.push_str(&format!(
                "| `{}` | `{}` | {} | `{}` |\n",
                record.package,
                license_display(record),
                policy_display(record),
                record.purl
            ));
        }
        out.push('\n');
    }

    if !report.internal.is_empty() {
        out.push_str("### 🏠 SKIPPED INTERNAL PACKAGES\n\n");
        out.push_str("| Package | PURL |\n");
        out.push_str("| :--- | :--- |\n");
        for record in &report.internal {
            out.push_str(&format!("| `{}` | `{}` |\n", record.package, record.purl));
        }
        out.push('\n');
    }

    if report.denied.is_empty() && report.needs_review.is_empty() {
        out.push_str("✅ **All packages conform to the license policy.**\n\n");
    }

    out
}

/// The license cell shows the pre-resolution name when one was recorded,
/// with the resolved id appended.
fn license_display(record: &AuditRecord) -> String {
    let base = record
        .license_original
        .as_deref()
        .or(record.license.as_deref())
        .unwrap_or("N/A");

    match (&record.resolution, &record.license) {
        (Some(_), Some(license)) => format!("{} → **{}**", base, license),
        _ => base.to_string(),
    }
}

fn policy_display(record: &AuditRecord) -> String {
    if record.package_policy {
        format!("{} (package policy)", record.policy)
    } else {
        record.policy.to_string()
    }
}

/// Append the summary table to `$GITHUB_STEP_SUMMARY` when running inside a
/// GitHub Actions job. A no-op everywhere else.
pub fn write_step_summary(report: &AuditReport) -> Result<()> {
    match std::env::var("GITHUB_STEP_SUMMARY") {
        Ok(path) if !path.is_empty() => append_summary(report, Path::new(&path)),
        _ => {
            debug!("GITHUB_STEP_SUMMARY not set, skipping summary table");
            Ok(())
        }
    }
}

fn append_summary(report: &AuditReport, path: &Path) -> Result<()> {
    let mut content = format!(
        "\n### 📊 License Audit Summary\n\n\
         | Category | Count |\n\
         | :--- | :---: |\n\
         | Total Packages in SBOM | {} |\n\
         | Denied Packages | {} |\n\
         | Packages Needing Review | {} |\n\
         | Internal Packages Skipped | {} |\n\
         | GitHub Actions | {} |",
        report.total_components,
        report.denied.len(),
        report.needs_review.len(),
        report.internal.len(),
        report.gh_actions_count
    );
    let resolved = report.resolved_count();
    if resolved > 0 {
        content.push_str(&format!("\n| Licenses Resolved | {} |", resolved));
    }
    content.push_str("\n\n");

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open step summary file {}", path.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("failed to write step summary to {}", path.display()))?;
    info!("wrote audit summary to {}", path.display());
    Ok(())
}
