use std::path::Path;

use anyhow::Result;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use crate::audit::AuditReport;
use crate::models::{AuditRecord, AuditStatus};

/// Render a colored terminal report.
pub fn render(report: &AuditReport, sbom_path: &Path, verbose: bool, quiet: bool) -> Result<()> {
    if quiet {
        println!(
            "Total: {}  Allowed: {}  Denied: {}  Review: {}  Internal: {}",
            report.total_components,
            report.allowed.len().to_string().green(),
            report.denied.len().to_string().red(),
            report.needs_review.len().to_string().yellow(),
            report.internal.len().to_string().cyan(),
        );
        return Ok(());
    }

    println!(
        "\n {} v{}",
        "license-audit".bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!(" Auditing: {}\n", sbom_path.display());

    // Summary box
    let allowed_licenses = summarize_licenses(&report.allowed);
    let review_licenses = summarize_licenses(&report.needs_review);
    let denied_licenses = summarize_licenses(&report.denied);

    println!(" ┌────────────────────────────────────────────────────┐");
    println!(" │  {:<48} │", "SUMMARY".bold());
    println!(
        " │  {:<48} │",
        format!("Total packages     : {}", report.total_components)
    );
    println!(
        " │  {:<48} │",
        format!(
            "{}  Allowed         : {:>4}  {}",
            "✓".green(),
            report.allowed.len(),
            allowed_licenses
        )
    );
    println!(
        " │  {:<48} │",
        format!(
            "{}  Needs review    : {:>4}  {}",
            "⚠".yellow(),
            report.needs_review.len(),
            review_licenses
        )
    );
    println!(
        " │  {:<48} │",
        format!(
            "{}  Denied          : {:>4}  {}",
            "✗".red(),
            report.denied.len(),
            denied_licenses
        )
    );
    println!(
        " │  {:<48} │",
        format!("{}  Internal        : {:>4}", "⌂".cyan(), report.internal.len())
    );
    if report.resolved_count() > 0 {
        println!(
            " │  {:<48} │",
            format!("Licenses resolved  : {:>4}", report.resolved_count())
        );
    }
    println!(" └────────────────────────────────────────────────────┘\n");

    // Denied table
    if !report.denied.is_empty() {
        println!(" {} Denied packages:\n", "[DENY]".red().bold());
        render_table(&report.denied);
        println!();
    }

    // Needs-review table
    if !report.needs_review.is_empty() {
        println!(" {} Packages needing review:\n", "[REVIEW]".yellow().bold());
        render_table(&report.needs_review);
        println!();
    }

    if !report.internal.is_empty() {
        println!(" {} Internal packages skipped:\n", "[INTERNAL]".cyan().bold());
        render_internal_table(&report.internal);
        println!();
    }

    // Verbose: show all allowed packages too
    if verbose && !report.allowed.is_empty() {
        println!(" {} Allowed packages:\n", "[ALLOW]".green().bold());
        render_table(&report.allowed);
        println!();
    }

    Ok(())
}

fn render_table(records: &[AuditRecord]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Package").add_attribute(Attribute::Bold),
            Cell::new("License").add_attribute(Attribute::Bold),
            Cell::new("Status").add_attribute(Attribute::Bold),
            Cell::new("Details").add_attribute(Attribute::Bold),
        ]);

    for record in records {
        let license = match (&record.license_original, &record.license) {
            (Some(original), Some(resolved)) => format!("{} → {}", original, resolved),
            (_, Some(license)) => license.clone(),
            _ => "unknown".to_string(),
        };

        let (status_str, status_color) = match record.policy {
            AuditStatus::Allow => ("✓ allow", Color::Green),
            AuditStatus::Deny => ("✗ deny", Color::Red),
            AuditStatus::NeedsReview => ("⚠ review", Color::Yellow),
            AuditStatus::Internal => ("⌂ internal", Color::Cyan),
        };

        table.add_row(vec![
            Cell::new(&record.package),
            Cell::new(license),
            Cell::new(status_str)
                .fg(status_color)
                .set_alignment(CellAlignment::Center),
            Cell::new(&record.explanation),
        ]);
    }

    println!("{}", table);
}

fn render_internal_table(records: &[AuditRecord]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Package").add_attribute(Attribute::Bold),
            Cell::new("PURL").add_attribute(Attribute::Bold),
        ]);

    for record in records {
        table.add_row(vec![Cell::new(&record.package), Cell::new(&record.purl)]);
    }

    println!("{}", table);
}

fn summarize_licenses(records: &[AuditRecord]) -> String {
    let mut counts: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    for record in records {
        let license = record.license.as_deref().unwrap_or("unknown").to_string();
        *counts.entry(license).or_insert(0) += 1;
    }

    let mut pairs: Vec<(String, usize)> = counts.into_iter().collect();
    pairs.sort_by(|a, b| b.1.cmp(&a.1));

    let summary: Vec<String> = pairs
        .iter()
        .take(3)
        .map(|(license, count)| format!("{} ({})", license, count))
        .collect();

    if summary.is_empty() {
        String::new()
    } else {
        format!("[{}]", summary.join(", "))
    }
}
