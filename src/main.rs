//! `license-audit` checks every package in an SPDX SBOM against a license
//! policy and reports what needs attention.
//!
//! # Flow
//! 1. Parse CLI arguments ([`cli`]).
//! 2. Load tool settings ([`config::load_settings`]), the license policy
//!    ([`policy::load_policy`]), and the SBOM ([`sbom::SbomFile`]).
//! 3. Build the license resolver ([`resolver`]) unless `--no-resolve`.
//! 4. Optionally fill in missing licenses from package registries
//!    (`--online`, [`registry`]).
//! 5. Audit every package ([`audit::Auditor`]).
//! 6. Render the requested report ([`report`]) and the GitHub step summary.
//! 7. Exit `0` (clean) or `1` (at least one denied package).

mod audit;
mod cli;
mod config;
mod expr;
mod models;
mod policy;
mod purl;
mod registry;
mod report;
mod resolver;
mod sbom;

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use log::{debug, error, info, warn};

use audit::Auditor;
use cli::{Cli, ReportFormat};
use config::{load_settings, ResolverSettings};
use expr::alias::AliasTable;
use policy::{load_package_policies, load_policy, PolicyTable};
use resolver::ai::{AiLookup, ModelClient};
use resolver::spdx::SpdxIndex;
use resolver::LicenseResolver;
use sbom::SbomFile;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let base_dir = cli.sbom.parent().unwrap_or_else(|| Path::new("."));
    let settings = load_settings(base_dir, cli.config.as_deref())?;
    let policy = load_policy(base_dir, cli.policy.as_deref())?;
    let package_policies = match cli.package_policy.as_deref() {
        Some(path) => load_package_policies(path)?,
        None => Vec::new(),
    };

    let mut sbom = SbomFile::load(&cli.sbom)?;
    info!(
        "loaded {} packages from {}",
        sbom.packages.len(),
        cli.sbom.display()
    );

    let client = reqwest::Client::builder()
        .user_agent(concat!("license-audit/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(10))
        .build()?;

    let resolver = if cli.no_resolve {
        None
    } else {
        Some(build_resolver(&client, &settings.resolver).await)
    };

    if cli.online {
        registry::enrich_sbom(&client, &mut sbom, resolver.as_ref(), cli.quiet).await?;
        if let Some(path) = &cli.enriched_sbom {
            sbom.save(path)?;
            info!("wrote enriched SBOM to {}", path.display());
        }
    } else if cli.enriched_sbom.is_some() {
        warn!("--enriched-sbom has no effect without --online");
    }

    let mut internal_patterns = settings.audit.internal_patterns.clone();
    internal_patterns.extend(cli.internal_patterns.iter().cloned());

    let aliases = AliasTable::new(&policy.license_aliases, &policy.combined_license_aliases);
    let policy_table = PolicyTable::new(policy.policies);

    let auditor = Auditor::new(
        &policy_table,
        &aliases,
        &package_policies,
        &internal_patterns,
        settings.audit.allow_github_actions,
        resolver.as_ref(),
    )?;
    let audit_report = auditor.run(&sbom.packages).await;

    if let Some(path) = &cli.output {
        std::fs::write(path, serde_json::to_string_pretty(&audit_report)?)?;
        info!("wrote audit results to {}", path.display());
    }

    match cli.report {
        ReportFormat::Terminal => {
            report::terminal::render(&audit_report, &cli.sbom, cli.verbose, cli.quiet)?;
        }
        ReportFormat::Markdown => {
            println!("{}", report::markdown::render(&audit_report));
        }
        ReportFormat::Json => {
            if cli.output.is_none() {
                println!("{}", serde_json::to_string_pretty(&audit_report)?);
            }
        }
    }

    // A failed step summary must not fail the audit itself
    if let Err(err) = report::markdown::write_step_summary(&audit_report) {
        error!("failed to write step summary: {:#}", err);
    }

    if audit_report.has_denials() {
        std::process::exit(1);
    }

    Ok(())
}

fn init_logging(cli: &Cli) {
    let level = if cli.debug {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    let env = env_logger::Env::default().filter_or("RUST_LOG", level);
    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(cli.debug)
        .init();
}

async fn build_resolver(client: &reqwest::Client, settings: &ResolverSettings) -> LicenseResolver {
    let index = match SpdxIndex::fetch(client).await {
        Ok(index) => {
            info!(
                "loaded SPDX license list: {} licenses, {} exceptions",
                index.license_count(),
                index.exception_count()
            );
            index
        }
        Err(err) => {
            warn!(
                "failed to fetch SPDX license list, resolution will run degraded: {:#}",
                err
            );
            SpdxIndex::empty()
        }
    };

    let mut resolver = LicenseResolver::new(index)
        .with_fuzzy_threshold(settings.fuzzy_threshold)
        .with_ai_timeout(settings.ai_timeout());
    if let Some(ai) = build_ai_lookup(client, settings) {
        resolver = resolver.with_ai(ai);
    }
    resolver
}

/// Credentials come from the environment only. A configured provider with a
/// missing credential drops back to the deterministic strategies.
fn build_ai_lookup(
    client: &reqwest::Client,
    settings: &ResolverSettings,
) -> Option<Box<dyn AiLookup>> {
    match settings.ai_provider.as_str() {
        "github" => {
            let token = env_credential("GITHUB_TOKEN")?;
            Some(Box::new(ModelClient::github(client.clone(), token, &settings.model)))
        }
        "openai" => {
            let key = env_credential("OPENAI_API_KEY")?;
            Some(Box::new(ModelClient::openai(client.clone(), key, &settings.model)))
        }
        "none" => None,
        other => {
            warn!("unknown AI provider '{}', AI resolution disabled", other);
            None
        }
    }
}

fn env_credential(var: &str) -> Option<String> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => {
            debug!("{} not set, AI resolution disabled", var);
            None
        }
    }
}
