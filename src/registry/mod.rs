//! Async clients for upstream package data and the SBOM enrichment pass.
//!
//! - [`depsdev`] queries the deps.dev API for per-version license lists.
//! - [`maven`] reads license names straight from POMs on Maven Central,
//!   following parent POMs when an artifact declares none of its own.

pub mod depsdev;
pub mod maven;

use std::collections::BTreeMap;

use anyhow::Result;
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use reqwest::Client;

use crate::models::LicenseResolution;
use crate::purl::{is_github_action, parse, Purl};
use crate::resolver::LicenseResolver;
use crate::sbom::{Enrichment, Package, SbomFile};

const BATCH_SIZE: usize = 75;

#[derive(Debug, Default)]
pub struct EnrichmentStats {
    pub enriched: usize,
    pub skipped: usize,
    pub resolved: usize,
    pub methods: BTreeMap<String, usize>,
}

/// Enrich every package in the SBOM with license data from deps.dev.
///
/// Lookups run concurrently in batches and the results are applied in order
/// afterwards. Packages without a usable purl, GitHub-hosted dependencies,
/// and GitHub Actions are left untouched.
pub async fn enrich_sbom(
    client: &Client,
    sbom: &mut SbomFile,
    resolver: Option<&LicenseResolver>,
    quiet: bool,
) -> Result<EnrichmentStats> {
    let mut stats = EnrichmentStats::default();

    let pb = if !quiet {
        let pb = ProgressBar::new(sbom.packages.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )?
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    for batch in sbom.packages.chunks_mut(BATCH_SIZE) {
        let futures: Vec<_> = batch
            .iter()
            .map(|package| {
                let client = client.clone();
                let purl = package.purl().to_string();
                async move { fetch_for_purl(&client, &purl).await }
            })
            .collect();

        let results = join_all(futures).await;

        for (package, result) in batch.iter_mut().zip(results) {
            if let Some(pb) = &pb {
                pb.inc(1);
            }
            match result {
                Some((purl, licenses)) => {
                    apply_licenses(client, package, purl, licenses, resolver, &mut stats).await;
                }
                None => stats.skipped += 1,
            }
        }
    }

    if let Some(pb) = pb {
        pb.finish_with_message("Done");
    }

    info!("enriched {} packages, skipped {}", stats.enriched, stats.skipped);
    Ok(stats)
}

async fn fetch_for_purl(client: &Client, purl: &str) -> Option<(Purl, Vec<String>)> {
    if purl == "purl-not-found" {
        return None;
    }
    // GitHub-hosted dependencies and Actions have no registry to ask
    if purl.contains("github.com") || is_github_action(purl) {
        return None;
    }

    let parsed = parse(purl)?;
    let fetched = depsdev::fetch_licenses(
        client,
        &parsed.ecosystem,
        &parsed.name,
        parsed.version.as_deref(),
    )
    .await;

    match fetched {
        Ok(Some(licenses)) => Some((parsed, licenses)),
        Ok(None) => None,
        Err(err) => {
            warn!("deps.dev lookup failed for {}: {}", purl, err);
            None
        }
    }
}

async fn apply_licenses(
    client: &Client,
    package: &mut Package,
    purl: Purl,
    licenses: Vec<String>,
    resolver: Option<&LicenseResolver>,
    stats: &mut EnrichmentStats,
) {
    let mut resolved_licenses = Vec::with_capacity(licenses.len());

    for license in &licenses {
        let mut name = license.clone();

        // deps.dev reports "non-standard" for many Eclipse artifacts whose
        // POM carries a perfectly good license name
        if name == "non-standard"
            && purl.ecosystem == "maven"
            && !licenses.iter().any(|entry| entry.contains("Eclipse Public License"))
        {
            match maven::fetch_pom_license(client, &purl.name, purl.version.as_deref()).await {
                Ok(Some(pom_license)) => {
                    debug!("POM for {} names license: {}", purl.name, pom_license);
                    name = pom_license;
                }
                Ok(None) => {}
                Err(err) => debug!("POM lookup failed for {}: {}", purl.name, err),
            }
        }

        let Some(resolver) = resolver else {
            resolved_licenses.push(name);
            continue;
        };

        let result = resolver.resolve(&name).await;
        match &result.resolved {
            Some(resolved) => {
                resolved_licenses.push(resolved.clone());
                stats.resolved += 1;
                *stats.methods.entry(result.method.to_string()).or_insert(0) += 1;
                package
                    .enrichment
                    .get_or_insert_with(Enrichment::default)
                    .license_resolutions
                    .push(LicenseResolution::from(&result));
            }
            None => resolved_licenses.push(name),
        }
    }

    if resolved_licenses.is_empty() {
        stats.skipped += 1;
        return;
    }

    package.license_concluded = Some(resolved_licenses.join(" AND "));
    stats.enriched += 1;
}
