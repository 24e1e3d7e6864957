use std::collections::BTreeMap;

use anyhow::{Context, Result};
use log::{debug, warn};
use regex::Regex;
use serde::Serialize;

use crate::expr::alias::AliasTable;
use crate::expr::parser::Evaluator;
use crate::models::{AuditRecord, AuditStatus, LicenseResolution, UsagePolicy};
use crate::policy::{find_package_policy, PackagePolicy, PolicyTable};
use crate::purl::is_github_action;
use crate::resolver::LicenseResolver;
use crate::sbom::Package;

/// Audits SBOM packages against the license policy.
///
/// Per package, the checks run in a fixed order: internal-dependency
/// patterns, package policy overrides, the no-license case, and finally the
/// license expression itself. Licenses the policy cannot place get a second
/// chance through the resolver.
pub struct Auditor<'a> {
    evaluator: Evaluator<'a>,
    package_policies: &'a [PackagePolicy],
    internal_patterns: Vec<Regex>,
    allow_github_actions: bool,
    resolver: Option<&'a LicenseResolver>,
}

impl<'a> Auditor<'a> {
    pub fn new(
        table: &'a PolicyTable,
        aliases: &'a AliasTable,
        package_policies: &'a [PackagePolicy],
        internal_patterns: &[String],
        allow_github_actions: bool,
        resolver: Option<&'a LicenseResolver>,
    ) -> Result<Self> {
        let internal_patterns = internal_patterns
            .iter()
            .map(|pattern| {
                // Patterns match from the start of the purl or name
                Regex::new(&format!("^(?:{})", pattern))
                    .with_context(|| format!("invalid internal dependency pattern '{}'", pattern))
            })
            .collect::<Result<_>>()?;

        Ok(Auditor {
            evaluator: Evaluator::new(table, aliases),
            package_policies,
            internal_patterns,
            allow_github_actions,
            resolver,
        })
    }

    pub async fn run(&self, packages: &[Package]) -> AuditReport {
        let mut records = Vec::with_capacity(packages.len());
        for package in packages {
            records.push(self.audit_package(package).await);
        }
        AuditReport::from_records(records)
    }

    pub async fn audit_package(&self, package: &Package) -> AuditRecord {
        let display_name = package.display_name();
        let purl = package.purl();

        if self.is_internal(purl, &package.name) {
            debug!("skipping internal dependency {}", display_name);
            return AuditRecord {
                package: display_name,
                purl: purl.to_string(),
                license: None,
                policy: AuditStatus::Internal,
                package_policy: false,
                explanation: "internal dependency".to_string(),
                resolution: None,
                license_original: None,
            };
        }

        if let Some(policy) = find_package_policy(purl, self.package_policies) {
            debug!("package policy override for {}: {}", purl, policy.usage_policy);
            return AuditRecord {
                package: display_name,
                purl: purl.to_string(),
                license: package.license_concluded.clone(),
                policy: policy.usage_policy.to_status(),
                package_policy: true,
                explanation: policy
                    .reason
                    .clone()
                    .unwrap_or_else(|| "package policy".to_string()),
                resolution: None,
                license_original: None,
            };
        }

        let license = package.license_concluded.as_deref().unwrap_or("").trim();
        if license.is_empty() || license == "NOASSERTION" || license == "NONE" {
            return self.no_license_record(display_name, purl);
        }

        let evaluation = self.evaluator.evaluate(license);
        let needs_resolution =
            license == "non-standard" || evaluation.policy == UsagePolicy::NeedsReview;

        if needs_resolution {
            if let Some(record) = self.try_resolve(package, license).await {
                return record;
            }
        }

        AuditRecord {
            package: display_name,
            purl: purl.to_string(),
            license: Some(license.to_string()),
            policy: evaluation.policy.to_status(),
            package_policy: false,
            explanation: evaluation.explanation,
            resolution: None,
            license_original: None,
        }
    }

    fn is_internal(&self, purl: &str, name: &str) -> bool {
        self.internal_patterns
            .iter()
            .any(|pattern| pattern.is_match(purl) || pattern.is_match(name))
    }

    fn no_license_record(&self, display_name: String, purl: &str) -> AuditRecord {
        let (policy, explanation) = if self.allow_github_actions && is_github_action(purl) {
            debug!("GitHub Action {} has no license metadata, allowing", display_name);
            (AuditStatus::Allow, "GitHub Action without license metadata".to_string())
        } else {
            warn!("no license found for {}, marking for review", display_name);
            (AuditStatus::NeedsReview, "No license found".to_string())
        };

        AuditRecord {
            package: display_name,
            purl: purl.to_string(),
            license: Some("NO-LICENSE-FOUND".to_string()),
            policy,
            package_policy: false,
            explanation,
            resolution: None,
            license_original: None,
        }
    }

    /// Second chance for a license the policy cannot place: resolve the
    /// vendor name the enrichment recorded (or the license string itself)
    /// and re-evaluate the policy on whatever comes back.
    async fn try_resolve(&self, package: &Package, license: &str) -> Option<AuditRecord> {
        let resolver = self.resolver?;

        let original_name = original_license_name(package, license);
        debug!("attempting to resolve unknown license '{}'", original_name);
        let result = resolver.resolve(original_name).await;
        let resolved = result.resolved.clone()?;

        let evaluation = self.evaluator.evaluate(&resolved);
        Some(AuditRecord {
            package: package.display_name(),
            purl: package.purl().to_string(),
            license: Some(resolved),
            policy: evaluation.policy.to_status(),
            package_policy: false,
            explanation: evaluation.explanation,
            resolution: Some(LicenseResolution::from(&result)),
            license_original: Some(license.to_string()),
        })
    }
}

/// The raw vendor name behind an enriched license, when the enrichment
/// metadata recorded one.
fn original_license_name<'p>(package: &'p Package, license: &'p str) -> &'p str {
    package
        .enrichment
        .as_ref()
        .and_then(|enrichment| {
            enrichment
                .license_resolutions
                .iter()
                .find(|resolution| resolution.resolved.as_deref() == Some(license))
        })
        .map(|resolution| resolution.original.as_str())
        .unwrap_or(license)
}

#[derive(Debug, Serialize)]
pub struct AuditReport {
    pub audit_results: Vec<AuditRecord>,
    pub policy_summary: BTreeMap<String, usize>,
    pub total_components: usize,
    pub resolution_stats: BTreeMap<String, usize>,
    pub denied: Vec<AuditRecord>,
    pub needs_review: Vec<AuditRecord>,
    pub allowed: Vec<AuditRecord>,
    pub internal: Vec<AuditRecord>,
    #[serde(skip)]
    pub gh_actions_count: usize,
}

impl AuditReport {
    pub fn from_records(records: Vec<AuditRecord>) -> Self {
        let mut policy_summary = BTreeMap::new();
        let mut resolution_stats = BTreeMap::new();
        let mut denied = Vec::new();
        let mut needs_review = Vec::new();
        let mut allowed = Vec::new();
        let mut internal = Vec::new();
        let mut gh_actions_count = 0;

        for record in &records {
            *policy_summary.entry(record.policy.to_string()).or_insert(0) += 1;
            if let Some(resolution) = &record.resolution {
                *resolution_stats.entry(resolution.method.clone()).or_insert(0) += 1;
            }
            match record.policy {
                AuditStatus::Deny => denied.push(record.clone()),
                AuditStatus::NeedsReview => needs_review.push(record.clone()),
                AuditStatus::Internal => internal.push(record.clone()),
                AuditStatus::Allow => {
                    if record.purl.starts_with("pkg:githubactions/") {
                        gh_actions_count += 1;
                    }
                    allowed.push(record.clone());
                }
            }
        }

        AuditReport {
            total_components: records.len(),
            audit_results: records,
            policy_summary,
            resolution_stats,
            denied,
            needs_review,
            allowed,
            internal,
            gh_actions_count,
        }
    }

    pub fn has_denials(&self) -> bool {
        !self.denied.is_empty()
    }

    pub fn resolved_count(&self) -> usize {
        self.resolution_stats.values().sum()
    }
}
