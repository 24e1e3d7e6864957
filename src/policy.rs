use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::expr::alias::AliasTable;
use crate::models::{PolicyEntry, UsagePolicy};
use crate::purl::strip_query;

static VERSION_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-\d+(\.\d+)*$").expect("invalid regex"));

/// Policy document as stored in `policy.json`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDocument {
    #[serde(default)]
    pub policies: Vec<PolicyEntry>,
    #[serde(default)]
    pub license_aliases: HashMap<String, String>,
    #[serde(default)]
    pub combined_license_aliases: HashMap<String, String>,
}

impl Default for PolicyDocument {
    /// Built-in default policy used when no policy file is found.
    ///
    /// Permissive licenses are allowed, weak-copyleft licenses need review,
    /// and strong-copyleft licenses (GPL, AGPL) are denied.
    fn default() -> Self {
        let allow = ["MIT", "Apache-2.0", "BSD-2-Clause", "BSD-3-Clause", "ISC", "EPL-2.0"];
        let review = ["LGPL-2.1-only", "LGPL-3.0-only", "MPL-2.0", "CDDL-1.0"];
        let deny = ["GPL-2.0-only", "GPL-3.0-only", "AGPL-3.0-only"];

        let mut policies = Vec::new();
        for (ids, usage_policy) in [
            (&allow[..], UsagePolicy::Allow),
            (&review[..], UsagePolicy::NeedsReview),
            (&deny[..], UsagePolicy::Deny),
        ] {
            for id in ids {
                policies.push(PolicyEntry {
                    id: id.to_string(),
                    usage_policy,
                    reason: None,
                });
            }
        }

        let mut license_aliases = HashMap::new();
        for (alias, id) in [
            ("mit license", "MIT"),
            ("apache 2.0", "Apache-2.0"),
            ("apache license, version 2.0", "Apache-2.0"),
            ("gplv2", "GPL-2.0-only"),
            ("gplv3", "GPL-3.0-only"),
            ("public domain", "CC0-1.0"),
        ] {
            license_aliases.insert(alias.to_string(), id.to_string());
        }

        PolicyDocument {
            policies,
            license_aliases,
            combined_license_aliases: HashMap::new(),
        }
    }
}

/// Load the license policy, searching in order:
///
/// 1. the `--policy` override
/// 2. `<base_dir>/.license-audit/policy.json`
/// 3. `~/.config/license-audit/policy.json`
/// 4. Built-in [`PolicyDocument::default`]
pub fn load_policy(base_dir: &Path, policy_override: Option<&Path>) -> Result<PolicyDocument> {
    if let Some(path) = policy_override {
        return read_policy(path);
    }

    let project_policy = base_dir.join(".license-audit").join("policy.json");
    if project_policy.exists() {
        return read_policy(&project_policy);
    }

    if let Some(home) = dirs::home_dir() {
        let home_policy = home.join(".config").join("license-audit").join("policy.json");
        if home_policy.exists() {
            return read_policy(&home_policy);
        }
    }

    debug!("no policy file found, using built-in defaults");
    Ok(PolicyDocument::default())
}

fn read_policy(path: &Path) -> Result<PolicyDocument> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading policy file {}", path.display()))?;
    serde_json::from_str(strip_bom(&content))
        .with_context(|| format!("parsing policy file {}", path.display()))
}

/// Some Windows-produced JSON files begin with a UTF-8 byte order mark.
pub(crate) fn strip_bom(content: &str) -> &str {
    content.strip_prefix('\u{feff}').unwrap_or(content)
}

/// License policy entries with the lookup rules the evaluator relies on.
pub struct PolicyTable {
    entries: Vec<PolicyEntry>,
}

impl PolicyTable {
    pub fn new(entries: Vec<PolicyEntry>) -> Self {
        PolicyTable { entries }
    }

    /// Find the policy entry for one license id.
    ///
    /// Tries, in order: exact match on the alias-normalized and the original
    /// spelling, the same pair case-insensitively, and, for `or_later` ids,
    /// the `-only` / `-or-later` / bare variants of the base id.
    pub fn find(
        &self,
        license_id: &str,
        or_later: bool,
        aliases: &AliasTable,
    ) -> Option<&PolicyEntry> {
        let original_id = license_id.trim_end_matches('+');
        let normalized_id = aliases.normalize_id(original_id);

        for entry in &self.entries {
            if entry.id == normalized_id || entry.id == original_id {
                return Some(entry);
            }
        }

        let normalized_lower = normalized_id.to_lowercase();
        let original_lower = original_id.to_lowercase();
        for entry in &self.entries {
            let id_lower = entry.id.to_lowercase();
            if id_lower == normalized_lower || id_lower == original_lower {
                return Some(entry);
            }
        }

        if or_later {
            // GPL-2.0+ also satisfies policies written as GPL-2.0-only,
            // GPL-2.0-or-later, or plain GPL-2.0
            let base = original_id.replace("-only", "").replace("-or-later", "");
            for variant in
                [format!("{}-only", base), format!("{}-or-later", base), base]
            {
                let variant_lower = variant.to_lowercase();
                for entry in &self.entries {
                    if entry.id.to_lowercase() == variant_lower {
                        return Some(entry);
                    }
                }
            }
        }

        None
    }

    /// Find a policy entry covering a `base WITH exception` combination.
    ///
    /// Candidate ids are generated from the alias-normalized base and
    /// exception: the hyphenated `{base}-with-{exception}` form, the textual
    /// `{base} WITH {exception}` form, and the same pair with a trailing
    /// version suffix stripped from the exception. The base is also tried
    /// with its `-only` / `-or-later` suffix removed, so a policy written as
    /// `GPL-2.0-with-classpath-exception` covers `GPL-2.0-only WITH
    /// Classpath-exception-2.0`. All comparisons are case-insensitive.
    pub fn find_with(
        &self,
        base_license: &str,
        exception: &str,
        aliases: &AliasTable,
    ) -> Option<&PolicyEntry> {
        let base_normalized = aliases.normalize_id(base_license);
        let exception_normalized = aliases.normalize_id(exception);

        let mut bases = vec![base_normalized.clone()];
        let stripped = base_normalized.replace("-only", "").replace("-or-later", "");
        if stripped != base_normalized {
            bases.push(stripped);
        }

        let exception_base =
            VERSION_SUFFIX_RE.replace(&exception_normalized, "").into_owned();

        let mut combined_forms = Vec::new();
        for base in &bases {
            combined_forms.push(format!("{}-with-{}", base, exception_normalized));
            combined_forms.push(format!("{} WITH {}", base, exception_normalized));
            if exception_base != exception_normalized {
                combined_forms.push(format!("{}-with-{}", base, exception_base));
                combined_forms.push(format!("{}-with-{}-exception", base, exception_base));
            }
        }

        for combined in &combined_forms {
            let combined_lower = combined.to_lowercase();
            for entry in &self.entries {
                if entry.id.to_lowercase() == combined_lower {
                    return Some(entry);
                }
            }
        }

        None
    }
}

/// A purl-pattern policy override from the package policy file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackagePolicy {
    pub purl: String,
    pub usage_policy: UsagePolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PackagePolicyDocument {
    #[serde(default)]
    packages: Vec<PackagePolicy>,
}

pub fn load_package_policies(path: &Path) -> Result<Vec<PackagePolicy>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading package policy file {}", path.display()))?;
    let document: PackagePolicyDocument = serde_json::from_str(strip_bom(&content))
        .with_context(|| format!("parsing package policy file {}", path.display()))?;
    Ok(document.packages)
}

/// Match a purl against the package policies, first hit wins. Patterns and
/// purls are compared with their query parts stripped.
pub fn find_package_policy<'a>(
    purl: &str,
    package_policies: &'a [PackagePolicy],
) -> Option<&'a PackagePolicy> {
    let purl = strip_query(purl);
    package_policies.iter().find(|policy| {
        let pattern = strip_query(&policy.purl);
        !pattern.is_empty() && glob_match(pattern, purl)
    })
}

/// Shell-style glob matching with `*` and `?`, case-sensitive.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    let mut p = 0;
    let mut t = 0;
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, t));
            p += 1;
        } else if let Some((star_p, star_t)) = star {
            // Backtrack: let the last * absorb one more character
            p = star_p + 1;
            t = star_t + 1;
            star = Some((star_p, star_t + 1));
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }
    p == pattern.len()
}
