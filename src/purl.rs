/// Minimal package-url decomposition, covering what the audit and
/// enrichment passes need. Not a full purl implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Purl {
    /// Registry ecosystem, e.g. `npm`, `maven`, `pypi`, `githubactions`.
    pub ecosystem: String,
    /// Package name; Maven coordinates become `group:artifact`.
    pub name: String,
    pub version: Option<String>,
}

/// Drop the query and subpath parts of a purl.
pub fn strip_query(purl: &str) -> &str {
    let purl = purl.split_once('?').map(|(head, _)| head).unwrap_or(purl);
    purl.split_once('#').map(|(head, _)| head).unwrap_or(purl)
}

pub fn is_github_action(purl: &str) -> bool {
    purl.starts_with("pkg:githubactions/")
}

/// Parse `pkg:<ecosystem>/[namespace/]name[@version]`, ignoring qualifiers.
/// Returns `None` for strings that do not look like a purl.
pub fn parse(purl: &str) -> Option<Purl> {
    let rest = strip_query(purl).strip_prefix("pkg:")?;
    let parts: Vec<&str> = rest.split('/').collect();
    if parts.len() < 2 || parts[1].is_empty() {
        return None;
    }

    let ecosystem = parts[0].to_string();

    if ecosystem == "maven" {
        // Maven purls carry the group as namespace: pkg:maven/group/artifact@v
        if parts.len() < 3 {
            return None;
        }
        let namespace = parts[1];
        let (artifact, version) = split_version(parts[2]);
        return Some(Purl {
            ecosystem,
            name: format!("{}:{}", namespace, artifact),
            version,
        });
    }

    let (_, version) = split_version(parts[parts.len() - 1]);
    let name = if parts.len() >= 3 {
        format!("{}/{}", parts[1], split_version(parts[2]).0)
    } else {
        split_version(parts[1]).0.to_string()
    };

    Some(Purl { ecosystem, name, version })
}

fn split_version(part: &str) -> (&str, Option<String>) {
    match part.split_once('@') {
        Some((name, version)) => (name, Some(version.to_string())),
        None => (part, None),
    }
}
