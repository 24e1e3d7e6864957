use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::LicenseResolution;
use crate::policy::strip_bom;

/// An SPDX (or CycloneDX-shaped) SBOM document.
///
/// The original JSON tree is kept as-is in `root`; only the package list is
/// parsed into typed entries. On save the typed list is spliced back in, so
/// top-level fields we never looked at survive a round trip.
pub struct SbomFile {
    root: Value,
    nested: bool,
    list_key: &'static str,
    pub packages: Vec<Package>,
}

impl SbomFile {
    pub fn load(path: &Path) -> Result<SbomFile> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading SBOM {}", path.display()))?;
        let root: Value = serde_json::from_str(strip_bom(&content))
            .with_context(|| format!("parsing SBOM {}", path.display()))?;

        // GitHub's dependency graph API wraps the document in an "sbom" key
        let nested = root.get("sbom").is_some();
        let document = if nested { &root["sbom"] } else { &root };

        let (list_key, entries) = match document.get("packages").and_then(Value::as_array) {
            Some(packages) if !packages.is_empty() => ("packages", packages.clone()),
            _ => match document.get("components").and_then(Value::as_array) {
                Some(components) if !components.is_empty() => ("components", components.clone()),
                _ => ("packages", Vec::new()),
            },
        };

        let packages: Vec<Package> = entries
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<_, _>>()
            .with_context(|| format!("reading package entries from {}", path.display()))?;

        debug!("loaded {} packages from {}", packages.len(), path.display());
        Ok(SbomFile { root, nested, list_key, packages })
    }

    pub fn save(&mut self, path: &Path) -> Result<()> {
        let serialized = serde_json::to_value(&self.packages).context("serializing packages")?;
        let document = if self.nested {
            self.root.get_mut("sbom").and_then(Value::as_object_mut)
        } else {
            self.root.as_object_mut()
        };
        if let Some(document) = document {
            document.insert(self.list_key.to_string(), serialized);
        }

        let output = serde_json::to_string_pretty(&self.root).context("serializing SBOM")?;
        std::fs::write(path, output)
            .with_context(|| format!("writing SBOM {}", path.display()))?;
        debug!("wrote SBOM to {}", path.display());
        Ok(())
    }
}

/// One package entry from the SBOM.
///
/// Only the fields the audit touches are typed; everything else rides along
/// in `extra` so a rewritten SBOM keeps data we never interpreted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "version", skip_serializing_if = "Option::is_none")]
    pub version_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_concluded: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub external_refs: Vec<ExternalRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<Enrichment>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Package {
    /// The package URL from the external references, or a sentinel when the
    /// entry has none.
    pub fn purl(&self) -> &str {
        self.external_refs
            .iter()
            .find(|reference| reference.reference_type == "purl")
            .map(|reference| reference.reference_locator.as_str())
            .unwrap_or("purl-not-found")
    }

    pub fn display_name(&self) -> String {
        let name = if self.name.is_empty() { "unknown" } else { self.name.as_str() };
        let version = self.version_info.as_deref().unwrap_or("unknown");
        format!("{}@{}", name, version)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalRef {
    #[serde(default)]
    pub reference_type: String,
    #[serde(default)]
    pub reference_locator: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Metadata this tool adds to packages it touched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrichment {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub license_resolutions: Vec<LicenseResolution>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_sbom(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_flat_spdx_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sbom(
            &dir,
            "sbom.json",
            r#"{
                "spdxVersion": "SPDX-2.3",
                "packages": [{
                    "SPDXID": "SPDXRef-pkg-1",
                    "name": "left-pad",
                    "versionInfo": "1.3.0",
                    "licenseConcluded": "MIT",
                    "externalRefs": [{
                        "referenceCategory": "PACKAGE-MANAGER",
                        "referenceType": "purl",
                        "referenceLocator": "pkg:npm/left-pad@1.3.0"
                    }]
                }]
            }"#,
        );

        let sbom = SbomFile::load(&path).unwrap();
        assert_eq!(sbom.packages.len(), 1);
        let package = &sbom.packages[0];
        assert_eq!(package.display_name(), "left-pad@1.3.0");
        assert_eq!(package.purl(), "pkg:npm/left-pad@1.3.0");
        assert_eq!(package.license_concluded.as_deref(), Some("MIT"));
    }

    #[test]
    fn test_round_trip_keeps_unknown_fields_and_nesting() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sbom(
            &dir,
            "sbom.json",
            r#"{
                "sbom": {
                    "spdxVersion": "SPDX-2.3",
                    "creationInfo": {"created": "2025-01-01T00:00:00Z"},
                    "packages": [{
                        "SPDXID": "SPDXRef-pkg-1",
                        "name": "widget",
                        "versionInfo": "2.0.0",
                        "licenseConcluded": "NOASSERTION",
                        "copyrightText": "NOASSERTION"
                    }]
                }
            }"#,
        );

        let mut sbom = SbomFile::load(&path).unwrap();
        sbom.packages[0].license_concluded = Some("Apache-2.0".to_string());

        let out = dir.path().join("out.json");
        sbom.save(&out).unwrap();

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        let package = &raw["sbom"]["packages"][0];
        assert_eq!(package["licenseConcluded"], "Apache-2.0");
        assert_eq!(package["SPDXID"], "SPDXRef-pkg-1");
        assert_eq!(package["copyrightText"], "NOASSERTION");
        assert_eq!(raw["sbom"]["creationInfo"]["created"], "2025-01-01T00:00:00Z");
    }

    #[test]
    fn test_components_list_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sbom(
            &dir,
            "sbom.json",
            r#"{
                "packages": [],
                "components": [{"name": "gadget", "version": "0.1.0"}]
            }"#,
        );

        let mut sbom = SbomFile::load(&path).unwrap();
        assert_eq!(sbom.packages.len(), 1);
        assert_eq!(sbom.packages[0].display_name(), "gadget@0.1.0");

        let out = dir.path().join("out.json");
        sbom.save(&out).unwrap();
        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(raw["components"][0]["name"], "gadget");
    }

    #[test]
    fn test_byte_order_mark_is_stripped() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sbom(&dir, "sbom.json", "\u{feff}{\"packages\": []}");
        let sbom = SbomFile::load(&path).unwrap();
        assert!(sbom.packages.is_empty());
    }

    #[test]
    fn test_missing_purl_gets_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sbom(
            &dir,
            "sbom.json",
            r#"{"packages": [{"name": "no-refs"}]}"#,
        );
        let sbom = SbomFile::load(&path).unwrap();
        assert_eq!(sbom.packages[0].purl(), "purl-not-found");
        assert_eq!(sbom.packages[0].display_name(), "no-refs@unknown");
    }

    #[test]
    fn test_enrichment_metadata_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sbom(
            &dir,
            "sbom.json",
            r#"{
                "packages": [{
                    "name": "widget",
                    "enrichment": {
                        "licenseResolutions": [{
                            "original": "Eclipse Public License v2.0",
                            "resolved": "EPL-2.0",
                            "method": "exact_match",
                            "confidence": 1.0
                        }]
                    }
                }]
            }"#,
        );

        let sbom = SbomFile::load(&path).unwrap();
        let enrichment = sbom.packages[0].enrichment.as_ref().unwrap();
        assert_eq!(enrichment.license_resolutions.len(), 1);
        assert_eq!(enrichment.license_resolutions[0].resolved.as_deref(), Some("EPL-2.0"));
    }
}
