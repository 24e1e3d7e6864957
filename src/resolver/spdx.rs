use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;

use super::normalize_name;

const LICENSES_URL: &str =
    "https://raw.githubusercontent.com/spdx/license-list-data/main/json/licenses.json";
const EXCEPTIONS_URL: &str =
    "https://raw.githubusercontent.com/spdx/license-list-data/main/json/exceptions.json";

/// One license or exception from the SPDX license list.
#[derive(Debug, Clone)]
pub struct SpdxEntry {
    pub id: String,
    pub deprecated: bool,
    normalized_name: String,
}

impl SpdxEntry {
    pub fn new(id: impl Into<String>, name: impl Into<String>, deprecated: bool) -> Self {
        let name = name.into();
        SpdxEntry { id: id.into(), deprecated, normalized_name: normalize_name(&name) }
    }

    pub(crate) fn normalized_name(&self) -> &str {
        &self.normalized_name
    }
}

/// The SPDX license list, held in memory for the lifetime of a run.
///
/// An empty index is a valid degraded state: the resolver then skips the
/// match strategies that need it instead of failing.
#[derive(Debug, Default)]
pub struct SpdxIndex {
    licenses: Vec<SpdxEntry>,
    exceptions: Vec<SpdxEntry>,
}

impl SpdxIndex {
    pub fn new(licenses: Vec<SpdxEntry>, exceptions: Vec<SpdxEntry>) -> Self {
        SpdxIndex { licenses, exceptions }
    }

    pub fn empty() -> Self {
        SpdxIndex::default()
    }

    pub fn is_empty(&self) -> bool {
        self.licenses.is_empty() && self.exceptions.is_empty()
    }

    pub fn license_count(&self) -> usize {
        self.licenses.len()
    }

    pub fn exception_count(&self) -> usize {
        self.exceptions.len()
    }

    /// Whether `spdx_id` is a known license id, spelled exactly.
    pub fn contains(&self, spdx_id: &str) -> bool {
        self.licenses.iter().any(|entry| entry.id == spdx_id)
    }

    /// All entries, licenses before exceptions.
    pub(crate) fn entries(&self) -> impl Iterator<Item = &SpdxEntry> {
        self.licenses.iter().chain(self.exceptions.iter())
    }

    /// Download the license and exception lists from the SPDX data repository.
    pub async fn fetch(client: &reqwest::Client) -> Result<SpdxIndex> {
        debug!("fetching SPDX license list");

        let licenses: LicenseListFile = client
            .get(LICENSES_URL)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("parsing SPDX license list")?;

        let exceptions: ExceptionListFile = client
            .get(EXCEPTIONS_URL)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("parsing SPDX exception list")?;

        let index = SpdxIndex::new(
            licenses
                .licenses
                .into_iter()
                .map(|record| {
                    SpdxEntry::new(record.license_id, record.name, record.is_deprecated_license_id)
                })
                .collect(),
            exceptions
                .exceptions
                .into_iter()
                .map(|record| {
                    SpdxEntry::new(
                        record.license_exception_id,
                        record.name,
                        record.is_deprecated_license_id,
                    )
                })
                .collect(),
        );

        debug!(
            "loaded {} licenses and {} exceptions",
            index.license_count(),
            index.exception_count()
        );
        Ok(index)
    }
}

#[derive(Deserialize)]
struct LicenseListFile {
    #[serde(default)]
    licenses: Vec<LicenseRecord>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LicenseRecord {
    license_id: String,
    name: String,
    #[serde(default)]
    is_deprecated_license_id: bool,
}

#[derive(Deserialize)]
struct ExceptionListFile {
    #[serde(default)]
    exceptions: Vec<ExceptionRecord>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExceptionRecord {
    license_exception_id: String,
    name: String,
    #[serde(default)]
    is_deprecated_license_id: bool,
}
