use anyhow::Result;
use log::debug;
use reqwest::Client;
use serde::Deserialize;

const API_BASE: &str = "https://api.deps.dev/v3alpha";

/// Fetch the license list for a package version from deps.dev.
///
/// When `version` is `None` the package endpoint is queried first and the
/// newest listed version is used. Returns `Ok(None)` when the package or
/// version is unknown or carries no license data.
pub async fn fetch_licenses(
    client: &Client,
    ecosystem: &str,
    name: &str,
    version: Option<&str>,
) -> Result<Option<Vec<String>>> {
    let encoded = urlencode(name);

    let version = match version {
        Some(version) => version.to_string(),
        None => match latest_version(client, ecosystem, &encoded).await? {
            Some(version) => version,
            None => return Ok(None),
        },
    };

    let url = format!(
        "{}/systems/{}/packages/{}/versions/{}",
        API_BASE, ecosystem, encoded, version
    );
    let response = client.get(&url).send().await?;
    if !response.status().is_success() {
        debug!("deps.dev returned {} for {}@{}", response.status(), name, version);
        return Ok(None);
    }

    let data: VersionResponse = response.json().await?;
    Ok(extract_licenses(data))
}

async fn latest_version(
    client: &Client,
    ecosystem: &str,
    encoded_name: &str,
) -> Result<Option<String>> {
    let url = format!("{}/systems/{}/packages/{}", API_BASE, ecosystem, encoded_name);
    let response = client.get(&url).send().await?;
    if !response.status().is_success() {
        debug!("deps.dev returned {} for {}", response.status(), encoded_name);
        return Ok(None);
    }

    let data: PackageResponse = response.json().await?;
    Ok(data
        .versions
        .into_iter()
        .next()
        .and_then(|entry| entry.version_key)
        .map(|key| key.version))
}

/// The `licenseDetails` entries carry registry-reported names that are more
/// precise than the coarse `licenses` field, so they win when present.
fn extract_licenses(data: VersionResponse) -> Option<Vec<String>> {
    let detailed: Vec<String> = data
        .license_details
        .into_iter()
        .filter_map(|detail| detail.license)
        .collect();
    let licenses = if detailed.is_empty() { data.licenses } else { detailed };
    if licenses.is_empty() {
        None
    } else {
        Some(licenses)
    }
}

/// Percent-encode a package name for the deps.dev URL path. Everything but
/// RFC 3986 unreserved characters is encoded, slashes included.
fn urlencode(name: &str) -> String {
    let mut encoded = String::with_capacity(name.len());
    for byte in name.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                encoded.push(byte as char);
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionResponse {
    #[serde(default)]
    licenses: Vec<String>,
    #[serde(default)]
    license_details: Vec<LicenseDetail>,
}

#[derive(Deserialize)]
struct LicenseDetail {
    license: Option<String>,
}

#[derive(Deserialize)]
struct PackageResponse {
    #[serde(default)]
    versions: Vec<PackageVersion>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PackageVersion {
    #[serde(default)]
    version_key: Option<VersionKey>,
}

#[derive(Deserialize)]
struct VersionKey {
    version: String,
}
