use anyhow::Result;
use log::debug;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;

const REPO_BASE: &str = "https://repo1.maven.org/maven2";
const MAX_PARENT_DEPTH: usize = 5;

/// Fetch the license name declared in a Maven artifact's POM on Maven Central.
///
/// The `name` is expected in `groupId:artifactId` format. Without a version
/// the newest one from the repository metadata is used. POMs that declare no
/// license of their own are followed up the parent chain, a few levels deep.
pub async fn fetch_pom_license(
    client: &Client,
    name: &str,
    version: Option<&str>,
) -> Result<Option<String>> {
    let Some((group_id, artifact_id)) = name.split_once(':') else {
        return Ok(None);
    };

    let mut group_path = group_id.replace('.', "/");
    let mut artifact = artifact_id.to_string();
    let mut version = match version {
        Some(version) => version.to_string(),
        None => match fetch_latest_version(client, &group_path, &artifact).await? {
            Some(version) => version,
            None => return Ok(None),
        },
    };

    for _ in 0..MAX_PARENT_DEPTH {
        let pom_url = format!(
            "{}/{}/{}/{}/{}-{}.pom",
            REPO_BASE, group_path, artifact, version, artifact, version
        );

        let response = client.get(&pom_url).send().await?;
        if !response.status().is_success() {
            debug!("no POM at {} ({})", pom_url, response.status());
            return Ok(None);
        }

        let pom_xml = response.text().await?;
        if let Some(license) = extract_license(&pom_xml) {
            debug!("found license in POM for {}:{}: {}", artifact, version, license);
            return Ok(Some(license));
        }

        // No license of its own, see whether a parent POM declares one
        let Some(parent) = extract_parent(&pom_xml) else {
            return Ok(None);
        };
        debug!(
            "following parent POM {}:{}:{}",
            parent.group_id, parent.artifact_id, parent.version
        );
        group_path = parent.group_id.replace('.', "/");
        artifact = parent.artifact_id;
        version = parent.version;
    }

    Ok(None)
}

async fn fetch_latest_version(
    client: &Client,
    group_path: &str,
    artifact_id: &str,
) -> Result<Option<String>> {
    let url = format!("{}/{}/{}/maven-metadata.xml", REPO_BASE, group_path, artifact_id);
    let response = client.get(&url).send().await?;
    if !response.status().is_success() {
        debug!("no repository metadata for {} ({})", artifact_id, response.status());
        return Ok(None);
    }
    let metadata_xml = response.text().await?;
    Ok(extract_latest_version(&metadata_xml))
}

/// Extract the first `<license><name>` from a POM XML string. Tag names are
/// compared without namespaces, so POMs with and without the Maven default
/// namespace both work.
fn extract_license(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut in_licenses = false;
    let mut in_license = false;
    let mut in_name = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let tag = String::from_utf8_lossy(e.name().local_name().as_ref()).into_owned();
                match tag.as_str() {
                    "licenses" => in_licenses = true,
                    "license" if in_licenses => in_license = true,
                    "name" if in_license => in_name = true,
                    _ => {}
                }
            }
            Ok(Event::Text(ref e)) if in_name => {
                if let Ok(text) = e.unescape() {
                    return Some(text.trim().to_string());
                }
            }
            Ok(Event::End(ref e)) => {
                let tag = String::from_utf8_lossy(e.name().local_name().as_ref()).into_owned();
                match tag.as_str() {
                    "name" => in_name = false,
                    "license" => in_license = false,
                    "licenses" => break,
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    None
}

struct ParentRef {
    group_id: String,
    artifact_id: String,
    version: String,
}

/// Read the coordinates of the first `<parent>` block. All three of groupId,
/// artifactId, and version must be present.
fn extract_parent(xml: &str) -> Option<ParentRef> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut in_parent = false;
    let mut current: Option<String> = None;
    let mut group_id = None;
    let mut artifact_id = None;
    let mut version = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let tag = String::from_utf8_lossy(e.name().local_name().as_ref()).into_owned();
                if tag == "parent" {
                    in_parent = true;
                } else if in_parent {
                    current = Some(tag);
                }
            }
            Ok(Event::Text(ref e)) if in_parent => {
                if let Ok(text) = e.unescape() {
                    match current.as_deref() {
                        Some("groupId") => group_id = Some(text.to_string()),
                        Some("artifactId") => artifact_id = Some(text.to_string()),
                        Some("version") => version = Some(text.to_string()),
                        _ => {}
                    }
                }
            }
            Ok(Event::End(ref e)) => {
                let tag = String::from_utf8_lossy(e.name().local_name().as_ref()).into_owned();
                if tag == "parent" {
                    break;
                }
                if in_parent {
                    current = None;
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    Some(ParentRef { group_id: group_id?, artifact_id: artifact_id?, version: version? })
}

/// Pick a version from repository metadata, preferring `<latest>` and falling
/// back to the last entry of the `<versions>` list.
fn extract_latest_version(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut in_latest = false;
    let mut in_versions = false;
    let mut in_version = false;
    let mut last_version = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let tag = String::from_utf8_lossy(e.name().local_name().as_ref()).into_owned();
                match tag.as_str() {
                    "latest" => in_latest = true,
                    "versions" => in_versions = true,
                    "version" if in_versions => in_version = true,
                    _ => {}
                }
            }
            Ok(Event::Text(ref e)) => {
                if let Ok(text) = e.unescape() {
                    if in_latest {
                        return Some(text.to_string());
                    }
                    if in_version {
                        last_version = Some(text.to_string());
                    }
                }
            }
            Ok(Event::End(ref e)) => {
                let tag = String::from_utf8_lossy(e.name().local_name().as_ref()).into_owned();
                match tag.as_str() {
                    "latest" => in_latest = false,
                    "versions" => in_versions = false,
                    "version" => in_version = false,
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    last_version
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_license() {
        let pom = r#"<?xml version="1.0"?>
<project>
  <licenses>
    <license>
      <name>Apache License, Version 2.0</name>
      <url>https://www.apache.org/licenses/LICENSE-2.0</url>
    </license>
  </licenses>
</project>"#;
        assert_eq!(extract_license(pom), Some("Apache License, Version 2.0".to_string()));
    }

    #[test]
    fn test_extract_license_with_namespace() {
        let pom = r#"<?xml version="1.0"?>
<project xmlns="http://maven.apache.org/POM/4.0.0">
  <licenses>
    <license>
      <name>Eclipse Public License v2.0</name>
    </license>
  </licenses>
</project>"#;
        assert_eq!(extract_license(pom), Some("Eclipse Public License v2.0".to_string()));
    }

    #[test]
    fn test_extract_license_absent() {
        let pom = "<project><artifactId>junit-bom</artifactId></project>";
        assert_eq!(extract_license(pom), None);
    }

    #[test]
    fn test_extract_parent() {
        let pom = r#"<project>
  <parent>
    <groupId>org.junit</groupId>
    <artifactId>junit-bom</artifactId>
    <version>5.10.2</version>
  </parent>
  <artifactId>junit-jupiter</artifactId>
</project>"#;
        let parent = extract_parent(pom).unwrap();
        assert_eq!(parent.group_id, "org.junit");
        assert_eq!(parent.artifact_id, "junit-bom");
        assert_eq!(parent.version, "5.10.2");
    }

    #[test]
    fn test_extract_parent_requires_all_coordinates() {
        let pom = r#"<project>
  <parent>
    <groupId>org.junit</groupId>
    <artifactId>junit-bom</artifactId>
  </parent>
</project>"#;
        assert!(extract_parent(pom).is_none());
    }

    #[test]
    fn test_extract_latest_version_prefers_latest() {
        let metadata = r#"<metadata>
  <versioning>
    <latest>5.10.2</latest>
    <versions>
      <version>5.10.0</version>
      <version>5.10.1</version>
    </versions>
  </versioning>
</metadata>"#;
        assert_eq!(extract_latest_version(metadata), Some("5.10.2".to_string()));
    }

    #[test]
    fn test_extract_latest_version_falls_back_to_versions_list() {
        let metadata = r#"<metadata>
  <versioning>
    <versions>
      <version>1.0.0</version>
      <version>1.1.0</version>
    </versions>
  </versioning>
</metadata>"#;
        assert_eq!(extract_latest_version(metadata), Some("1.1.0".to_string()));
    }
}
