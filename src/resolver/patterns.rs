use std::sync::LazyLock;

use log::debug;
use regex::Regex;

use super::spdx::SpdxIndex;

/// Curated patterns for license names that turn up constantly in registry
/// metadata but sit too far from any SPDX name for fuzzy matching to catch.
/// Order matters: more specific spellings come before their catch-alls.
static PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"apache.*software.*license.*v?\.?2\.?0?", "Apache-2.0"),
        (r"apache.*license.*v?\.?2\.?0?", "Apache-2.0"),
        (r"bsd.*3.*clause", "BSD-3-Clause"),
        (r"bsd.*3", "BSD-3-Clause"),
        (r"mit.*license", "MIT"),
        (r"eclipse.*public.*license.*v?\.?2\.?0?", "EPL-2.0"),
        (r"eclipse.*public.*license.*v?\.?1\.?0?", "EPL-1.0"),
        (r"mozilla.*public.*license.*v?\.?2\.?0?", "MPL-2.0"),
        (r"gnu.*general.*public.*license.*v?\.?3", "GPL-3.0-only"),
        (r"gnu.*general.*public.*license.*v?\.?2", "GPL-2.0-only"),
        (r"lgpl.*v?\.?3", "LGPL-3.0-only"),
        (r"lgpl.*v?\.?2\.?1", "LGPL-2.1-only"),
    ]
    .into_iter()
    .map(|(pattern, spdx_id)| (Regex::new(pattern).expect("invalid regex"), spdx_id))
    .collect()
});

/// Match an already-normalized license name against the curated patterns.
///
/// A hit is only taken when its target id exists in the license index, or
/// when the index is empty and the patterns are all we have to go on.
pub fn pattern_lookup(normalized_name: &str, index: &SpdxIndex) -> Option<&'static str> {
    for (pattern, spdx_id) in PATTERNS.iter() {
        if pattern.is_match(normalized_name) && (index.is_empty() || index.contains(spdx_id)) {
            debug!("pattern match: '{}' resolved to '{}'", normalized_name, spdx_id);
            return Some(spdx_id);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::spdx::SpdxEntry;

    fn index(ids: &[&str]) -> SpdxIndex {
        SpdxIndex::new(
            ids.iter().map(|id| SpdxEntry::new(*id, *id, false)).collect(),
            Vec::new(),
        )
    }

    #[test]
    fn test_apache_spellings() {
        let index = index(&["Apache-2.0"]);
        assert_eq!(
            pattern_lookup("apache software license v2.0", &index),
            Some("Apache-2.0")
        );
        assert_eq!(pattern_lookup("apache license v2", &index), Some("Apache-2.0"));
    }

    #[test]
    fn test_bsd_and_mit() {
        let index = index(&["BSD-3-Clause", "MIT"]);
        assert_eq!(pattern_lookup("bsd 3-clause license", &index), Some("BSD-3-Clause"));
        assert_eq!(pattern_lookup("bsd 3", &index), Some("BSD-3-Clause"));
        assert_eq!(pattern_lookup("mit license", &index), Some("MIT"));
    }

    #[test]
    fn test_eclipse_versions_disambiguated() {
        let index = index(&["EPL-1.0", "EPL-2.0"]);
        assert_eq!(pattern_lookup("eclipse public license v2.0", &index), Some("EPL-2.0"));
        assert_eq!(pattern_lookup("eclipse public license - v1.0", &index), Some("EPL-1.0"));
    }

    #[test]
    fn test_gnu_and_lgpl_versions() {
        let index = index(&["GPL-2.0-only", "GPL-3.0-only", "LGPL-2.1-only", "LGPL-3.0-only"]);
        assert_eq!(
            pattern_lookup("gnu general public license v3.0", &index),
            Some("GPL-3.0-only")
        );
        assert_eq!(
            pattern_lookup("gnu general public license v2", &index),
            Some("GPL-2.0-only")
        );
        assert_eq!(pattern_lookup("lgpl v3", &index), Some("LGPL-3.0-only"));
        assert_eq!(pattern_lookup("lgpl v2.1", &index), Some("LGPL-2.1-only"));
    }

    #[test]
    fn test_hit_requires_known_id_when_index_present() {
        let index = index(&["MIT"]);
        assert_eq!(pattern_lookup("apache license v2.0", &index), None);
    }

    #[test]
    fn test_empty_index_runs_degraded() {
        let index = SpdxIndex::empty();
        assert_eq!(pattern_lookup("apache license v2.0", &index), Some("Apache-2.0"));
    }

    #[test]
    fn test_no_pattern_hit() {
        let index = index(&["MIT"]);
        assert_eq!(pattern_lookup("proprietary in-house terms", &index), None);
    }
}
