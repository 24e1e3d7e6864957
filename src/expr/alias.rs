use std::collections::HashMap;

use log::debug;
use regex::Regex;

/// Case-insensitive alias mappings from non-standard license names to SPDX
/// identifiers, loaded from the policy document.
///
/// Two kinds of keys are held separately:
/// - single-token aliases, consulted when normalizing one license id
///   (`"gpl2"` -> `"GPL-2.0-only"`),
/// - whole-expression aliases, consulted before tokenization for strings
///   no grammar will ever parse (`"cddl + gplv2 with classpath exception"`).
#[derive(Debug, Default)]
pub struct AliasTable {
    licenses: HashMap<String, String>,
    combined: HashMap<String, String>,
}

impl AliasTable {
    /// Build the table, lowercasing keys and dropping `_comment` entries.
    pub fn new(
        license_aliases: &HashMap<String, String>,
        combined_aliases: &HashMap<String, String>,
    ) -> Self {
        let licenses = license_aliases
            .iter()
            .filter(|(key, _)| key.as_str() != "_comment")
            .map(|(key, value)| (key.to_lowercase(), value.clone()))
            .collect();
        let combined = combined_aliases
            .iter()
            .filter(|(key, _)| key.as_str() != "_comment")
            .map(|(key, value)| (key.to_lowercase(), value.clone()))
            .collect();
        AliasTable { licenses, combined }
    }

    /// Normalize a single license id through the alias map, case-insensitively.
    /// Unknown ids are returned unchanged.
    pub fn normalize_id(&self, license_id: &str) -> String {
        let license_id = license_id.trim();
        if license_id.is_empty() {
            return license_id.to_string();
        }
        match self.licenses.get(&license_id.to_lowercase()) {
            Some(canonical) => {
                debug!("normalized license id '{}' to '{}'", license_id, canonical);
                canonical.clone()
            }
            None => license_id.to_string(),
        }
    }

    /// Look up a whole expression in the combined alias map.
    pub fn combined(&self, expression: &str) -> Option<&str> {
        self.combined.get(&expression.trim().to_lowercase()).map(String::as_str)
    }

    /// Substitute multi-word alias keys inside an expression before
    /// tokenization. Only keys containing a space or comma are considered;
    /// single-token aliases are left for [`AliasTable::normalize_id`].
    ///
    /// Keys are applied longest-first and only as complete phrases, bounded
    /// by whitespace, parentheses, or the ends of the string.
    pub fn apply_expression_aliases(&self, expression: &str) -> String {
        if expression.is_empty() || self.licenses.is_empty() {
            return expression.to_string();
        }

        let mut phrase_aliases: Vec<(&String, &String)> = self
            .licenses
            .iter()
            .filter(|(key, _)| key.contains(' ') || key.contains(','))
            .collect();
        if phrase_aliases.is_empty() {
            return expression.to_string();
        }

        phrase_aliases.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(b.0)));

        let mut result = expression.to_string();
        for (phrase, spdx_id) in phrase_aliases {
            let Ok(pattern) = Regex::new(&format!("(?i){}", regex::escape(phrase))) else {
                continue;
            };
            let replaced = replace_phrase(&result, &pattern, spdx_id);
            if replaced != result {
                debug!("applied expression alias '{}' -> '{}'", phrase, spdx_id);
                result = replaced;
            }
        }

        result
    }
}

/// Replace every occurrence of `pattern` that sits on phrase boundaries.
fn replace_phrase(text: &str, pattern: &Regex, replacement: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for found in pattern.find_iter(text) {
        if !boundary_before(text, found.start()) || !boundary_after(text, found.end()) {
            continue;
        }
        out.push_str(&text[last..found.start()]);
        out.push_str(replacement);
        last = found.end();
    }
    out.push_str(&text[last..]);
    out
}

fn boundary_before(text: &str, start: usize) -> bool {
    match text[..start].chars().next_back() {
        None => true,
        Some(c) => c.is_whitespace() || c == '(' || c == ')',
    }
}

fn boundary_after(text: &str, end: usize) -> bool {
    match text[end..].chars().next() {
        None => true,
        Some(c) => c.is_whitespace() || c == '(' || c == ')',
    }
}
