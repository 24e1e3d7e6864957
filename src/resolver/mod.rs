//! Multi-strategy resolution of free-form license names to SPDX ids.
//!
//! Strategies run in a fixed order, cheapest first:
//!
//! 1. exact match against the SPDX license list (ids and normalized names)
//! 2. curated regex patterns for pervasive vendor spellings
//! 3. fuzzy matching by Damerau-Levenshtein similarity
//! 4. an optional, time-boxed AI model lookup
//!
//! Each strategy stamps its method and confidence on the result. A name that
//! no strategy can place is itself a result, never an error.

pub mod ai;
pub mod patterns;
pub mod spdx;

use std::sync::LazyLock;
use std::time::Duration;

use log::{debug, warn};
use regex::Regex;

use crate::models::{ResolutionMethod, ResolutionResult};
use ai::AiLookup;
use spdx::{SpdxEntry, SpdxIndex};

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("invalid regex"));
static THE_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^the\s+").expect("invalid regex"));
static LICENSE_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+(license|licence)\s*$").expect("invalid regex"));
static VERSION_LETTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*v\.?\s*").expect("invalid regex"));
static VERSION_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*version\s+").expect("invalid regex"));
static PUNCTUATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,()]").expect("invalid regex"));

/// Normalize a license name for comparison: lowercase, collapse whitespace,
/// drop a leading "the", fold "version" and "v." spellings onto a bare "v",
/// and strip punctuation that carries no meaning.
pub(crate) fn normalize_name(license_name: &str) -> String {
    let mut normalized = WHITESPACE_RE
        .replace_all(license_name.trim(), " ")
        .to_lowercase();
    normalized = THE_PREFIX_RE.replace(&normalized, "").into_owned();
    normalized = LICENSE_SUFFIX_RE.replace(&normalized, " license").into_owned();
    normalized = VERSION_LETTER_RE.replace_all(&normalized, " v").into_owned();
    normalized = VERSION_WORD_RE.replace_all(&normalized, " v").into_owned();
    normalized = PUNCTUATION_RE.replace_all(&normalized, "").into_owned();
    WHITESPACE_RE.replace_all(&normalized, " ").trim().to_string()
}

const DEFAULT_FUZZY_THRESHOLD: f64 = 0.8;
const DEFAULT_AI_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolves free-form license names to SPDX identifiers.
pub struct LicenseResolver {
    index: SpdxIndex,
    fuzzy_threshold: f64,
    ai: Option<Box<dyn AiLookup>>,
    ai_timeout: Duration,
}

impl LicenseResolver {
    pub fn new(index: SpdxIndex) -> Self {
        LicenseResolver {
            index,
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            ai: None,
            ai_timeout: DEFAULT_AI_TIMEOUT,
        }
    }

    pub fn with_fuzzy_threshold(mut self, threshold: f64) -> Self {
        self.fuzzy_threshold = threshold;
        self
    }

    pub fn with_ai(mut self, ai: Box<dyn AiLookup>) -> Self {
        self.ai = Some(ai);
        self
    }

    pub fn with_ai_timeout(mut self, timeout: Duration) -> Self {
        self.ai_timeout = timeout;
        self
    }

    /// Resolve one license name, trying each strategy in turn.
    pub async fn resolve(&self, license_name: &str) -> ResolutionResult {
        if license_name.trim().is_empty() {
            return ResolutionResult::new(license_name, None, ResolutionMethod::Empty);
        }

        debug!("resolving license name '{}'", license_name);
        let normalized = normalize_name(license_name);

        if let Some(id) = self.exact_match(&normalized) {
            return ResolutionResult::new(license_name, Some(id), ResolutionMethod::ExactMatch);
        }

        if let Some(id) = patterns::pattern_lookup(&normalized, &self.index) {
            return ResolutionResult::new(
                license_name,
                Some(id.to_string()),
                ResolutionMethod::PatternMatch,
            );
        }

        if let Some(id) = self.fuzzy_match(&normalized) {
            return ResolutionResult::new(license_name, Some(id), ResolutionMethod::FuzzyMatch);
        }

        if let Some(id) = self.ai_resolve(license_name).await {
            return ResolutionResult::new(license_name, Some(id), ResolutionMethod::AiAssisted);
        }

        ResolutionResult::new(license_name, None, ResolutionMethod::Unresolved)
    }

    fn exact_match(&self, normalized: &str) -> Option<String> {
        for entry in self.index.entries() {
            if normalized == entry.id.to_lowercase() || normalized == entry.normalized_name() {
                if entry.deprecated {
                    debug!("matched deprecated SPDX id '{}'", entry.id);
                }
                return Some(entry.id.clone());
            }
        }
        None
    }

    fn fuzzy_match(&self, normalized: &str) -> Option<String> {
        let mut best: Option<&SpdxEntry> = None;
        let mut best_score = 0.0;
        for entry in self.index.entries() {
            let score = strsim::normalized_damerau_levenshtein(normalized, entry.normalized_name())
                .max(strsim::normalized_damerau_levenshtein(
                    normalized,
                    &entry.id.to_lowercase(),
                ));
            if score > best_score && score >= self.fuzzy_threshold {
                best_score = score;
                best = Some(entry);
            }
        }
        let entry = best?;
        debug!("fuzzy match '{}' to '{}' ({:.3})", normalized, entry.id, best_score);
        Some(entry.id.clone())
    }

    async fn ai_resolve(&self, license_name: &str) -> Option<String> {
        let ai = self.ai.as_ref()?;
        debug!("asking the model about '{}'", license_name);
        match tokio::time::timeout(self.ai_timeout, ai.resolve(license_name)).await {
            Ok(answer) => answer,
            Err(_) => {
                warn!("AI lookup timed out after {:?}", self.ai_timeout);
                None
            }
        }
    }
}
