use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UsagePolicy {
    Allow,
    Deny,
    NeedsReview,
}

impl UsagePolicy {
    pub fn to_status(self) -> AuditStatus {
        match self {
            UsagePolicy::Allow => AuditStatus::Allow,
            UsagePolicy::Deny => AuditStatus::Deny,
            UsagePolicy::NeedsReview => AuditStatus::NeedsReview,
        }
    }
}

impl std::fmt::Display for UsagePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UsagePolicy::Allow => write!(f, "allow"),
            UsagePolicy::Deny => write!(f, "deny"),
            UsagePolicy::NeedsReview => write!(f, "needs-review"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyEntry {
    pub id: String,
    pub usage_policy: UsagePolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    LicenseId,
    LicenseRef,
    AdditionRef,
    Plus,
    And,
    Or,
    With,
    LParen,
    RParen,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub position: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    ExactMatch,
    PatternMatch,
    FuzzyMatch,
    AiAssisted,
    Unresolved,
    Empty,
}

impl ResolutionMethod {
    /// Fixed confidence tier for the method.
    pub fn confidence(self) -> f64 {
        match self {
            ResolutionMethod::ExactMatch | ResolutionMethod::PatternMatch => 1.0,
            ResolutionMethod::FuzzyMatch => 0.9,
            ResolutionMethod::AiAssisted => 0.7,
            ResolutionMethod::Unresolved | ResolutionMethod::Empty => 0.0,
        }
    }
}

impl std::fmt::Display for ResolutionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ResolutionMethod::ExactMatch => "exact_match",
            ResolutionMethod::PatternMatch => "pattern_match",
            ResolutionMethod::FuzzyMatch => "fuzzy_match",
            ResolutionMethod::AiAssisted => "ai_assisted",
            ResolutionMethod::Unresolved => "unresolved",
            ResolutionMethod::Empty => "empty",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionResult {
    pub original: String,
    pub resolved: Option<String>,
    pub method: ResolutionMethod,
    pub confidence: f64,
}

impl ResolutionResult {
    pub fn new(original: &str, resolved: Option<String>, method: ResolutionMethod) -> Self {
        ResolutionResult {
            original: original.to_string(),
            resolved,
            method,
            confidence: method.confidence(),
        }
    }
}

/// Wire form of a resolution, as stored in SBOM enrichment metadata and reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseResolution {
    pub original: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved: Option<String>,
    pub method: String,
    pub confidence: f64,
}

impl From<&ResolutionResult> for LicenseResolution {
    fn from(result: &ResolutionResult) -> Self {
        LicenseResolution {
            original: result.original.clone(),
            resolved: result.resolved.clone(),
            method: result.method.to_string(),
            confidence: result.confidence,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResult {
    pub policy: UsagePolicy,
    pub explanation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuditStatus {
    Allow,
    Deny,
    NeedsReview,
    Internal,
}

impl std::fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditStatus::Allow => write!(f, "allow"),
            AuditStatus::Deny => write!(f, "deny"),
            AuditStatus::NeedsReview => write!(f, "needs-review"),
            AuditStatus::Internal => write!(f, "internal"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub package: String,
    pub purl: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    pub policy: AuditStatus,
    pub package_policy: bool,
    pub explanation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<LicenseResolution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_original: Option<String>,
}
