use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "license-audit",
    about = "Audit SBOM licenses against a policy, with multi-strategy license resolution",
    version
)]
pub struct Cli {
    /// SPDX SBOM JSON file to audit
    pub sbom: PathBuf,

    /// License policy file [default: <sbom dir>/.license-audit/policy.json, fallback ~/.config/license-audit/policy.json]
    #[arg(long, value_name = "FILE")]
    pub policy: Option<PathBuf>,

    /// Package-specific policy file with purl glob overrides
    #[arg(long, value_name = "FILE")]
    pub package_policy: Option<PathBuf>,

    /// Regex for internal packages to skip, matched against purl and name (repeatable)
    #[arg(long = "internal-pattern", value_name = "REGEX")]
    pub internal_patterns: Vec<String>,

    /// Tool config file [default: <sbom dir>/.license-audit/config.toml, fallback ~/.config/license-audit/config.toml]
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Fetch missing license data from package registries before auditing
    #[arg(long)]
    pub online: bool,

    /// Disable license name resolution
    #[arg(long)]
    pub no_resolve: bool,

    /// Write the enriched SBOM back out (requires --online)
    #[arg(long, value_name = "FILE")]
    pub enriched_sbom: Option<PathBuf>,

    /// Report format
    #[arg(long, default_value = "terminal", value_name = "FORMAT")]
    pub report: ReportFormat,

    /// Write the JSON results document to a file
    #[arg(long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Show all packages (not just denied/review/internal)
    #[arg(short, long)]
    pub verbose: bool,

    /// Only print summary line
    #[arg(short, long)]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    Terminal,
    Markdown,
    Json,
}
