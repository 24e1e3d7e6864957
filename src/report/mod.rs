//! Report renderers for audit results.
//!
//! - [`terminal`] renders the colored, tabular view with a summary box,
//!   honoring `--verbose` and `--quiet`.
//! - [`markdown`] renders the markdown report and appends the summary table
//!   to `$GITHUB_STEP_SUMMARY` inside GitHub Actions jobs.

pub mod markdown;
pub mod terminal;
