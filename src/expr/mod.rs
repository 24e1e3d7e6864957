//! SPDX license expression tokenizing, aliasing, and policy evaluation.
//!
//! - [`token`] splits a raw expression string into SPDX tokens. Tokenizing
//!   never fails: anything unrecognized comes back as a license id token and
//!   is dealt with at evaluation time.
//! - [`alias`] maps vendor spellings ("GPLv2", "Apache 2.0") onto SPDX ids
//!   before parsing.
//! - [`parser`] evaluates the token stream against the license policy,
//!   producing a verdict and a human-readable explanation.

pub mod alias;
pub mod parser;
pub mod token;
