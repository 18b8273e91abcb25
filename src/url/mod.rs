//! URL handling module for the indexation checker
//!
//! This module provides the match key used to compare requested URLs with
//! URLs reported by a source, host extraction, and Search Console property
//! matching.

mod domain;
mod normalize;

// Re-export main functions
pub use domain::{extract_host, property_covers};
pub use normalize::{match_key, match_key_lossy};

/// Returns true if two URL strings refer to the same page
pub fn same_page(a: &str, b: &str) -> bool {
    match_key_lossy(a) == match_key_lossy(b)
}
