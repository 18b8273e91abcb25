//! State module for tracking check progress
//!
//! This module provides lifecycle state for URLs and runs.
//!
//! # Components
//!
//! - `UrlState`: Tracks one URL within a run (pending, in flight, resolved, errored)
//! - `RunState`: Tracks one run (idle, running, completed, stopped, failed)

mod run_state;
mod url_state;

// Re-export main types
pub use run_state::RunState;
pub use url_state::UrlState;
