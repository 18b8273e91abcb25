//! Resolution engine
//!
//! This module contains the orchestration of one run:
//! - `RateLimiter`: pacing and adaptive backoff for the active source
//! - `SourceSelector`: fixed-priority tier choice and downgrade order
//! - `ResolutionEngine`: the per-run loop, downgrades, cancellation
//! - `Checker` / `RunHandle`: start runs on background tasks, stop and await them

mod handle;
mod rate_limiter;
mod resolution;
mod selector;

pub use handle::{Checker, RunHandle};
pub use rate_limiter::{RateLimiter, ThrottleDecision};
pub use resolution::{EngineSettings, ResolutionEngine};
pub use selector::SourceSelector;
