//! Data model shared by the resolution engine, its sources and its sinks
//!
//! - `WebsiteTarget`: one website and the URLs to check for it
//! - `Tier` / `Verdict` / `Outcome`: what a source reports
//! - `UrlCheckRecord` / `RunResult`: what the engine hands back

mod record;
mod target;

pub use record::{Outcome, RunResult, RunStatus, Tier, UrlCheckRecord, Verdict};
pub use target::{CheckingMethod, WebsiteTarget};
