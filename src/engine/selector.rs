use crate::model::{CheckingMethod, Tier, WebsiteTarget};
use crate::sources::SourceSet;
use crate::CheckerError;

/// Picks the active tier for a run and the tier to downgrade to
///
/// Priority is fixed: Console > BulkApi > Scrape. A non-`auto` method pins
/// the run to one tier and disables downgrading.
#[derive(Debug, Clone)]
pub struct SourceSelector {
    website: String,
    method: CheckingMethod,
    /// Prerequisite satisfied, indexed by `Tier::rank() - 1`
    viable: [bool; 3],
}

impl SourceSelector {
    pub fn new(target: &WebsiteTarget, sources: &SourceSet) -> Self {
        let viable = [
            sources.has(Tier::Console) && target.console_allowed(),
            sources.has(Tier::BulkApi) && target.has_bulk_api_key(),
            true,
        ];

        Self {
            website: target.name.clone(),
            method: target.checking_method,
            viable,
        }
    }

    /// Whether a tier's prerequisite is satisfied
    pub fn is_viable(&self, tier: Tier) -> bool {
        self.viable[usize::from(tier.rank() - 1)]
    }

    /// True when the target pins a single tier
    pub fn is_override(&self) -> bool {
        self.method.forced_tier().is_some()
    }

    /// The tier a run starts with
    ///
    /// Fails with `ConfigurationInvalid` when a pinned tier has no
    /// prerequisite; this is checked before any network call.
    pub fn select(&self) -> Result<Tier, CheckerError> {
        if let Some(tier) = self.method.forced_tier() {
            if self.is_viable(tier) {
                return Ok(tier);
            }
            return Err(CheckerError::ConfigurationInvalid {
                website: self.website.clone(),
                reason: format!(
                    "checking method '{}' requires {}",
                    self.method,
                    prerequisite(tier)
                ),
            });
        }

        Ok(Tier::ALL
            .into_iter()
            .find(|t| self.is_viable(*t))
            .unwrap_or(Tier::Scrape))
    }

    /// The next viable lower-priority tier after a wholesale failure
    ///
    /// Always `None` for a pinned tier. Never returns a tier ranked at or
    /// above `failed`, so a run cannot upgrade.
    pub fn next_after(&self, failed: Tier) -> Option<Tier> {
        if self.is_override() {
            return None;
        }

        let mut candidate = failed.next();
        while let Some(tier) = candidate {
            if self.is_viable(tier) {
                return Some(tier);
            }
            candidate = tier.next();
        }
        None
    }
}

fn prerequisite(tier: Tier) -> &'static str {
    match tier {
        Tier::Console => "a verified Search Console property handle",
        Tier::BulkApi => "a bulk API key",
        Tier::Scrape => "nothing",
    }
}
