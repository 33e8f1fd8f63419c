//! First-occurrence confirmation policy.
//!
//! Generated instances normally start unconfirmed. The occurrence on the template's
//! anchor date is the exception: it is the operation the user entered when creating
//! the template, so it is confirmed at creation and by the repair pass. Individual
//! cadences can be exempted.

use super::cadence::Cadence;
use serde::Deserialize;

/// Controls whether anchor-date instances are confirmed automatically.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConfirmationPolicy {
    /// Master switch
    pub confirm_first_occurrence: bool,
    /// Cadences whose first occurrence stays unconfirmed
    pub exempt_cadences: Vec<Cadence>,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            confirm_first_occurrence: true,
            exempt_cadences: Vec::new(),
        }
    }
}

impl ConfirmationPolicy {
    /// Policy that never confirms anything automatically.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            confirm_first_occurrence: false,
            exempt_cadences: Vec::new(),
        }
    }

    /// Whether the first occurrence of a template with `cadence` must be confirmed.
    #[must_use]
    pub fn applies_to(&self, cadence: Cadence) -> bool {
        self.confirm_first_occurrence && !self.exempt_cadences.contains(&cadence)
    }
}
