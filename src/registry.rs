// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Key registry: classifies a candidate key into an access tier.
//!
//! Pure lookup, no side effects and no error path: an unknown key simply
//! yields no tier. Comparison is case-insensitive: candidates are trimmed
//! and upper-cased before lookup, so `"impoor"` and `"IMPOOR"` classify
//! identically.

use crate::config::GateConfig;
use crate::types::AccessTier;

/// Static mapping from access tier to the set of keys that grant it.
#[derive(Debug, Clone)]
pub struct KeyRegistry {
    free: Vec<String>,
    premium: Vec<String>,
}

impl KeyRegistry {
    /// Build the registry from configuration. Key lists are normalized to
    /// upper case once here so lookups stay allocation-light.
    pub fn from_config(config: &GateConfig) -> Self {
        Self {
            free: config.free_keys.iter().map(|k| k.to_uppercase()).collect(),
            premium: config
                .premium_keys
                .iter()
                .map(|k| k.to_uppercase())
                .collect(),
        }
    }

    /// Classify a candidate key. Total: never fails, never panics; absence
    /// yields `None`. Premium is checked first so a key accidentally listed
    /// in both tiers grants the higher one, matching the grant surface.
    pub fn tier_of(&self, candidate: &str) -> Option<AccessTier> {
        let normalized = candidate.trim().to_uppercase();
        if normalized.is_empty() {
            return None;
        }
        if self.premium.iter().any(|k| k == &normalized) {
            return Some(AccessTier::Premium);
        }
        if self.free.iter().any(|k| k == &normalized) {
            return Some(AccessTier::Free);
        }
        None
    }

    /// Whether a stored key still maps to the stored tier. Defends against
    /// a record whose tier field was edited independently of its key.
    pub fn key_matches_tier(&self, key: &str, tier: AccessTier) -> bool {
        self.tier_of(key) == Some(tier)
    }
}

impl Default for KeyRegistry {
    fn default() -> Self {
        Self::from_config(&GateConfig::default())
    }
}
