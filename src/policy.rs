// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Page policy: which tier may view which page.
//!
//! Fail closed: a page in neither tier's catalog is authorized for no one.
//! A separate public set (landing page, the blocked destination itself,
//! and every non-document asset) bypasses the gate entirely; the
//! controller short-circuits before the validator ever runs.

use std::collections::HashSet;

use crate::config::GateConfig;
use crate::types::{AccessTier, PageId};

/// Static mapping from access tier to viewable page identities.
#[derive(Debug, Clone)]
pub struct PagePolicy {
    free: HashSet<String>,
    premium: HashSet<String>,
    public: HashSet<String>,
}

impl PagePolicy {
    pub fn from_config(config: &GateConfig) -> Self {
        Self {
            free: config.free_pages.iter().cloned().collect(),
            premium: config.premium_pages.iter().cloned().collect(),
            public: config.public_pages.iter().cloned().collect(),
        }
    }

    /// Whether the tier may view the page. Pages outside the tier's
    /// catalog deny, including pages outside every catalog.
    pub fn is_authorized(&self, tier: AccessTier, page: &PageId) -> bool {
        match tier {
            AccessTier::Free => self.free.contains(page.as_str()),
            AccessTier::Premium => self.premium.contains(page.as_str()),
        }
    }

    /// Whether the page bypasses the gate entirely. Non-document assets
    /// are always public; documents only when listed.
    pub fn is_public(&self, page: &PageId) -> bool {
        if !page.is_document() {
            return true;
        }
        self.public.contains(page.as_str())
    }
}

impl Default for PagePolicy {
    fn default() -> Self {
        Self::from_config(&GateConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_tier_reaches_primary_page_only() {
        let policy = PagePolicy::default();
        assert!(policy.is_authorized(AccessTier::Free, &PageId::from_path("games.html")));
        assert!(!policy.is_authorized(AccessTier::Free, &PageId::from_path("tools.html")));
        assert!(!policy.is_authorized(AccessTier::Free, &PageId::from_path("settings.html")));
        assert!(!policy.is_authorized(AccessTier::Free, &PageId::from_path("admin.html")));
    }

    #[test]
    fn test_premium_tier_reaches_the_catalog() {
        let policy = PagePolicy::default();
        for page in [
            "games.html",
            "apps.html",
            "tools.html",
            "roadmap.html",
            "themes.html",
            "chat.html",
            "credits.html",
            "settings.html",
            "admin.html",
        ] {
            assert!(
                policy.is_authorized(AccessTier::Premium, &PageId::from_path(page)),
                "premium should reach {page}"
            );
        }
    }

    #[test]
    fn test_unlisted_pages_fail_closed() {
        let policy = PagePolicy::default();
        let page = PageId::from_path("secret.html");
        assert!(!policy.is_authorized(AccessTier::Free, &page));
        assert!(!policy.is_authorized(AccessTier::Premium, &page));
        // The unauthenticated entry points are not in either catalog.
        let index = PageId::from_path("index.html");
        assert!(!policy.is_authorized(AccessTier::Premium, &index));
    }

    #[test]
    fn test_public_bypass() {
        let policy = PagePolicy::default();
        assert!(policy.is_public(&PageId::from_path("index.html")));
        assert!(policy.is_public(&PageId::from_path("/")));
        assert!(policy.is_public(&PageId::from_path("blocked.html")));
        // Non-document assets bypass without being listed.
        assert!(policy.is_public(&PageId::from_path("favicon.ico")));
        assert!(policy.is_public(&PageId::from_path("sw.js")));
        assert!(policy.is_public(&PageId::from_path("loading.js")));
        // Protected documents do not.
        assert!(!policy.is_public(&PageId::from_path("games.html")));
        assert!(!policy.is_public(&PageId::from_path("admin.html")));
    }
}
