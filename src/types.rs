// Copyright (c) 2024-2025 Jesse Morgan
// Licensed under the MIT License. See LICENSE file for details.

//! Canonical types used across pagegate.
//!
//! This module provides unified type definitions to avoid duplication.

use serde::{Deserialize, Serialize};

/// The only positive value of a session record's `status` field.
/// Anything else (or a missing field) reads as "no session".
pub const STATUS_AUTHENTICATED: &str = "authenticated";

/// Access tier granted by a key.
/// Ordered by privilege: Free < Premium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessTier {
    /// Free key holder; reaches the primary content page only.
    Free,
    /// Premium key holder; reaches the full protected catalog.
    Premium,
}

impl AccessTier {
    /// Convert tier to its stored string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Premium => "premium",
        }
    }

    /// Parse a stored tier string. Exact match on the stored form;
    /// anything else yields `None` (a tampered tier field must not
    /// accidentally classify).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "free" => Some(Self::Free),
            "premium" => Some(Self::Premium),
            _ => None,
        }
    }
}

impl std::fmt::Display for AccessTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single persisted session unit: five string-valued fields, exactly
/// as the visitor's ephemeral storage holds them.
///
/// Fields are kept raw on purpose. The validator has to be able to look at
/// tampered or garbage values and classify them; typing them here would
/// make those states unrepresentable and move interpretation into the
/// wrong layer. A record is either complete (all five fields present and
/// internally consistent) or it does not exist; partial records are
/// purged, never repaired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Must equal [`STATUS_AUTHENTICATED`] to count as a session at all.
    pub status: String,
    /// Stored tier name (`"free"` / `"premium"`).
    pub tier: String,
    /// Logical issue/refresh time, integer epoch milliseconds as text.
    pub issued_at_ms: String,
    /// The exact key string the visitor supplied, trimmed and upper-cased.
    pub presented_key: String,
    /// Checksum binding (key, tier, issued-at); see the integrity module.
    pub integrity_token: String,
}

impl SessionRecord {
    /// Assemble a record from already-consistent parts. The grant flow and
    /// the validator's refresh step are the only callers; both seal the
    /// token over the same fields they store.
    pub fn assemble(
        key: impl Into<String>,
        tier: AccessTier,
        issued_at_ms: i64,
        integrity_token: impl Into<String>,
    ) -> Self {
        Self {
            status: STATUS_AUTHENTICATED.to_string(),
            tier: tier.as_str().to_string(),
            issued_at_ms: issued_at_ms.to_string(),
            presented_key: key.into(),
            integrity_token: integrity_token.into(),
        }
    }
}

/// Page identity, derived once per page view from the navigation path and
/// immutable for the life of the view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageId(String);

impl PageId {
    /// Derive the page identity from a navigation path: the last path
    /// segment, with the empty segment (site root) reading as the landing
    /// page.
    pub fn from_path(path: &str) -> Self {
        let last = path.rsplit('/').next().unwrap_or("");
        if last.is_empty() {
            Self("index.html".to_string())
        } else {
            Self(last.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this identity names a content document. Everything else
    /// (scripts, icons, service workers) is a non-document asset and never
    /// gated.
    pub fn is_document(&self) -> bool {
        self.0.ends_with(".html")
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PageId {
    fn from(path: &str) -> Self {
        Self::from_path(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_round_trip() {
        assert_eq!(AccessTier::parse("free"), Some(AccessTier::Free));
        assert_eq!(AccessTier::parse("premium"), Some(AccessTier::Premium));
        assert_eq!(AccessTier::Free.as_str(), "free");
        assert_eq!(AccessTier::Premium.as_str(), "premium");
    }

    #[test]
    fn test_tier_parse_is_exact() {
        // Stored tier strings are machine-written; a case-shifted or
        // garbage value is tampering, not user input.
        assert_eq!(AccessTier::parse("FREE"), None);
        assert_eq!(AccessTier::parse("Premium"), None);
        assert_eq!(AccessTier::parse(""), None);
        assert_eq!(AccessTier::parse("admin"), None);
    }

    #[test]
    fn test_page_id_from_path() {
        assert_eq!(PageId::from_path("games.html").as_str(), "games.html");
        assert_eq!(PageId::from_path("/purge/games.html").as_str(), "games.html");
        assert_eq!(PageId::from_path("/").as_str(), "index.html");
        assert_eq!(PageId::from_path("").as_str(), "index.html");
    }

    #[test]
    fn test_page_id_document_detection() {
        assert!(PageId::from_path("settings.html").is_document());
        assert!(!PageId::from_path("favicon.ico").is_document());
        assert!(!PageId::from_path("sw.js").is_document());
        assert!(!PageId::from_path("loading.js").is_document());
    }

    #[test]
    fn test_record_assembly_is_complete() {
        let record = SessionRecord::assemble("IMPOOR", AccessTier::Free, 1_700_000_000_000, "tok");
        assert_eq!(record.status, STATUS_AUTHENTICATED);
        assert_eq!(record.tier, "free");
        assert_eq!(record.issued_at_ms, "1700000000000");
        assert_eq!(record.presented_key, "IMPOOR");
        assert_eq!(record.integrity_token, "tok");
    }
}
