// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Session validator: the state machine at the center of the gate.
//!
//! Given the stored record, the requested page and the current time, a
//! validation lands in exactly one of five states. Four are terminal for
//! the check (DENY + purge); `Valid` allows the view and refreshes the
//! record in place. Checks run in a fixed order and the first failure
//! wins. The order matters for diagnostics, not for the verdict, since
//! every failure maps to DENY.
//!
//! Expiry is evaluated against the wall clock (epoch milliseconds), the
//! same as the system this reproduces. A host clock jump can therefore
//! prematurely expire a session or stretch one across a suspend/resume;
//! switching to a monotonic clock would change those semantics, so it is
//! deliberately not done here.
//!
//! There is no error path out of a validation: any ambiguous or
//! unparseable stored value classifies into a deny state. Fail closed,
//! never open.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::GateConfig;
use crate::integrity::IntegrityCodec;
use crate::policy::PagePolicy;
use crate::registry::KeyRegistry;
use crate::store::{ReadOutcome, SessionStore};
use crate::types::{AccessTier, PageId, SessionRecord, STATUS_AUTHENTICATED};

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Outcome of one validator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationState {
    /// No record, or a structurally incomplete one.
    NoSession,
    /// Integrity failure: token mismatch, or key/tier no longer agree.
    Invalid,
    /// Session older than the lifetime window (or its clock ran backward).
    Expired,
    /// Session is sound but the tier may not view this page.
    Unauthorized,
    /// All checks passed; the record was refreshed.
    Valid,
}

impl ValidationState {
    /// True only for the single positive state.
    pub fn is_allow(&self) -> bool {
        matches!(self, ValidationState::Valid)
    }

    /// The verdict this state maps to.
    pub fn verdict(&self) -> Verdict {
        if self.is_allow() {
            Verdict::Allow
        } else {
            Verdict::Deny
        }
    }
}

impl std::fmt::Display for ValidationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationState::NoSession => write!(f, "NO_SESSION"),
            ValidationState::Invalid => write!(f, "INVALID"),
            ValidationState::Expired => write!(f, "EXPIRED"),
            ValidationState::Unauthorized => write!(f, "UNAUTHORIZED"),
            ValidationState::Valid => write!(f, "VALID"),
        }
    }
}

/// What the gate acts on. The UI never learns which deny state occurred,
/// only that access was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Allow,
    Deny,
}

/// Result of the grant flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantOutcome {
    /// The key classified; a fresh record was written.
    Granted(AccessTier),
    /// Unknown key. Nothing was written, and the caller learns nothing
    /// about which tiers exist.
    Rejected,
}

/// Session events for audit logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionEvent {
    /// A grant wrote a fresh record.
    Granted { tier: AccessTier, key_masked: String },
    /// A key submission failed to classify.
    GrantRejected { key_masked: String },
    /// A validation allowed a page view and refreshed the record.
    Refreshed { page: String, tier: AccessTier },
    /// A validation denied a page view and purged the record.
    Denied { page: String, state: ValidationState },
    /// The visitor logged out.
    LoggedOut,
}

impl SessionEvent {
    /// Format event for the audit log.
    pub fn to_audit_string(&self) -> String {
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        match self {
            SessionEvent::Granted { tier, key_masked } => {
                format!("{} | GRANTED | tier={} key={}", timestamp, tier, key_masked)
            }
            SessionEvent::GrantRejected { key_masked } => {
                format!("{} | GRANT_REJECTED | key={}", timestamp, key_masked)
            }
            SessionEvent::Refreshed { page, tier } => {
                format!("{} | ALLOW | page={} tier={}", timestamp, page, tier)
            }
            SessionEvent::Denied { page, state } => {
                format!("{} | DENY | page={} state={}", timestamp, page, state)
            }
            SessionEvent::LoggedOut => {
                format!("{} | LOGOUT", timestamp)
            }
        }
    }
}

/// Mask a presented key for logging: only the last three characters stay
/// visible.
pub fn mask_key(key: &str) -> String {
    let tail: String = key
        .chars()
        .rev()
        .take(3)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("***{}", tail)
}

/// The validator: pure checks over (record, page, now), plus the two
/// write paths (grant, refresh) that keep a session alive.
#[derive(Debug, Clone)]
pub struct SessionValidator {
    registry: KeyRegistry,
    policy: PagePolicy,
    codec: IntegrityCodec,
    lifetime_ms: i64,
}

impl SessionValidator {
    pub fn new(
        registry: KeyRegistry,
        policy: PagePolicy,
        codec: IntegrityCodec,
        lifetime_ms: i64,
    ) -> Self {
        Self {
            registry,
            policy,
            codec,
            lifetime_ms,
        }
    }

    pub fn from_config(config: &GateConfig) -> Self {
        Self::new(
            KeyRegistry::from_config(config),
            PagePolicy::from_config(config),
            IntegrityCodec::from_config(config),
            config.session_lifetime_ms,
        )
    }

    /// The page policy this validator consults, for the controller's
    /// public-page short-circuit.
    pub fn policy(&self) -> &PagePolicy {
        &self.policy
    }

    /// Run the full check pipeline for one page view.
    ///
    /// On `Valid`, the record's issue time and token are refreshed before
    /// this returns, so the next scheduled check reads the refreshed
    /// record. On any failure state the record is purged before the DENY
    /// is reported; a denied session must never remain readable, or a
    /// redirect loop could re-read the same bad state forever.
    pub fn validate(&self, store: &SessionStore, page: &PageId, now_ms: i64) -> ValidationState {
        let state = match self.evaluate(store, page, now_ms) {
            Evaluation::Deny(state) => {
                store.clear();
                state
            }
            Evaluation::Allow(record) => {
                self.refresh(store, &record, now_ms);
                if let Some(tier) = AccessTier::parse(&record.tier) {
                    crate::audit::log_event(&SessionEvent::Refreshed {
                        page: page.to_string(),
                        tier,
                    });
                }
                ValidationState::Valid
            }
        };

        match state {
            ValidationState::Valid => {
                tracing::debug!(page = %page, "session valid, record refreshed");
            }
            other => {
                tracing::info!(page = %page, state = %other, "page view denied");
                crate::audit::log_event(&SessionEvent::Denied {
                    page: page.to_string(),
                    state: other,
                });
            }
        }
        state
    }

    /// The read-only check pipeline, first failure wins.
    fn evaluate(&self, store: &SessionStore, page: &PageId, now_ms: i64) -> Evaluation {
        // Check 1: a record exists and is structurally complete.
        let record = match store.read() {
            ReadOutcome::Absent | ReadOutcome::Incomplete => {
                return Evaluation::Deny(ValidationState::NoSession);
            }
            ReadOutcome::Complete(record) => record,
        };
        if record.status != STATUS_AUTHENTICATED {
            return Evaluation::Deny(ValidationState::NoSession);
        }

        // Check 2: the token still binds the stored fields.
        if !self.codec.verify(&record) {
            return Evaluation::Deny(ValidationState::Invalid);
        }

        // Check 3: the session is inside its lifetime window. A
        // non-numeric issue time or a negative elapsed (clock ran
        // backward) reads as expired.
        let issued_at = match record.issued_at_ms.trim().parse::<i64>() {
            Ok(ms) => ms,
            Err(_) => return Evaluation::Deny(ValidationState::Expired),
        };
        let elapsed = now_ms.saturating_sub(issued_at);
        if elapsed < 0 || elapsed > self.lifetime_ms {
            return Evaluation::Deny(ValidationState::Expired);
        }

        // Check 4: the stored key still maps to the stored tier. Defends
        // against a tier field edited independently of the key.
        let tier = match AccessTier::parse(&record.tier) {
            Some(tier) => tier,
            None => return Evaluation::Deny(ValidationState::Invalid),
        };
        if !self.registry.key_matches_tier(&record.presented_key, tier) {
            return Evaluation::Deny(ValidationState::Invalid);
        }

        // Check 5: the tier may view this page.
        if !self.policy.is_authorized(tier, page) {
            return Evaluation::Deny(ValidationState::Unauthorized);
        }

        Evaluation::Allow(record)
    }

    /// Mint a new issue time and token and write them back. Keeps the
    /// session alive for another lifetime window.
    fn refresh(&self, store: &SessionStore, record: &SessionRecord, now_ms: i64) {
        let issued_at = now_ms.to_string();
        let token = self
            .codec
            .seal(&record.presented_key, &record.tier, &issued_at);
        let mut refreshed = record.clone();
        refreshed.issued_at_ms = issued_at;
        refreshed.integrity_token = token;
        store.write(refreshed);
    }

    /// Grant flow: the only path from "no session" to "session exists".
    ///
    /// The candidate is trimmed and upper-cased before classification and
    /// stored in that tier-cased form. A rejected candidate writes
    /// nothing.
    pub fn grant(&self, store: &SessionStore, candidate: &str, now_ms: i64) -> GrantOutcome {
        let Some(tier) = self.registry.tier_of(candidate) else {
            let masked = mask_key(candidate.trim());
            tracing::info!(key = %masked, "key rejected");
            crate::audit::log_event(&SessionEvent::GrantRejected { key_masked: masked });
            return GrantOutcome::Rejected;
        };

        let key = candidate.trim().to_uppercase();
        let issued_at = now_ms.to_string();
        let token = self.codec.seal(&key, tier.as_str(), &issued_at);
        store.write(SessionRecord::assemble(&key, tier, now_ms, token));

        let masked = mask_key(&key);
        tracing::info!(tier = %tier, key = %masked, "access granted");
        crate::audit::log_event(&SessionEvent::Granted {
            tier,
            key_masked: masked,
        });
        GrantOutcome::Granted(tier)
    }
}

enum Evaluation {
    Allow(SessionRecord),
    Deny(ValidationState),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RecordField;

    const NOW: i64 = 1_700_000_000_000;
    const LIFETIME: i64 = 30 * 60 * 1000;

    fn validator() -> SessionValidator {
        SessionValidator::from_config(&GateConfig::default())
    }

    fn granted_store(key: &str) -> (SessionValidator, SessionStore) {
        let validator = validator();
        let store = SessionStore::new();
        assert!(matches!(
            validator.grant(&store, key, NOW),
            GrantOutcome::Granted(_)
        ));
        (validator, store)
    }

    fn stored_record(store: &SessionStore) -> SessionRecord {
        match store.read() {
            ReadOutcome::Complete(record) => record,
            other => panic!("expected complete record, got {other:?}"),
        }
    }

    #[test]
    fn test_grant_classifies_and_writes() {
        let (_, store) = granted_store("IMPOOR");
        let record = stored_record(&store);
        assert_eq!(record.tier, "free");
        assert_eq!(record.presented_key, "IMPOOR");
        assert_eq!(record.issued_at_ms, NOW.to_string());
    }

    #[test]
    fn test_grant_lowercase_premium_key() {
        let (_, store) = granted_store("charlesispoor");
        let record = stored_record(&store);
        assert_eq!(record.tier, "premium");
        // Stored tier-cased, not as typed.
        assert_eq!(record.presented_key, "CHARLESISPOOR");
    }

    #[test]
    fn test_grant_unknown_key_writes_nothing() {
        let validator = validator();
        let store = SessionStore::new();
        assert_eq!(validator.grant(&store, "ZZZ", NOW), GrantOutcome::Rejected);
        assert!(store.is_empty());
        // A later validation of any protected page reads NoSession.
        let state = validator.validate(&store, &PageId::from_path("games.html"), NOW);
        assert_eq!(state, ValidationState::NoSession);
    }

    #[test]
    fn test_round_trip_allow_refreshes_issue_time() {
        let (validator, store) = granted_store("IMPOOR");
        let later = NOW + 5_000;
        let state = validator.validate(&store, &PageId::from_path("games.html"), later);
        assert_eq!(state, ValidationState::Valid);

        let record = stored_record(&store);
        let refreshed: i64 = record.issued_at_ms.parse().unwrap();
        assert!(refreshed >= NOW);
        assert_eq!(refreshed, later);
    }

    #[test]
    fn test_refresh_is_idempotent_under_back_to_back_runs() {
        let (validator, store) = granted_store("UNHIIN");
        let page = PageId::from_path("settings.html");

        assert_eq!(validator.validate(&store, &page, NOW + 1_000), ValidationState::Valid);
        let first = stored_record(&store);

        assert_eq!(validator.validate(&store, &page, NOW + 1_000), ValidationState::Valid);
        let second = stored_record(&store);

        // Second run re-sealed the first run's refreshed fields.
        let codec = IntegrityCodec::default();
        let reseal = codec.seal(&first.presented_key, &first.tier, &second.issued_at_ms);
        assert_eq!(second.integrity_token, reseal);
    }

    #[test]
    fn test_tamper_with_tier_reads_invalid() {
        let (validator, store) = granted_store("IMPOOR");
        store.set_field(RecordField::Tier, "premium");
        let state = validator.validate(&store, &PageId::from_path("games.html"), NOW + 1);
        assert_eq!(state, ValidationState::Invalid);
        assert!(store.is_empty());
    }

    #[test]
    fn test_tamper_with_key_reads_invalid() {
        let (validator, store) = granted_store("IMPOOR");
        store.set_field(RecordField::PresentedKey, "UNHIIN");
        let state = validator.validate(&store, &PageId::from_path("games.html"), NOW + 1);
        assert_eq!(state, ValidationState::Invalid);
    }

    #[test]
    fn test_tamper_with_issue_time_reads_invalid() {
        let (validator, store) = granted_store("IMPOOR");
        store.set_field(RecordField::IssuedAt, (NOW + 999).to_string());
        let state = validator.validate(&store, &PageId::from_path("games.html"), NOW + 1);
        assert_eq!(state, ValidationState::Invalid);
    }

    #[test]
    fn test_expiry_boundary() {
        let page = PageId::from_path("games.html");

        // One millisecond past the lifetime: expired.
        let (validator, store) = granted_store("IMPOOR");
        let state = validator.validate(&store, &page, NOW + LIFETIME + 1);
        assert_eq!(state, ValidationState::Expired);
        assert!(store.is_empty());

        // One second inside the lifetime: valid.
        let (validator, store) = granted_store("IMPOOR");
        let state = validator.validate(&store, &page, NOW + LIFETIME - 1_000);
        assert_eq!(state, ValidationState::Valid);
    }

    #[test]
    fn test_clock_running_backward_reads_expired() {
        let (validator, store) = granted_store("IMPOOR");
        let state = validator.validate(&store, &PageId::from_path("games.html"), NOW - 1);
        assert_eq!(state, ValidationState::Expired);
    }

    #[test]
    fn test_free_tier_denied_on_premium_page_and_purged() {
        let (validator, store) = granted_store("IMPOOR");
        let page = PageId::from_path("games.html");
        assert_eq!(validator.validate(&store, &page, NOW + 1), ValidationState::Valid);

        let state = validator.validate(&store, &PageId::from_path("tools.html"), NOW + 2);
        assert_eq!(state, ValidationState::Unauthorized);
        // Purged: the page the tier could view now reads NoSession too.
        assert_eq!(validator.validate(&store, &page, NOW + 3), ValidationState::NoSession);
    }

    #[test]
    fn test_premium_reaches_settings() {
        let (validator, store) = granted_store("charlesispoor");
        let state = validator.validate(&store, &PageId::from_path("settings.html"), NOW + 1);
        assert_eq!(state, ValidationState::Valid);
    }

    #[test]
    fn test_incomplete_record_is_no_session_before_any_other_check() {
        let validator = validator();
        let store = SessionStore::new();
        store.set_field(RecordField::Status, STATUS_AUTHENTICATED);
        store.set_field(RecordField::Tier, "free");

        let state = validator.validate(&store, &PageId::from_path("games.html"), NOW);
        assert_eq!(state, ValidationState::NoSession);
    }

    #[test]
    fn test_wrong_status_sentinel_is_no_session() {
        let (validator, store) = granted_store("IMPOOR");
        store.set_field(RecordField::Status, "Authenticated");
        let state = validator.validate(&store, &PageId::from_path("games.html"), NOW + 1);
        assert_eq!(state, ValidationState::NoSession);
    }

    #[test]
    fn test_garbage_issue_time_fails_integrity_first() {
        // A tampered timestamp trips the token check before the expiry
        // parse ever runs; order is fixed.
        let (validator, store) = granted_store("IMPOOR");
        store.set_field(RecordField::IssuedAt, "not-a-number");
        let state = validator.validate(&store, &PageId::from_path("games.html"), NOW + 1);
        assert_eq!(state, ValidationState::Invalid);
    }

    #[test]
    fn test_garbage_issue_time_with_matching_seal_reads_expired() {
        // If the token was re-sealed over the garbage timestamp, integrity
        // passes and the expiry parse catches it instead.
        let (validator, store) = granted_store("IMPOOR");
        let codec = IntegrityCodec::default();
        let token = codec.seal("IMPOOR", "free", "not-a-number");
        store.set_field(RecordField::IssuedAt, "not-a-number");
        store.set_field(RecordField::IntegrityToken, token);
        let state = validator.validate(&store, &PageId::from_path("games.html"), NOW + 1);
        assert_eq!(state, ValidationState::Expired);
    }

    #[test]
    fn test_mask_key_keeps_last_three() {
        assert_eq!(mask_key("SOSAPARTY"), "***RTY");
        assert_eq!(mask_key("AB"), "***AB");
        assert_eq!(mask_key(""), "***");
    }

    #[test]
    fn test_state_display_and_verdict() {
        assert_eq!(ValidationState::NoSession.to_string(), "NO_SESSION");
        assert_eq!(ValidationState::Unauthorized.to_string(), "UNAUTHORIZED");
        assert_eq!(ValidationState::Valid.verdict(), Verdict::Allow);
        assert_eq!(ValidationState::Expired.verdict(), Verdict::Deny);
        assert!(!ValidationState::Invalid.is_allow());
    }
}
