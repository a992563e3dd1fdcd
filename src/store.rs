// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Session store: the one persisted session record for this process.
//!
//! The store is a dumb durable record holder, the analog of one browser
//! tab's ephemeral storage. It holds five named string fields,
//! validates nothing, and exposes exactly read / write / clear plus a raw
//! per-field surface so tamper handling stays testable.
//!
//! A record missing any subset of fields is *structurally incomplete*:
//! distinct from absent, treated as "no valid session" by every caller,
//! and eagerly purged on read so a later check cannot observe it.
//!
//! Writers go through a single `RwLock`. The gate's cooperative runtime
//! never runs two validators at once, but the store keeps
//! single-writer-at-a-time semantics anyway so a multi-threaded host gets
//! the same guarantees. Lock poisoning is recovered, not propagated: a
//! panicked writer must not turn into a denial of service here.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::types::SessionRecord;

/// One of the five stored field names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordField {
    Status,
    Tier,
    IssuedAt,
    PresentedKey,
    IntegrityToken,
}

impl RecordField {
    /// Storage key for this field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Status => "purge_auth",
            Self::Tier => "purge_auth_level",
            Self::IssuedAt => "purge_auth_timestamp",
            Self::PresentedKey => "purge_auth_key",
            Self::IntegrityToken => "purge_auth_hash",
        }
    }
}

/// Result of reading the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// No field is present.
    Absent,
    /// Some but not all fields are present. The store has already purged
    /// the remains by the time the caller sees this.
    Incomplete,
    /// All five fields are present (consistency is the validator's job).
    Complete(SessionRecord),
}

#[derive(Debug, Default)]
struct RawFields {
    status: Option<String>,
    tier: Option<String>,
    issued_at_ms: Option<String>,
    presented_key: Option<String>,
    integrity_token: Option<String>,
}

impl RawFields {
    fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.tier.is_none()
            && self.issued_at_ms.is_none()
            && self.presented_key.is_none()
            && self.integrity_token.is_none()
    }

    fn to_record(&self) -> Option<SessionRecord> {
        Some(SessionRecord {
            status: self.status.clone()?,
            tier: self.tier.clone()?,
            issued_at_ms: self.issued_at_ms.clone()?,
            presented_key: self.presented_key.clone()?,
            integrity_token: self.integrity_token.clone()?,
        })
    }

    fn clear(&mut self) {
        *self = Self::default();
    }

    fn slot(&mut self, field: RecordField) -> &mut Option<String> {
        match field {
            RecordField::Status => &mut self.status,
            RecordField::Tier => &mut self.tier,
            RecordField::IssuedAt => &mut self.issued_at_ms,
            RecordField::PresentedKey => &mut self.presented_key,
            RecordField::IntegrityToken => &mut self.integrity_token,
        }
    }
}

/// Holder of the single session record.
#[derive(Debug, Default)]
pub struct SessionStore {
    fields: RwLock<RawFields>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the record. Structurally incomplete remains are purged before
    /// this returns, so a denied session can never be re-read.
    pub fn read(&self) -> ReadOutcome {
        // Write lock up front: an incomplete read mutates (purges).
        let mut fields = self.write_fields();
        if fields.is_empty() {
            return ReadOutcome::Absent;
        }
        match fields.to_record() {
            Some(record) => ReadOutcome::Complete(record),
            None => {
                tracing::warn!("purging structurally incomplete session record");
                fields.clear();
                ReadOutcome::Incomplete
            }
        }
    }

    /// Persist all five fields in one synchronous step. No reader can
    /// observe a partial update.
    pub fn write(&self, record: SessionRecord) {
        let mut fields = self.write_fields();
        fields.status = Some(record.status);
        fields.tier = Some(record.tier);
        fields.issued_at_ms = Some(record.issued_at_ms);
        fields.presented_key = Some(record.presented_key);
        fields.integrity_token = Some(record.integrity_token);
    }

    /// Remove all five fields. Explicit logout lands here too.
    pub fn clear(&self) {
        self.write_fields().clear();
    }

    /// Whether any field is present at all.
    pub fn is_empty(&self) -> bool {
        self.read_fields().is_empty()
    }

    /// Overwrite one raw field without touching the others. Diagnostic
    /// surface: this is how a hostile or buggy host mutates storage, and
    /// how the tamper tests set their scenes.
    pub fn set_field(&self, field: RecordField, value: impl Into<String>) {
        *self.write_fields().slot(field) = Some(value.into());
    }

    /// Remove one raw field, leaving a structurally incomplete record.
    pub fn remove_field(&self, field: RecordField) {
        *self.write_fields().slot(field) = None;
    }

    fn read_fields(&self) -> RwLockReadGuard<'_, RawFields> {
        match self.fields.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!(
                    event = "SESSION_STORE_LOCK_POISONED",
                    "recovering session store read guard after a writer panic"
                );
                poisoned.into_inner()
            }
        }
    }

    fn write_fields(&self) -> RwLockWriteGuard<'_, RawFields> {
        match self.fields.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!(
                    event = "SESSION_STORE_LOCK_POISONED",
                    "recovering session store write guard after a writer panic"
                );
                poisoned.into_inner()
            }
        }
    }
}
