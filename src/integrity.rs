// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Integrity codec: seals (key, tier, issued-at) into a short token.
//!
//! The token is a salted rolling checksum, deterministic and cheap: the
//! fields are joined with `_`, folded through a 32-bit signed accumulator
//! (`acc = (acc << 5) - acc + unit`, i.e. `acc * 31 + unit` with
//! wraparound), absolute-valued and rendered in base-36.
//!
//! This is tamper *evidence* against casual edits of stored fields. It is
//! NOT a MAC and provides no real integrity or confidentiality guarantee:
//! anyone who can read this code can forge a token. That is an accepted
//! property of this subsystem. Do not "fix" it by swapping in a
//! cryptographic primitive, which would change observable behavior. If
//! genuine security is ever required, this check has to be re-derived
//! server-side.

use subtle::ConstantTimeEq;

use crate::config::GateConfig;
use crate::types::SessionRecord;

/// Deterministic checksum binding for session records.
#[derive(Debug, Clone)]
pub struct IntegrityCodec {
    salt: String,
}

impl IntegrityCodec {
    pub fn new(salt: impl Into<String>) -> Self {
        Self { salt: salt.into() }
    }

    pub fn from_config(config: &GateConfig) -> Self {
        Self::new(config.salt.clone())
    }

    /// Seal the triple into a token. Same inputs always yield the same
    /// token. Fields are taken as stored text so that sealing and
    /// re-verification read identical bytes.
    pub fn seal(&self, key: &str, tier: &str, issued_at_ms: &str) -> String {
        let data = format!("{}_{}_{}_{}", key, tier, issued_at_ms, self.salt);
        let mut acc: i32 = 0;
        // UTF-16 code units keep the fold stable for any input the grant
        // surface could have accepted.
        for unit in data.encode_utf16() {
            acc = acc
                .wrapping_shl(5)
                .wrapping_sub(acc)
                .wrapping_add(i32::from(unit));
        }
        to_base36(u64::from(acc.unsigned_abs()))
    }

    /// Recompute the seal over a record's own raw fields and compare to
    /// its stored token. Exact equality; constant-time comparison so the
    /// check itself leaks nothing about where a forged token diverges.
    pub fn verify(&self, record: &SessionRecord) -> bool {
        let expected = self.seal(&record.presented_key, &record.tier, &record.issued_at_ms);
        expected
            .as_bytes()
            .ct_eq(record.integrity_token.as_bytes())
            .into()
    }
}

impl Default for IntegrityCodec {
    fn default() -> Self {
        Self::from_config(&GateConfig::default())
    }
}

/// Lowercase base-36 rendering of an unsigned value.
fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(char::from(DIGITS[(n % 36) as usize]));
        n /= 36;
    }
    digits.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccessTier, SessionRecord};

    #[test]
    fn test_seal_is_deterministic() {
        let codec = IntegrityCodec::default();
        let a = codec.seal("IMPOOR", "free", "1700000000000");
        let b = codec.seal("IMPOOR", "free", "1700000000000");
        assert_eq!(a, b);
        assert!(!a.is_empty());
        assert!(a.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn test_seal_varies_with_each_field() {
        let codec = IntegrityCodec::default();
        let base = codec.seal("IMPOOR", "free", "1700000000000");
        assert_ne!(base, codec.seal("UNHIIN", "free", "1700000000000"));
        assert_ne!(base, codec.seal("IMPOOR", "premium", "1700000000000"));
        assert_ne!(base, codec.seal("IMPOOR", "free", "1700000000001"));
    }

    #[test]
    fn test_seal_varies_with_salt() {
        let a = IntegrityCodec::new("purge_secret_2025");
        let b = IntegrityCodec::new("other_salt");
        assert_ne!(
            a.seal("IMPOOR", "free", "1700000000000"),
            b.seal("IMPOOR", "free", "1700000000000")
        );
    }

    #[test]
    fn test_verify_accepts_sealed_record() {
        let codec = IntegrityCodec::default();
        let token = codec.seal("UNHIIN", "premium", "1700000000000");
        let record = SessionRecord::assemble("UNHIIN", AccessTier::Premium, 1_700_000_000_000, token);
        assert!(codec.verify(&record));
    }

    #[test]
    fn test_verify_rejects_any_mutated_field() {
        let codec = IntegrityCodec::default();
        let token = codec.seal("UNHIIN", "premium", "1700000000000");
        let record = SessionRecord::assemble("UNHIIN", AccessTier::Premium, 1_700_000_000_000, token);

        let mut tampered = record.clone();
        tampered.tier = "free".to_string();
        assert!(!codec.verify(&tampered));

        let mut tampered = record.clone();
        tampered.presented_key = "IMPOOR".to_string();
        assert!(!codec.verify(&tampered));

        let mut tampered = record.clone();
        tampered.issued_at_ms = "1700000099999".to_string();
        assert!(!codec.verify(&tampered));

        let mut tampered = record;
        tampered.integrity_token = "deadbeef".to_string();
        assert!(!codec.verify(&tampered));
    }

    #[test]
    fn test_base36_rendering() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(46655), "zzz");
    }
}
