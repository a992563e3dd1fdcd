// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Audit logging for gate decisions.
//!
//! Appends one line per session event (grant, deny, refresh, logout) for
//! transparency: the log answers "why was I redirected" after the fact,
//! since the UI collapses every deny into the same outcome.
//!
//! Log format:
//! `2025-01-15 10:23:45 UTC | DENY | page=tools.html state=UNAUTHORIZED`
//!
//! Presented keys are masked before they reach an event, so the log never
//! holds a full key. Logging is best-effort by design: an audit write
//! failure is itself logged and swallowed. The gate must keep failing
//! closed on its own merits, not because a disk filled up.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};

use crate::config::GateConfig;
use crate::validator::SessionEvent;

static GLOBAL_LOGGER: OnceLock<AuditLogger> = OnceLock::new();
static AUDIT_ENABLED: AtomicBool = AtomicBool::new(false);

/// Whether audit logging is currently enabled.
pub fn is_audit_enabled() -> bool {
    AUDIT_ENABLED.load(Ordering::Relaxed)
}

/// Enable or disable audit logging at runtime.
pub fn set_audit_enabled(enabled: bool) {
    AUDIT_ENABLED.store(enabled, Ordering::Relaxed);
}

/// Install the global audit logger. First call wins; later calls are
/// ignored (the logger is process-wide, like the session it observes).
pub fn init_audit_logger(logger: AuditLogger) {
    let _ = GLOBAL_LOGGER.set(logger);
}

/// The installed global logger, if any.
pub fn global_audit_logger() -> Option<&'static AuditLogger> {
    GLOBAL_LOGGER.get()
}

/// Append a session event to the audit log, if enabled and installed.
/// Never propagates an error to the caller.
pub fn log_event(event: &SessionEvent) {
    if !is_audit_enabled() {
        return;
    }
    if let Some(logger) = global_audit_logger() {
        if let Err(e) = logger.append(event) {
            tracing::warn!("audit log write failed: {e:#}");
        }
    }
}

/// Append-only audit log file.
#[derive(Debug)]
pub struct AuditLogger {
    path: PathBuf,
    // Serializes appends so interleaved events stay line-atomic.
    write_lock: Mutex<()>,
}

impl AuditLogger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Default location, next to the config file.
    pub fn default_path() -> PathBuf {
        GateConfig::config_dir().join("audit.log")
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Append one event line, creating the file (and its directory) on
    /// first use.
    pub fn append(&self, event: &SessionEvent) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create audit log dir {}", parent.display())
                })?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open audit log {}", self.path.display()))?;
        writeln!(file, "{}", event.to_audit_string())
            .with_context(|| format!("Failed to append to audit log {}", self.path.display()))?;
        Ok(())
    }
}
