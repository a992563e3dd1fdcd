// Copyright (c) 2024-2025 Jesse Morgan
// Licensed under the MIT License. See LICENSE file for details.

//! pagegate - Tiered session gate for protected content pages
//!
//! Key in, tier out, every page re-checked.
//!
//! A visitor presents a key; the key classifies into an access tier
//! (free or premium); the resulting session record lives for thirty
//! minutes in this process's ephemeral store and every protected page
//! load independently re-validates it (integrity token, expiry window,
//! key/tier agreement, tier/page authorization) before rendering. Any
//! failed check purges the record and performs a one-way navigation to
//! the blocked destination. The gate fails closed, never open.
//!
//! # Core Modules
//!
//! - [`registry`] - Key classification into access tiers
//! - [`integrity`] - Checksum binding of session record fields
//! - [`policy`] - Tier/page authorization and the public-page bypass
//! - [`store`] - The one persisted session record
//! - [`validator`] - The five-state check pipeline and the grant flow
//! - [`gate`] - Per-page orchestration and continuous re-validation
//! - [`server`] - HTTP page host for one browsing session
//! - [`audit`] - Append-only log of gate decisions
//! - [`config`] - Immutable gate configuration
//! - [`errors`] - User-facing errors for the page host

pub mod audit;
pub mod config;
pub mod errors;
pub mod gate;
pub mod integrity;
pub mod policy;
pub mod registry;
pub mod server;
pub mod store;
pub mod types;
pub mod validator;

// Re-export commonly used types from types module
pub use types::{AccessTier, PageId, SessionRecord, STATUS_AUTHENTICATED};

// Re-export the validator surface
pub use validator::{
    mask_key, now_ms, GrantOutcome, SessionEvent, SessionValidator, ValidationState, Verdict,
};

// Re-export from other modules
pub use config::GateConfig;
pub use gate::{GateController, LoggingNavigationSink, NavigationSink, PageView, RevalidateTrigger};
pub use integrity::IntegrityCodec;
pub use policy::PagePolicy;
pub use registry::KeyRegistry;
pub use server::Server;
pub use store::{ReadOutcome, RecordField, SessionStore};

// Re-export audit types
pub use audit::{
    global_audit_logger, init_audit_logger, is_audit_enabled, log_event, set_audit_enabled,
    AuditLogger,
};

// Re-export error utilities
pub use errors::{generate_reference_code, ErrorResponse, UserError};
