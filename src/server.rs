// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Page host.
//!
//! Serves the gated site for one browsing session: the process stands in
//! for the visitor's tab, so there is exactly one session record behind
//! all handlers. A denied page load answers `303 See Other` to the
//! blocked destination, the HTTP rendering of a replace-style, one-way
//! navigation.
//!
//! # Endpoints
//!
//! - `GET /health` - Health check
//! - `POST /auth/key` - Key submission: `{granted: tier}` or 401
//! - `GET /pages/{page}` - Gated page load (303 to blocked on deny)
//! - `GET /session` - Session record diagnostics
//! - `POST /logout` - Clear the session record
//!
//! # Example
//!
//! ```no_run
//! use pagegate::config::GateConfig;
//! use pagegate::server::Server;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let server = Server::new(GateConfig::default());
//! server.start().await?;
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use axum::{
    extract::{DefaultBodyLimit, Path, State},
    response::{Html, IntoResponse, Json, Redirect, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;

use crate::config::GateConfig;
use crate::errors::UserError;
use crate::gate::{GateController, LoggingNavigationSink};
use crate::store::{ReadOutcome, SessionStore};
use crate::types::{AccessTier, PageId, STATUS_AUTHENTICATED};
use crate::validator::{now_ms, GrantOutcome, SessionEvent, Verdict};

/// Maximum request body size (key submissions are tiny).
const MAX_BODY_SIZE: usize = 16 * 1024;

/// Per-request timeout.
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Server state shared across handlers.
pub struct AppState {
    /// The gate for this browsing session.
    pub gate: GateController,
}

/// Page host configuration.
#[derive(Debug)]
pub struct Server {
    config: GateConfig,
    port: u16,
    bind_address: String,
}

impl Server {
    /// Create a new server from gate configuration. By default binds to
    /// 127.0.0.1 (localhost only) on the configured port.
    pub fn new(config: GateConfig) -> Self {
        let port = config.port;
        let bind_address = config.bind_address.clone();
        Self {
            config,
            port,
            bind_address,
        }
    }

    /// Override the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Override the bind address.
    /// Use "0.0.0.0" to allow network access, "127.0.0.1" (default) for
    /// localhost only.
    pub fn with_bind_address(mut self, addr: impl Into<String>) -> Self {
        self.bind_address = addr.into();
        self
    }

    /// Build the router with all routes.
    pub fn build_router(&self) -> Router {
        let store = Arc::new(SessionStore::new());
        let gate = GateController::new(&self.config, store, Arc::new(LoggingNavigationSink));
        let state = Arc::new(AppState { gate });

        Router::new()
            .route("/health", get(health_handler))
            .route("/auth/key", post(submit_key_handler))
            .route("/session", get(session_handler))
            .route("/logout", post(logout_handler))
            .route("/pages/:page", get(page_handler))
            .fallback(fallback_handler)
            .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
            .layer(TimeoutLayer::new(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
            .with_state(state)
    }

    /// Start the server with graceful shutdown.
    pub async fn start(&self) -> Result<()> {
        let router = self.build_router();
        let addr = format!("{}:{}", self.bind_address, self.port);

        tracing::info!("Starting page host on {}", addr);

        // Security warning if binding to all interfaces
        if self.bind_address == "0.0.0.0" {
            tracing::warn!(
                "Page host is binding to 0.0.0.0 which exposes it to the network. \
                Use 127.0.0.1 (default) for local-only access."
            );
        }

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }

    /// Get the port.
    pub fn port(&self) -> u16 {
        self.port
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutdown signal received");
}

// =============================================================================
// Request/Response Types
// =============================================================================

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Key submission request.
#[derive(Deserialize)]
struct KeySubmission {
    key: String,
}

/// Successful grant response.
#[derive(Serialize)]
struct GrantResponse {
    granted: AccessTier,
}

/// Session diagnostics response. Reports record shape, not a verdict;
/// verdicts are per-page.
#[derive(Serialize)]
struct SessionResponse {
    authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    age_ms: Option<i64>,
}

/// Logout response.
#[derive(Serialize)]
struct LogoutResponse {
    status: &'static str,
}

// =============================================================================
// Handlers
// =============================================================================

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn submit_key_handler(
    State(state): State<Arc<AppState>>,
    Json(submission): Json<KeySubmission>,
) -> Result<Json<GrantResponse>, UserError> {
    if submission.key.trim().is_empty() {
        return Err(UserError::invalid_request("Please enter a key."));
    }

    let gate = &state.gate;
    match gate
        .validator()
        .grant(gate.store(), &submission.key, now_ms())
    {
        GrantOutcome::Granted(tier) => Ok(Json(GrantResponse { granted: tier })),
        GrantOutcome::Rejected => Err(UserError::key_rejected()),
    }
}

async fn page_handler(
    State(state): State<Arc<AppState>>,
    Path(page): Path<String>,
) -> Response {
    let page = PageId::from_path(&page);
    match state.gate.check_page(&page) {
        Verdict::Allow => Html(render_page(&page)).into_response(),
        Verdict::Deny => {
            // 303 with no history entry worth returning to; the record is
            // already purged.
            let destination = format!("/pages/{}", state.gate.blocked_destination());
            Redirect::to(&destination).into_response()
        }
    }
}

async fn session_handler(State(state): State<Arc<AppState>>) -> Json<SessionResponse> {
    let response = match state.gate.store().read() {
        ReadOutcome::Absent | ReadOutcome::Incomplete => SessionResponse {
            authenticated: false,
            tier: None,
            age_ms: None,
        },
        ReadOutcome::Complete(record) => {
            let age_ms = record
                .issued_at_ms
                .parse::<i64>()
                .ok()
                .map(|issued| now_ms().saturating_sub(issued));
            SessionResponse {
                authenticated: record.status == STATUS_AUTHENTICATED,
                tier: Some(record.tier),
                age_ms,
            }
        }
    };
    Json(response)
}

async fn logout_handler(State(state): State<Arc<AppState>>) -> Json<LogoutResponse> {
    state.gate.store().clear();
    tracing::info!("visitor logged out, session cleared");
    crate::audit::log_event(&SessionEvent::LoggedOut);
    Json(LogoutResponse {
        status: "logged_out",
    })
}

async fn fallback_handler() -> UserError {
    UserError::not_found("page")
}

/// Minimal rendering stub for a page the gate allowed. The real site
/// serves documents; the host only needs to prove the verdict reached
/// the response.
fn render_page(page: &PageId) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head><title>{page}</title></head>\n\
         <body>\n<h1>{page}</h1>\n</body>\n</html>\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_router_builds() {
        let server = Server::new(GateConfig::default());
        let _router = server.build_router();
    }

    #[test]
    fn test_builder_overrides() {
        let server = Server::new(GateConfig::default())
            .with_port(9999)
            .with_bind_address("0.0.0.0");
        assert_eq!(server.port(), 9999);
        assert_eq!(server.bind_address, "0.0.0.0");
    }

    #[test]
    fn test_render_page_names_the_page() {
        let html = render_page(&PageId::from_path("games.html"));
        assert!(html.contains("<title>games.html</title>"));
        assert!(html.contains("<h1>games.html</h1>"));
    }
}
