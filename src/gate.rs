// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Gate controller: turns validator verdicts into render-or-redirect.
//!
//! Per page view the controller short-circuits public pages, runs the
//! validator once for everything else, and on ALLOW keeps re-running it
//! for as long as the view stays open: on a fixed interval and on the
//! discrete browser-ish triggers (tab regained focus, tab became visible,
//! history navigation). Any DENY at any point performs the one-way
//! navigation to the blocked destination; the record is already purged by
//! the validator at that point, so the blocked page cannot bounce back.
//!
//! The controller acts on verdicts only. It never branches on *which*
//! failure state occurred; that distinction exists for logging alone.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::GateConfig;
use crate::store::SessionStore;
use crate::types::PageId;
use crate::validator::{now_ms, SessionValidator, Verdict};

/// Host-owned navigation seam. `replace` must not leave a history entry
/// behind; the back button cannot return to a denied view.
pub trait NavigationSink: Send + Sync {
    fn replace(&self, destination: &str);
}

/// A navigation sink that only records the redirect in the log. Suits
/// hosts that express the navigation themselves (an HTTP host answers
/// with a redirect status instead of steering a window).
#[derive(Debug, Default)]
pub struct LoggingNavigationSink;

impl NavigationSink for LoggingNavigationSink {
    fn replace(&self, destination: &str) {
        tracing::info!(destination = %destination, "one-way navigation (replace)");
    }
}

/// Discrete events that force a re-validation of an open view, beyond
/// the periodic timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevalidateTrigger {
    /// Periodic check. Sent by the internal timer, not by hosts.
    Timer,
    /// The tab regained input focus.
    FocusRegained,
    /// The tab became visible again.
    BecameVisible,
    /// The visitor navigated through browser history.
    HistoryNavigation,
}

impl RevalidateTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timer => "timer",
            Self::FocusRegained => "focus",
            Self::BecameVisible => "visibility",
            Self::HistoryNavigation => "history",
        }
    }
}

struct GateInner {
    validator: SessionValidator,
    store: Arc<SessionStore>,
    nav: Arc<dyn NavigationSink>,
    blocked_destination: String,
    recheck_interval: Duration,
}

/// Orchestrates the gate for one browsing session. Cheap to clone; all
/// clones share the same store and navigation sink.
#[derive(Clone)]
pub struct GateController {
    inner: Arc<GateInner>,
}

impl GateController {
    pub fn new(config: &GateConfig, store: Arc<SessionStore>, nav: Arc<dyn NavigationSink>) -> Self {
        Self {
            inner: Arc::new(GateInner {
                validator: SessionValidator::from_config(config),
                store,
                nav,
                blocked_destination: config.blocked_destination.clone(),
                recheck_interval: Duration::from_secs(config.recheck_interval_secs),
            }),
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.inner.store
    }

    pub fn validator(&self) -> &SessionValidator {
        &self.inner.validator
    }

    pub fn blocked_destination(&self) -> &str {
        &self.inner.blocked_destination
    }

    /// Run the gate once for a page load. Public pages never reach the
    /// validator; everything else gets the full pipeline, and a DENY
    /// performs the one-way navigation before returning.
    pub fn check_page(&self, page: &PageId) -> Verdict {
        if self.inner.validator.policy().is_public(page) {
            tracing::debug!(page = %page, "public page, no gating");
            return Verdict::Allow;
        }

        let state = self.inner.validator.validate(&self.inner.store, page, now_ms());
        match state.verdict() {
            Verdict::Allow => Verdict::Allow,
            Verdict::Deny => {
                self.inner.nav.replace(&self.inner.blocked_destination);
                Verdict::Deny
            }
        }
    }

    /// Open a page view: run the gate once and, when allowed, keep the
    /// view under continuous re-validation until it is dropped. Public
    /// pages get an allowed view with no watcher attached.
    pub fn open_view(&self, page: PageId) -> PageView {
        if self.inner.validator.policy().is_public(&page) {
            tracing::debug!(page = %page, "public page, no gating");
            return PageView {
                page,
                verdict: Verdict::Allow,
                triggers: None,
                watcher: None,
            };
        }

        let verdict = match self
            .inner
            .validator
            .validate(&self.inner.store, &page, now_ms())
            .verdict()
        {
            Verdict::Allow => Verdict::Allow,
            Verdict::Deny => {
                self.inner.nav.replace(&self.inner.blocked_destination);
                return PageView {
                    page,
                    verdict: Verdict::Deny,
                    triggers: None,
                    watcher: None,
                };
            }
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let watcher = tokio::spawn(watch_view(self.inner.clone(), page.clone(), rx));
        PageView {
            page,
            verdict,
            triggers: Some(tx),
            watcher: Some(watcher),
        }
    }
}

/// Re-validation loop for one open view. Ends on the first DENY (the
/// view is navigated away) or when the view is dropped.
async fn watch_view(
    inner: Arc<GateInner>,
    page: PageId,
    mut triggers: mpsc::UnboundedReceiver<RevalidateTrigger>,
) {
    let mut interval = tokio::time::interval(inner.recheck_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick of a tokio interval fires immediately; the open-view
    // check already ran, so skip it.
    interval.tick().await;

    loop {
        let trigger = tokio::select! {
            _ = interval.tick() => RevalidateTrigger::Timer,
            received = triggers.recv() => match received {
                Some(trigger) => trigger,
                None => break,
            },
        };

        let state = inner.validator.validate(&inner.store, &page, now_ms());
        tracing::debug!(
            page = %page,
            trigger = trigger.as_str(),
            state = %state,
            "re-validation"
        );
        if !state.is_allow() {
            inner.nav.replace(&inner.blocked_destination);
            break;
        }
    }
}

/// An open, gated page view. Dropping it cancels the periodic timer and
/// the event subscription; no background task outlives the view.
pub struct PageView {
    page: PageId,
    verdict: Verdict,
    triggers: Option<mpsc::UnboundedSender<RevalidateTrigger>>,
    watcher: Option<JoinHandle<()>>,
}

impl PageView {
    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    pub fn page(&self) -> &PageId {
        &self.page
    }

    /// Feed a discrete trigger to the watcher. No-op on public or denied
    /// views, or after the watcher ended.
    pub fn notify(&self, trigger: RevalidateTrigger) {
        if let Some(tx) = &self.triggers {
            let _ = tx.send(trigger);
        }
    }
}

impl Drop for PageView {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
    }
}
