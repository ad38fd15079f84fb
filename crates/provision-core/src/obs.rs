//! Structured observability hooks for the invocation lifecycle.
//!
//! This module provides:
//! - Invocation-scoped tracing spans via the `InvocationSpan` RAII guard
//! - Emission functions for lifecycle events: start, node applied, finish,
//!   rejection
//!
//! Events are emitted at `info!` level (failed nodes at `warn!`).

use tracing::{info, warn};

use crate::report::{ApplyResult, InvocationOutcome};

/// RAII guard that enters an invocation-scoped span.
///
/// Only hold this in synchronous code; async paths should use
/// [`invocation_span`] with `Instrument` instead.
pub struct InvocationSpan {
    _span: tracing::span::EnteredSpan,
}

impl InvocationSpan {
    /// Create and enter a span tagged with the invocation id.
    pub fn enter(invocation_id: &str) -> Self {
        Self {
            _span: invocation_span(invocation_id).entered(),
        }
    }
}

/// Span tagged with the invocation id.
pub fn invocation_span(invocation_id: &str) -> tracing::Span {
    tracing::info_span!("provision.invocation", invocation_id = %invocation_id)
}

/// Emit event: invocation started for a config fingerprint.
pub fn emit_invocation_started(invocation_id: &str, fingerprint: &str) {
    info!(
        event = "invocation.started",
        invocation_id = %invocation_id,
        config = %&fingerprint[..12.min(fingerprint.len())],
    );
}

/// Emit event: one node reached a terminal state.
pub fn emit_node_applied(result: &ApplyResult) {
    match result.error() {
        None => info!(
            event = "node.applied",
            kind = %result.kind,
            key = %result.key,
            status = result.status.label(),
        ),
        Some(error) => warn!(
            event = "node.applied",
            kind = %result.kind,
            key = %result.key,
            status = result.status.label(),
            error = %error,
        ),
    }
}

/// Emit event: invocation finished with an outcome.
pub fn emit_invocation_finished(invocation_id: &str, outcome: &InvocationOutcome, duration_ms: u64) {
    info!(
        event = "invocation.finished",
        invocation_id = %invocation_id,
        status = %outcome.status(),
        nodes = outcome.results().len(),
        duration_ms = duration_ms,
    );
}

/// Emit event: invocation rejected before the apply phase (warning level).
pub fn emit_invocation_rejected(invocation_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "invocation.rejected", invocation_id = %invocation_id, error = %error);
}
