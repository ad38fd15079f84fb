//! Outcome Reporter.
//!
//! Aggregates per-node [`ApplyResult`]s into one [`InvocationOutcome`] with a
//! deterministic, line-oriented summary. The summary contains no timestamps
//! or run-specific ids, so identical result sequences render byte-identical
//! text.

use provision_api::{RemoteId, ResourceKey, ResourceKind};
use serde::Serialize;

use crate::error::{NodeFailure, ProvisionError};

/// Terminal state of one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ApplyStatus {
    Created { remote_id: RemoteId },
    AlreadyExists { remote_id: RemoteId },
    Failed { error: NodeFailure },
}

impl ApplyStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ApplyStatus::Created { .. } => "created",
            ApplyStatus::AlreadyExists { .. } => "already_exists",
            ApplyStatus::Failed { .. } => "failed",
        }
    }
}

/// Result of applying one resource definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyResult {
    pub kind: ResourceKind,
    pub key: ResourceKey,
    #[serde(flatten)]
    pub status: ApplyStatus,
}

impl ApplyResult {
    pub fn created(key: ResourceKey, remote_id: RemoteId) -> Self {
        Self::new(key, ApplyStatus::Created { remote_id })
    }

    pub fn already_exists(key: ResourceKey, remote_id: RemoteId) -> Self {
        Self::new(key, ApplyStatus::AlreadyExists { remote_id })
    }

    pub fn failed(key: ResourceKey, error: NodeFailure) -> Self {
        Self::new(key, ApplyStatus::Failed { error })
    }

    fn new(key: ResourceKey, status: ApplyStatus) -> Self {
        Self {
            kind: key.kind(),
            key,
            status,
        }
    }

    /// `true` for `Created` and `AlreadyExists`.
    pub fn is_success(&self) -> bool {
        !matches!(self.status, ApplyStatus::Failed { .. })
    }

    pub fn remote_id(&self) -> Option<&RemoteId> {
        match &self.status {
            ApplyStatus::Created { remote_id } | ApplyStatus::AlreadyExists { remote_id } => {
                Some(remote_id)
            }
            ApplyStatus::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&NodeFailure> {
        match &self.status {
            ApplyStatus::Failed { error } => Some(error),
            _ => None,
        }
    }

    /// `<kind> <key> <status> <id-or-error>`
    pub fn summary_line(&self) -> String {
        let detail = match &self.status {
            ApplyStatus::Created { remote_id } | ApplyStatus::AlreadyExists { remote_id } => {
                remote_id.to_string()
            }
            ApplyStatus::Failed { error } => error.to_string(),
        };
        format!("{} {} {} {}", self.kind, self.key, self.status.label(), detail)
    }
}

/// Overall status of an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    PartialFailure,
    Failure,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Success => "success",
            OutcomeStatus::PartialFailure => "partial_failure",
            OutcomeStatus::Failure => "failure",
        }
    }
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final, immutable result of one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvocationOutcome {
    status: OutcomeStatus,
    results: Vec<ApplyResult>,
    summary: String,
}

impl InvocationOutcome {
    /// Outcome of an invocation rejected before any API call.
    pub fn rejected(err: &ProvisionError) -> Self {
        Self {
            status: OutcomeStatus::Failure,
            results: Vec::new(),
            summary: err.to_string(),
        }
    }

    pub fn status(&self) -> OutcomeStatus {
        self.status
    }

    pub fn results(&self) -> &[ApplyResult] {
        &self.results
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }

    /// First summary line.
    pub fn headline(&self) -> &str {
        self.summary.lines().next().unwrap_or_default()
    }
}

/// Aggregate ordered results into an [`InvocationOutcome`].
///
/// `Success` iff every result succeeded; `Failure` iff none did (including an
/// empty sequence); `PartialFailure` otherwise.
pub fn summarize(results: Vec<ApplyResult>) -> InvocationOutcome {
    let created = results
        .iter()
        .filter(|r| matches!(r.status, ApplyStatus::Created { .. }))
        .count();
    let existing = results
        .iter()
        .filter(|r| matches!(r.status, ApplyStatus::AlreadyExists { .. }))
        .count();
    let failed = results.len() - created - existing;

    let status = if results.is_empty() || failed == results.len() {
        OutcomeStatus::Failure
    } else if failed == 0 {
        OutcomeStatus::Success
    } else {
        OutcomeStatus::PartialFailure
    };

    let mut summary = format!("{status}: {created} created, {existing} existing, {failed} failed");
    for result in &results {
        summary.push('\n');
        summary.push_str(&result.summary_line());
    }

    InvocationOutcome {
        status,
        results,
        summary,
    }
}
