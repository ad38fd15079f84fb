//! Trigger Adapter support: invocation sources and result relays.
//!
//! A trigger supplies a parameter bag and an invocation id; when the
//! invocation completes its [`InvocationOutcome`] is relayed back in the
//! shape the source expects (build status for VCS pushes, a comment for
//! incidents, plain text for manual runs).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::IntakeError;
use crate::params::ParameterBag;
use crate::report::{InvocationOutcome, OutcomeStatus};

/// What started an invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum TriggerEvent {
    Manual {
        invocation_id: String,
    },
    VcsPush {
        repository: String,
        git_ref: String,
        commit_sha: String,
    },
    Incident {
        incident_id: String,
    },
}

impl TriggerEvent {
    /// Manual invocation with a fresh random id.
    pub fn manual() -> Self {
        TriggerEvent::Manual {
            invocation_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Incident id, commit sha, or the manual id.
    pub fn invocation_id(&self) -> &str {
        match self {
            TriggerEvent::Manual { invocation_id } => invocation_id,
            TriggerEvent::VcsPush { commit_sha, .. } => commit_sha,
            TriggerEvent::Incident { incident_id } => incident_id,
        }
    }

    pub fn source(&self) -> &'static str {
        match self {
            TriggerEvent::Manual { .. } => "manual",
            TriggerEvent::VcsPush { .. } => "vcs_push",
            TriggerEvent::Incident { .. } => "incident",
        }
    }
}

/// Repository block of a push webhook.
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryRef {
    pub full_name: String,
}

/// Subset of a VCS push webhook body.
#[derive(Debug, Clone, Deserialize)]
pub struct VcsPushPayload {
    #[serde(rename = "ref")]
    pub git_ref: String,
    /// Commit sha the ref now points to.
    pub after: String,
    pub repository: RepositoryRef,
}

impl VcsPushPayload {
    pub fn into_event(self) -> TriggerEvent {
        TriggerEvent::VcsPush {
            repository: self.repository.full_name,
            git_ref: self.git_ref,
            commit_sha: self.after,
        }
    }
}

/// Incident-management callback body; `fields` carries the parameter bag.
#[derive(Debug, Clone, Deserialize)]
pub struct IncidentPayload {
    pub incident_id: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl IncidentPayload {
    pub fn into_parts(self) -> Result<(TriggerEvent, ParameterBag), IntakeError> {
        let bag = ParameterBag::from_json(&Value::Object(self.fields))?;
        Ok((
            TriggerEvent::Incident {
                incident_id: self.incident_id,
            },
            bag,
        ))
    }
}

/// Source-specific rendering of an outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RelayMessage {
    /// Commit status for the pushed revision.
    BuildStatus {
        repository: String,
        commit_sha: String,
        state: &'static str,
        description: String,
        details: String,
    },
    /// Comment appended to the incident, plus the state to move it to.
    IncidentComment {
        incident_id: String,
        state: &'static str,
        comment: String,
    },
    /// Plain summary for manual runs.
    Console { summary: String },
}

/// Outcome relayed back to the trigger source.
#[derive(Debug, Clone, Serialize)]
pub struct Relay {
    pub invocation_id: String,
    pub source: &'static str,
    pub status: OutcomeStatus,
    pub reported_at: DateTime<Utc>,
    pub message: RelayMessage,
}

impl Relay {
    pub fn new(event: &TriggerEvent, outcome: &InvocationOutcome) -> Self {
        Self::at(event, outcome, Utc::now())
    }

    /// Build a relay with a fixed timestamp (used for deterministic tests).
    pub fn at(event: &TriggerEvent, outcome: &InvocationOutcome, reported_at: DateTime<Utc>) -> Self {
        let message = match event {
            TriggerEvent::VcsPush {
                repository,
                commit_sha,
                ..
            } => RelayMessage::BuildStatus {
                repository: repository.clone(),
                commit_sha: commit_sha.clone(),
                state: if outcome.is_success() {
                    "success"
                } else {
                    "failure"
                },
                description: outcome.headline().to_string(),
                details: outcome.summary().to_string(),
            },
            TriggerEvent::Incident { incident_id } => RelayMessage::IncidentComment {
                incident_id: incident_id.clone(),
                state: if outcome.is_success() {
                    "resolved"
                } else {
                    "open"
                },
                comment: incident_comment(event.invocation_id(), outcome),
            },
            TriggerEvent::Manual { .. } => RelayMessage::Console {
                summary: outcome.summary().to_string(),
            },
        };

        Relay {
            invocation_id: event.invocation_id().to_string(),
            source: event.source(),
            status: outcome.status(),
            reported_at,
            message,
        }
    }
}

fn incident_comment(invocation_id: &str, outcome: &InvocationOutcome) -> String {
    let mut comment = format!(
        "**Provisioning {}** (invocation `{}`)\n\n```\n{}\n```",
        outcome.status(),
        invocation_id,
        outcome.summary()
    );
    if !outcome.is_success() {
        comment.push_str("\n\nRe-run the provisioning action to retry; existing resources are kept.");
    }
    comment
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProvisionError;
    use crate::report::{summarize, ApplyResult};
    use chrono::TimeZone;
    use provision_api::{RemoteId, ResourceKey};

    fn success() -> InvocationOutcome {
        summarize(vec![ApplyResult::created(
            ResourceKey::disk("p", "z", "d"),
            RemoteId::new("disk-1"),
        )])
    }

    fn rejected() -> InvocationOutcome {
        InvocationOutcome::rejected(&ProvisionError::Intake(IntakeError::MissingParameter(
            "zone".to_string(),
        )))
    }

    #[test]
    fn test_push_payload_parses_webhook_fields() {
        let payload: VcsPushPayload = serde_json::from_value(serde_json::json!({
            "ref": "refs/heads/main",
            "after": "0123abcd",
            "repository": {"full_name": "infra/vm-config", "private": true},
            "pusher": {"name": "someone"}
        }))
        .unwrap();
        let event = payload.into_event();
        assert_eq!(event.invocation_id(), "0123abcd");
        assert_eq!(event.source(), "vcs_push");
    }

    #[test]
    fn test_incident_payload_yields_bag() {
        let payload: IncidentPayload = serde_json::from_value(serde_json::json!({
            "incident_id": "INC-42",
            "fields": {"zone": "us-central1-a", "size": 50}
        }))
        .unwrap();
        let (event, bag) = payload.into_parts().unwrap();
        assert_eq!(event.invocation_id(), "INC-42");
        assert_eq!(bag.get("size"), Some("50"));
    }

    #[test]
    fn test_incident_payload_rejects_nested_fields() {
        let payload: IncidentPayload = serde_json::from_value(serde_json::json!({
            "incident_id": "INC-1",
            "fields": {"labels": {"a": "b"}}
        }))
        .unwrap();
        assert!(payload.into_parts().is_err());
    }

    #[test]
    fn test_manual_ids_are_unique() {
        assert_ne!(
            TriggerEvent::manual().invocation_id(),
            TriggerEvent::manual().invocation_id()
        );
    }

    #[test]
    fn test_build_status_relay() {
        let event = TriggerEvent::VcsPush {
            repository: "infra/vm-config".to_string(),
            git_ref: "refs/heads/main".to_string(),
            commit_sha: "abc".to_string(),
        };
        let relay = Relay::new(&event, &rejected());
        match relay.message {
            RelayMessage::BuildStatus {
                state, description, ..
            } => {
                assert_eq!(state, "failure");
                assert_eq!(description, "missing parameter: zone");
            }
            other => panic!("unexpected relay {other:?}"),
        }
    }

    #[test]
    fn test_incident_relay_resolves_on_success() {
        let event = TriggerEvent::Incident {
            incident_id: "INC-7".to_string(),
        };
        let relay = Relay::new(&event, &success());
        match &relay.message {
            RelayMessage::IncidentComment { state, comment, .. } => {
                assert_eq!(*state, "resolved");
                assert!(comment.contains("disk projects/p/zones/z/disks/d created disk-1"));
                assert!(comment.contains("`INC-7`"));
            }
            other => panic!("unexpected relay {other:?}"),
        }

        let relay = Relay::new(&event, &rejected());
        assert!(matches!(
            relay.message,
            RelayMessage::IncidentComment { state: "open", .. }
        ));
    }

    #[test]
    fn test_relay_json_shape() {
        let event = TriggerEvent::Manual {
            invocation_id: "manual-1".to_string(),
        };
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let value = serde_json::to_value(Relay::at(&event, &success(), at)).unwrap();
        assert_eq!(value["invocation_id"], "manual-1");
        assert_eq!(value["source"], "manual");
        assert_eq!(value["status"], "success");
        assert_eq!(value["reported_at"], "2024-01-02T03:04:05Z");
        assert_eq!(value["message"]["kind"], "console");
    }
}
