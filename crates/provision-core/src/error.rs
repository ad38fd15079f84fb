//! Error taxonomy for the provisioning orchestrator.

use provision_api::ApiError;

/// Parameter Intake failures. Raised before any node is built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntakeError {
    #[error("missing parameter: {0}")]
    MissingParameter(String),

    #[error("invalid value for parameter {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

/// Resource Graph Builder failures. Cannot occur for a validated config.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("{from} references {missing}, which is not part of the graph")]
    UnresolvedReference { from: String, missing: String },

    #[error("resource defined twice: {0}")]
    DuplicateNode(String),

    #[error("dependency cycle detected involving: {0:?}")]
    Cycle(Vec<String>),
}

/// Errors that reject an invocation before the apply phase.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Intake(#[from] IntakeError),

    #[error("graph error: {0}")]
    Graph(#[from] GraphError),
}

/// Why a single node ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NodeFailure {
    /// A dependency failed, so this node was never attempted.
    #[error("dependency failed: {0}")]
    DependencyFailed(String),

    /// The provider rejected the lookup or create call.
    #[error("api error: {0}")]
    Api(#[from] ApiError),
}

impl serde::Serialize for NodeFailure {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// Result type for pre-apply operations.
pub type Result<T> = std::result::Result<T, ProvisionError>;
