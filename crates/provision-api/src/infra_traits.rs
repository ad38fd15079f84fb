//! Infrastructure API contract consumed by the apply engine.
//!
//! The provider is a black box exposing, per resource kind:
//! - `lookup(identity) -> Option<remote-id>`
//! - `create(spec) -> remote-id | error`
//!
//! Transport, credentials and provider configuration are the implementor's
//! concern. An in-memory fake is provided via the `fakes` module.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::{ApiError, ApiResult};
use crate::resource::{RemoteId, ResourceKey, ResourceSpec};

/// Remote ids observed for dependencies during the current apply cycle.
pub type ResolvedRefs = BTreeMap<ResourceKey, RemoteId>;

/// Look up the remote id resolved for `key`, failing with
/// [`ApiError::MissingReference`] when it is absent.
pub fn resolved<'a>(refs: &'a ResolvedRefs, key: &ResourceKey) -> ApiResult<&'a RemoteId> {
    refs.get(key)
        .ok_or_else(|| ApiError::MissingReference(key.path()))
}

/// Per-kind lookup/create boundary of the infrastructure provider.
///
/// Guarantees expected from implementors:
/// - `lookup(key)` returns `Ok(None)` when the resource does not exist; it
///   never mutates remote state.
/// - `create(key, spec, refs)` materializes exactly one resource and returns
///   its identifier. `refs` holds the remote ids of every key in
///   `spec.references()`.
#[async_trait]
pub trait InfraApi: Send + Sync {
    /// Find an existing resource by its stable identity.
    async fn lookup(&self, key: &ResourceKey) -> ApiResult<Option<RemoteId>>;

    /// Create the resource described by `spec`.
    async fn create(
        &self,
        key: &ResourceKey,
        spec: &ResourceSpec,
        refs: &ResolvedRefs,
    ) -> ApiResult<RemoteId>;
}
