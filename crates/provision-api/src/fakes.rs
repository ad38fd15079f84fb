//! In-memory fake of the infrastructure API (testing and dry runs)
//!
//! `MemoryInfraApi` keeps materialized resources in a `HashMap` keyed by
//! [`ResourceKey`], counts every call, and can be told to fail creation of
//! chosen resource kinds.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{ApiError, ApiResult};
use crate::infra_traits::{resolved, InfraApi, ResolvedRefs};
use crate::resource::{RemoteId, ResourceKey, ResourceKind, ResourceSpec};

/// Stateful in-memory provider.
///
/// Remote ids are deterministic: `<kind>-<n>` where `n` counts successful
/// creations across all kinds, starting at 1.
#[derive(Debug, Default)]
pub struct MemoryInfraApi {
    resources: Mutex<HashMap<ResourceKey, RemoteId>>,
    failing: Mutex<HashSet<ResourceKind>>,
    lookups: AtomicU64,
    creates: AtomicU64,
}

impl MemoryInfraApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `create` of `kind` fail.
    pub fn fail_creates_of(&self, kind: ResourceKind) {
        self.failing.lock().unwrap().insert(kind);
    }

    /// Clear all injected failures.
    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    /// Pre-materialize a resource, as if created by an earlier invocation.
    pub fn seed(&self, key: ResourceKey, id: RemoteId) {
        self.resources.lock().unwrap().insert(key, id);
    }

    /// Remote id currently stored for `key`.
    pub fn get(&self, key: &ResourceKey) -> Option<RemoteId> {
        self.resources.lock().unwrap().get(key).cloned()
    }

    /// Number of materialized resources.
    pub fn len(&self) -> usize {
        self.resources.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total `lookup` calls received.
    pub fn lookup_calls(&self) -> u64 {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Total `create` calls received, including failed ones.
    pub fn create_calls(&self) -> u64 {
        self.creates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InfraApi for MemoryInfraApi {
    async fn lookup(&self, key: &ResourceKey) -> ApiResult<Option<RemoteId>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.resources.lock().unwrap().get(key).cloned())
    }

    async fn create(
        &self,
        key: &ResourceKey,
        spec: &ResourceSpec,
        refs: &ResolvedRefs,
    ) -> ApiResult<RemoteId> {
        self.creates.fetch_add(1, Ordering::SeqCst);

        if self.failing.lock().unwrap().contains(&spec.kind()) {
            return Err(ApiError::Injected(format!("create {} refused", key)));
        }
        for reference in spec.references() {
            resolved(refs, reference)?;
        }

        let mut resources = self.resources.lock().unwrap();
        if resources.contains_key(key) {
            return Err(ApiError::Rejected {
                status: 409,
                message: format!("{} already exists", key),
            });
        }
        let id = RemoteId::new(format!("{}-{}", spec.kind(), resources.len() + 1));
        resources.insert(key.clone(), id.clone());
        Ok(id)
    }
}
