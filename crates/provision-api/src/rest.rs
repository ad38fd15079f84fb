//! REST adapter for a compute-style infrastructure API
//!
//! Resources live at provider paths such as
//! `projects/{p}/zones/{z}/instances/{name}` under a configurable base URL.
//! Creation is a `POST` to the collection that answers with a long-running
//! operation. The adapter polls that operation until `DONE`, then reads the
//! resource back until it is visible, so the returned id is the one `lookup`
//! will report on later runs.

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::infra_traits::{resolved, InfraApi, ResolvedRefs};
use crate::resource::{RemoteId, ResourceKey, ResourceKind, ResourceSpec};

/// Provider connection settings, injected by the trigger layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL, e.g. `https://compute.example.com/v1`
    pub base_url: String,
    /// Bearer token (optional for local emulators)
    pub token: Option<String>,
    /// User agent sent with every request
    pub user_agent: String,
    /// Delay between polls of a pending operation or read-back
    pub poll_interval: Duration,
    /// Polls before a pending create is reported as [`ApiError::Timeout`]
    pub max_polls: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base_url: std::env::var("PROVISION_API_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8080/compute/v1".to_string()),
            token: std::env::var("PROVISION_API_TOKEN").ok(),
            user_agent: format!("provisioner/{}", env!("CARGO_PKG_VERSION")),
            poll_interval: Duration::from_secs(2),
            max_polls: 150,
        }
    }
}

impl ApiConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Create config for a specific endpoint
    pub fn new(base_url: &str) -> Self {
        ApiConfig {
            base_url: base_url.to_string(),
            ..Self::default()
        }
    }

    /// Set authentication token
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// reqwest-backed [`InfraApi`].
pub struct RestInfraApi {
    config: ApiConfig,
    http_client: reqwest::Client,
}

impl RestInfraApi {
    pub fn new(config: ApiConfig) -> ApiResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(RestInfraApi {
            config,
            http_client,
        })
    }

    /// Create client from environment variables
    pub fn from_env() -> ApiResult<Self> {
        Self::new(ApiConfig::from_env())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http_client.request(method, self.config.url(path));
        match &self.config.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// `GET` a resource document; `None` on 404.
    async fn fetch(&self, path: &str) -> ApiResult<Option<Value>> {
        debug!(path = %path, "GET");
        let response = self.request(Method::GET, path).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = ensure_success(response).await?;
        Ok(Some(response.json::<Value>().await?))
    }

    async fn lookup_attachment(&self, key: &ResourceKey) -> ApiResult<Option<RemoteId>> {
        let Some(instance) = self.fetch(&key.collection_path()).await? else {
            return Ok(None);
        };
        Ok(find_attached_disk(&instance, key.name()))
    }

    /// Current id of `key`, or `None` while it is absent or not yet usable.
    async fn observe(&self, key: &ResourceKey) -> ApiResult<Option<RemoteId>> {
        match key.kind() {
            ResourceKind::Attachment => self.lookup_attachment(key).await,
            kind => Ok(self
                .fetch(&key.path())
                .await?
                .and_then(|doc| remote_id_of(kind, &doc))),
        }
    }

    /// Poll a pending operation until the provider reports it `DONE`.
    ///
    /// Responses without a `status` are not operations and count as done.
    /// A pending operation without a `name` cannot be polled; the read-back
    /// that follows waits for the resource instead.
    async fn wait_for_operation(&self, key: &ResourceKey, mut operation: Value) -> ApiResult<()> {
        let mut polls = 0;
        loop {
            let status = operation["status"].as_str().unwrap_or("DONE");
            if status == "DONE" {
                return operation_outcome(&operation);
            }
            let Some(name) = operation["name"].as_str().map(str::to_string) else {
                debug!(key = %key, status, "unnamed pending operation");
                return Ok(());
            };
            if polls == self.config.max_polls {
                return Err(ApiError::Timeout(name));
            }
            polls += 1;
            debug!(operation = %name, status, "operation pending");
            tokio::time::sleep(self.config.poll_interval).await;
            operation = self
                .fetch(&operations_path(key, &name))
                .await?
                .ok_or_else(|| ApiError::Decode(format!("operation {name} not found")))?;
        }
    }

    /// Read `key` back until it is visible with a usable id.
    async fn read_back(&self, key: &ResourceKey) -> ApiResult<RemoteId> {
        for poll in 0..=self.config.max_polls {
            if let Some(remote_id) = self.observe(key).await? {
                return Ok(remote_id);
            }
            if poll < self.config.max_polls {
                tokio::time::sleep(self.config.poll_interval).await;
            }
        }
        Err(ApiError::Timeout(key.path()))
    }
}

#[async_trait::async_trait]
impl InfraApi for RestInfraApi {
    async fn lookup(&self, key: &ResourceKey) -> ApiResult<Option<RemoteId>> {
        match key.kind() {
            ResourceKind::Attachment => self.lookup_attachment(key).await,
            kind => match self.fetch(&key.path()).await? {
                Some(doc) => remote_id_of(kind, &doc)
                    .map(Some)
                    .ok_or_else(|| ApiError::Decode(format!("{key} has no usable identifier"))),
                None => Ok(None),
            },
        }
    }

    async fn create(
        &self,
        key: &ResourceKey,
        spec: &ResourceSpec,
        refs: &ResolvedRefs,
    ) -> ApiResult<RemoteId> {
        let (path, body) = create_request(key, spec, refs)?;
        debug!(path = %path, kind = %key.kind(), "POST");
        let response = self
            .request(Method::POST, &path)
            .json(&body)
            .send()
            .await?;
        let text = ensure_success(response).await?.text().await?;
        let operation = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)?
        };

        self.wait_for_operation(key, operation).await?;
        self.read_back(key).await
    }
}

/// Map a non-success response to [`ApiError::Rejected`], preferring the
/// provider's `error.message` when the body carries one.
async fn ensure_success(response: Response) -> ApiResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or(text);
    Err(ApiError::Rejected {
        status: status.as_u16(),
        message,
    })
}

/// A finished operation carrying `error.errors[]` failed on the provider side.
fn operation_outcome(operation: &Value) -> ApiResult<()> {
    let Some(errors) = operation["error"]["errors"].as_array() else {
        return Ok(());
    };
    if errors.is_empty() {
        return Ok(());
    }
    let message = errors
        .iter()
        .filter_map(|e| e["message"].as_str())
        .collect::<Vec<_>>()
        .join("; ");
    let status = operation["httpErrorStatusCode"]
        .as_u64()
        .and_then(|code| u16::try_from(code).ok())
        .unwrap_or(400);
    Err(ApiError::Rejected { status, message })
}

/// Operations live next to the resource's region or zone.
fn operations_path(key: &ResourceKey, operation: &str) -> String {
    let scope = match key.kind() {
        ResourceKind::Address => "regions",
        _ => "zones",
    };
    format!(
        "projects/{}/{}/{}/operations/{}",
        key.project(),
        scope,
        key.location(),
        operation
    )
}

/// Extract the identifier the orchestrator tracks for a resource document.
///
/// Addresses are identified by the allocated IP only, since the instance uses
/// it directly as its NAT address; other kinds by `selfLink`, then `id`.
fn remote_id_of(kind: ResourceKind, doc: &Value) -> Option<RemoteId> {
    let fields: &[&str] = match kind {
        ResourceKind::Address => &["address"],
        _ => &["selfLink", "id"],
    };
    fields
        .iter()
        .find_map(|field| match &doc[*field] {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .map(RemoteId::new)
}

/// Source of the non-boot disk named `disk_name` attached to `instance`.
fn find_attached_disk(instance: &Value, disk_name: &str) -> Option<RemoteId> {
    let suffix = format!("/disks/{disk_name}");
    instance["disks"]
        .as_array()?
        .iter()
        .filter(|disk| !disk["boot"].as_bool().unwrap_or(false))
        .filter_map(|disk| disk["source"].as_str())
        .find(|source| source.ends_with(&suffix))
        .map(RemoteId::new)
}

/// Build the collection path and JSON body of a create call.
fn create_request(
    key: &ResourceKey,
    spec: &ResourceSpec,
    refs: &ResolvedRefs,
) -> ApiResult<(String, Value)> {
    let body = match spec {
        ResourceSpec::Address(address) => json!({
            "name": address.name,
            "addressType": address.address_type.as_str(),
            "networkTier": address.network_tier.as_str(),
        }),
        ResourceSpec::Instance(instance) => {
            let nat_ip = resolved(refs, &instance.address)?;
            let zone = &instance.zone;
            json!({
                "name": instance.name,
                "machineType": format!("zones/{zone}/machineTypes/{}", instance.machine_type),
                "disks": [{
                    "boot": true,
                    "autoDelete": true,
                    "deviceName": instance.boot_disk.device_name,
                    "initializeParams": {
                        "sourceImage": instance.boot_disk.image,
                        "diskType": format!("zones/{zone}/diskTypes/{}", instance.boot_disk.disk_type.as_str()),
                        "diskSizeGb": instance.boot_disk.size_gb.to_string(),
                    },
                }],
                "networkInterfaces": [{
                    "network": format!("global/networks/{}", instance.network),
                    "accessConfigs": [{
                        "name": "External NAT",
                        "type": "ONE_TO_ONE_NAT",
                        "natIP": nat_ip.as_str(),
                    }],
                }],
            })
        }
        ResourceSpec::Disk(disk) => json!({
            "name": disk.name,
            "type": format!("zones/{}/diskTypes/{}", disk.zone, disk.disk_type.as_str()),
            "sizeGb": disk.size_gb.to_string(),
        }),
        ResourceSpec::Attachment(attachment) => {
            resolved(refs, &attachment.instance)?;
            let source = resolved(refs, &attachment.disk)?;
            json!({
                "source": source.as_str(),
                "deviceName": attachment.device_name,
                "mode": "READ_WRITE",
            })
        }
    };

    let path = match key.kind() {
        ResourceKind::Attachment => format!("{}/attachDisk", key.collection_path()),
        _ => key.collection_path(),
    };
    Ok((path, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{AttachmentSpec, DiskSpec, DiskType};

    #[test]
    fn test_config_url_joins_without_double_slash() {
        let config = ApiConfig::new("https://compute.example.com/v1/");
        assert_eq!(
            config.url("projects/p/zones/z/disks/d"),
            "https://compute.example.com/v1/projects/p/zones/z/disks/d"
        );
    }

    #[test]
    fn test_remote_id_prefers_ip_for_addresses() {
        let doc = json!({"id": "123", "address": "34.1.2.3", "selfLink": "x"});
        assert_eq!(
            remote_id_of(ResourceKind::Address, &doc).unwrap().as_str(),
            "34.1.2.3"
        );
        assert_eq!(remote_id_of(ResourceKind::Disk, &doc).unwrap().as_str(), "x");
    }

    #[test]
    fn test_remote_id_accepts_numeric_id() {
        let doc = json!({"id": 42});
        assert_eq!(remote_id_of(ResourceKind::Instance, &doc).unwrap().as_str(), "42");
        assert!(remote_id_of(ResourceKind::Instance, &json!({})).is_none());
    }

    #[test]
    fn test_address_without_ip_has_no_id() {
        let reserving = json!({"status": "RESERVING", "selfLink": "https://x/addresses/ip1", "id": "9"});
        assert!(remote_id_of(ResourceKind::Address, &reserving).is_none());
    }

    #[test]
    fn test_find_attached_disk_ignores_boot_disk_with_same_device_name() {
        let instance = json!({
            "disks": [
                {"boot": true, "deviceName": "disk1", "source": "https://x/projects/p/zones/z/disks/vm1"},
            ]
        });
        assert!(find_attached_disk(&instance, "disk1").is_none());
    }

    #[test]
    fn test_operation_error_maps_to_rejected() {
        let failed = json!({
            "status": "DONE",
            "httpErrorStatusCode": 403,
            "error": {"errors": [{"code": "QUOTA_EXCEEDED", "message": "quota exceeded"}]}
        });
        assert_eq!(
            operation_outcome(&failed),
            Err(ApiError::Rejected {
                status: 403,
                message: "quota exceeded".to_string()
            })
        );
        assert_eq!(operation_outcome(&json!({"status": "DONE"})), Ok(()));
    }

    #[test]
    fn test_operations_path_follows_resource_scope() {
        let address = ResourceKey::address("p", "r", "ip");
        let disk = ResourceKey::disk("p", "z", "d");
        assert_eq!(operations_path(&address, "op-1"), "projects/p/regions/r/operations/op-1");
        assert_eq!(operations_path(&disk, "op-2"), "projects/p/zones/z/operations/op-2");
    }

    #[test]
    fn test_find_attached_disk_matches_source_suffix() {
        let instance = json!({
            "disks": [
                {"deviceName": "boot", "source": "https://x/projects/p/zones/z/disks/boot"},
                {"deviceName": "data", "source": "https://x/projects/p/zones/z/disks/disk1"},
            ]
        });
        assert_eq!(
            find_attached_disk(&instance, "disk1").unwrap().as_str(),
            "https://x/projects/p/zones/z/disks/disk1"
        );
        assert!(find_attached_disk(&instance, "disk2").is_none());
    }

    #[test]
    fn test_disk_create_request() {
        let key = ResourceKey::disk("p", "z", "d1");
        let spec = ResourceSpec::Disk(DiskSpec {
            name: "d1".to_string(),
            zone: "z".to_string(),
            disk_type: DiskType::PdStandard,
            size_gb: 100,
        });
        let (path, body) = create_request(&key, &spec, &ResolvedRefs::new()).unwrap();
        assert_eq!(path, "projects/p/zones/z/disks");
        assert_eq!(body["type"], "zones/z/diskTypes/pd-standard");
        assert_eq!(body["sizeGb"], "100");
    }

    #[test]
    fn test_attachment_create_requires_resolved_refs() {
        let instance = ResourceKey::instance("p", "z", "vm");
        let disk = ResourceKey::disk("p", "z", "d1");
        let key = ResourceKey::attachment("p", "z", "vm", "d1");
        let spec = ResourceSpec::Attachment(AttachmentSpec {
            instance: instance.clone(),
            disk: disk.clone(),
            device_name: "d1".to_string(),
        });

        let err = create_request(&key, &spec, &ResolvedRefs::new()).unwrap_err();
        assert!(matches!(err, ApiError::MissingReference(_)));

        let mut refs = ResolvedRefs::new();
        refs.insert(instance, RemoteId::new("vm-link"));
        refs.insert(disk, RemoteId::new("disk-link"));
        let (path, body) = create_request(&key, &spec, &refs).unwrap();
        assert_eq!(path, "projects/p/zones/z/instances/vm/attachDisk");
        assert_eq!(body["source"], "disk-link");
    }
}
