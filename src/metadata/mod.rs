//! Database instance metadata lookup.
//!
//! The Enhanced Monitoring log stream is named after the instance's
//! immutable resource id, not its user-facing identifier, so each
//! invocation must resolve one to the other. The id never changes for the
//! lifetime of an instance, which makes it safe to cache for the lifetime
//! of the hosting process.

use std::collections::HashMap;

use anyhow::{Context, Result};
use tracing::debug;

/// Maps instance identifiers to resolved resource ids.
///
/// Owned by the caller and handed into each invocation; lives as long as
/// the hosting process so repeated invocations for the same instance skip
/// the metadata call. The aggregation core never sees it.
#[derive(Debug, Default)]
pub struct ResourceIdCache {
    ids: HashMap<String, String>,
}

impl ResourceIdCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, instance_id: &str) -> Option<&str> {
        self.ids.get(instance_id).map(String::as_str)
    }

    pub fn insert(&mut self, instance_id: String, resource_id: String) {
        self.ids.insert(instance_id, resource_id);
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Instance metadata service boundary.
pub trait InstanceMetadata: Send + Sync {
    /// Resolve an instance identifier to its immutable resource id.
    fn resolve_resource_id(
        &self,
        instance_id: &str,
    ) -> impl std::future::Future<Output = Result<String>> + Send;
}

/// Resolve through the cache, hitting the metadata service only on a miss.
pub async fn resource_id_for<M: InstanceMetadata>(
    metadata: &M,
    cache: &mut ResourceIdCache,
    instance_id: &str,
) -> Result<String> {
    if let Some(resource_id) = cache.get(instance_id) {
        debug!(instance_id, resource_id, "resource id cache hit");
        return Ok(resource_id.to_string());
    }

    let resource_id = metadata.resolve_resource_id(instance_id).await?;
    debug!(instance_id, resource_id = %resource_id, "resolved resource id");

    cache.insert(instance_id.to_string(), resource_id.clone());

    Ok(resource_id)
}

/// RDS-backed metadata lookup.
pub struct RdsMetadata {
    client: aws_sdk_rds::Client,
}

impl RdsMetadata {
    pub fn new(client: aws_sdk_rds::Client) -> Self {
        Self { client }
    }
}

impl InstanceMetadata for RdsMetadata {
    async fn resolve_resource_id(&self, instance_id: &str) -> Result<String> {
        let output = self
            .client
            .describe_db_instances()
            .db_instance_identifier(instance_id)
            .send()
            .await
            .with_context(|| format!("describing instance {instance_id}"))?;

        let instance = output
            .db_instances()
            .first()
            .with_context(|| format!("instance {instance_id} not found"))?;

        instance
            .dbi_resource_id()
            .map(str::to_owned)
            .with_context(|| format!("instance {instance_id} has no resource id"))
    }
}
