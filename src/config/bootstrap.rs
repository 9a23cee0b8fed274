use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_NODE_ID;
use crate::control_plane::ShardConfig;
use crate::store::validate_resource_name;
use crate::Error;
use crate::Result;

/// Configuration the binary publishes once before it starts serving, so
/// nodes connecting right after startup are not left with an empty snapshot.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BootstrapConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_node_id")]
    pub node_id: String,

    #[serde(default = "default_total_hosts")]
    pub total_hosts: i64,

    #[serde(default = "default_shard_size")]
    pub default_shard_size: i64,

    /// Per-tenant overrides, as a list of tables: configuration keys are
    /// case-folded and tenant names are not.
    #[serde(default = "default_tenants")]
    pub tenants: Vec<TenantShardSize>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TenantShardSize {
    pub name: String,
    pub shard_size: i64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            node_id: default_node_id(),
            total_hosts: default_total_hosts(),
            default_shard_size: default_shard_size(),
            tenants: default_tenants(),
        }
    }
}

impl BootstrapConfig {
    pub fn shard_config(&self) -> ShardConfig {
        ShardConfig {
            total_hosts: self.total_hosts,
            default_shard_size: self.default_shard_size,
            tenants: self
                .tenants
                .iter()
                .map(|tenant| (tenant.name.clone(), tenant.shard_size))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    /// Only the node id is checked here; the values go through the same
    /// validation as any operator publish.
    pub fn validate(&self) -> Result<()> {
        if self.enabled {
            validate_resource_name(&self.node_id)
                .map_err(|e| Error::InvalidConfig(format!("bootstrap.node_id: {e}")))?;
        }
        Ok(())
    }
}

fn default_enabled() -> bool {
    true
}
fn default_node_id() -> String {
    DEFAULT_NODE_ID.to_string()
}
fn default_total_hosts() -> i64 {
    8
}
fn default_shard_size() -> i64 {
    2
}
fn default_tenants() -> Vec<TenantShardSize> {
    Vec::new()
}
