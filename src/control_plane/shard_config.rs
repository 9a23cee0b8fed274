use std::collections::BTreeMap;

use bytes::Bytes;
use prost::Message;

use crate::constants::DEFAULT_SHARD_SIZE_NAME;
use crate::constants::GLOBAL_SETTING_TYPE;
use crate::constants::TENANT_NAME_PREFIX;
use crate::constants::TENANT_OVERRIDE_TYPE;
use crate::constants::TOTAL_HOSTS_NAME;
use crate::proto::discovery::RuntimeValue;
use crate::store::validate_resource_name;
use crate::PublishError;
use crate::Snapshot;

/// Desired shuffle-sharding parameters for one node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardConfig {
    pub total_hosts: i64,
    pub default_shard_size: i64,
    /// tenant → shard size
    pub tenants: BTreeMap<String, i64>,
}

/// One resource a [`ShardConfig`] expands to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeEntry {
    pub type_url: &'static str,
    pub name: String,
    pub value: i64,
}

impl RuntimeEntry {
    pub fn payload(&self) -> Bytes {
        encode_value(self.value)
    }
}

impl ShardConfig {
    /// Checks every value and tenant name and expands the config into its
    /// resources. Nothing is written anywhere.
    pub fn entries(&self) -> Result<Vec<RuntimeEntry>, PublishError> {
        let mut entries = Vec::with_capacity(2 + self.tenants.len());

        entries.push(global_entry(TOTAL_HOSTS_NAME, self.total_hosts)?);
        entries.push(global_entry(DEFAULT_SHARD_SIZE_NAME, self.default_shard_size)?);

        for (tenant, size) in &self.tenants {
            let name = tenant_resource_name(tenant)?;
            if *size < 0 {
                return Err(PublishError::NegativeCount { field: name, value: *size });
            }
            entries.push(RuntimeEntry {
                type_url: TENANT_OVERRIDE_TYPE,
                name,
                value: *size,
            });
        }
        Ok(entries)
    }
}

/// `customer.<tenant>`, validated as a resource name.
pub fn tenant_resource_name(tenant: &str) -> Result<String, PublishError> {
    if tenant.is_empty() {
        return Err(PublishError::InvalidTenant {
            tenant: tenant.to_string(),
            reason: "tenant identifier is empty".to_string(),
        });
    }
    let name = format!("{TENANT_NAME_PREFIX}{tenant}");
    validate_resource_name(&name).map_err(|e| PublishError::InvalidTenant {
        tenant: tenant.to_string(),
        reason: e.to_string(),
    })?;
    Ok(name)
}

pub fn encode_value(value: i64) -> Bytes {
    Bytes::from(RuntimeValue { value }.encode_to_vec())
}

pub fn decode_value(payload: &[u8]) -> Result<i64, prost::DecodeError> {
    RuntimeValue::decode(payload).map(|v| v.value)
}

/// Flattens a snapshot into `resource name → value`, the view a node applies.
///
/// Payloads that do not decode are skipped.
pub fn runtime_values(snapshot: &Snapshot) -> BTreeMap<String, i64> {
    [GLOBAL_SETTING_TYPE, TENANT_OVERRIDE_TYPE]
        .into_iter()
        .flat_map(|type_url| snapshot.resources().of_type(type_url))
        .filter_map(|(key, resource)| {
            decode_value(resource.payload())
                .ok()
                .map(|value| (key.name().to_string(), value))
        })
        .collect()
}

fn global_entry(
    name: &str,
    value: i64,
) -> Result<RuntimeEntry, PublishError> {
    if value < 0 {
        return Err(PublishError::NegativeCount {
            field: name.to_string(),
            value,
        });
    }
    Ok(RuntimeEntry {
        type_url: GLOBAL_SETTING_TYPE,
        name: name.to_string(),
        value,
    })
}
