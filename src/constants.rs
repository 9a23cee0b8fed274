// -
// Resource types carried by the discovery protocol

/// Cluster-wide scalar settings (`total_hosts`, `default_shard_size`)
pub const GLOBAL_SETTING_TYPE: &str = "shard.v1.GlobalSetting";

/// Per-tenant shard size overrides (`customer.<tenant>`)
pub const TENANT_OVERRIDE_TYPE: &str = "shard.v1.TenantOverride";

/// Every snapshot carries exactly these types, in this order.
pub const REQUIRED_RESOURCE_TYPES: [&str; 2] = [GLOBAL_SETTING_TYPE, TENANT_OVERRIDE_TYPE];

// -
// Resource names

pub const TOTAL_HOSTS_NAME: &str = "total_hosts";
pub const DEFAULT_SHARD_SIZE_NAME: &str = "default_shard_size";
pub const TENANT_NAME_PREFIX: &str = "customer.";

/// Upper bound on resource name length accepted by the store
pub const MAX_RESOURCE_NAME_LEN: usize = 253;

/// Outer snapshot version prefix
pub(crate) const SNAPSHOT_VERSION_PREFIX: &str = "snapshot-";

/// Node id of the single-node deployment shipped in `config/control_plane.toml`
pub const DEFAULT_NODE_ID: &str = "envoy-shuffle-shard";
