use serde::Deserialize;
use serde::Serialize;

use crate::store::validate_resource_name;
use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DiscoveryConfig {
    /// Node a stream binds to when its first request carries no `node.id`.
    /// Unset means such streams are rejected.
    #[serde(default)]
    pub default_node_id: Option<String>,

    /// Outbound responses buffered per stream before writes apply
    /// backpressure to the session task
    #[serde(default = "default_response_buffer_size")]
    pub response_buffer_size: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            default_node_id: None,
            response_buffer_size: default_response_buffer_size(),
        }
    }
}

impl DiscoveryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.response_buffer_size == 0 {
            return Err(Error::InvalidConfig("response_buffer_size must be positive".into()));
        }
        if let Some(node_id) = &self.default_node_id {
            validate_resource_name(node_id)
                .map_err(|e| Error::InvalidConfig(format!("default_node_id: {e}")))?;
        }
        Ok(())
    }
}

fn default_response_buffer_size() -> usize {
    64
}
