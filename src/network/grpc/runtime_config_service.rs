use std::sync::Arc;

use autometrics::autometrics;
use tonic::Request;
use tonic::Response;
use tonic::Status;
use tracing::debug;

use crate::control_plane::runtime_values;
use crate::proto::runtime_config::runtime_config_service_server::RuntimeConfigService;
use crate::proto::runtime_config::FetchSnapshotRequest;
use crate::proto::runtime_config::FetchSnapshotResponse;
use crate::proto::runtime_config::PublishConfigRequest;
use crate::proto::runtime_config::PublishConfigResponse;
use crate::proto::runtime_config::SnapshotEntry;
use crate::proto::runtime_config::TypeVersion;
use crate::ConfigPublisher;
use crate::ShardConfig;
use crate::API_SLO;

/// Operator API over a [`ConfigPublisher`].
pub struct RuntimeConfigHandler<P> {
    publisher: Arc<P>,
}

impl<P> RuntimeConfigHandler<P> {
    pub fn new(publisher: Arc<P>) -> Self {
        Self { publisher }
    }
}

impl<P> std::fmt::Debug for RuntimeConfigHandler<P> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("RuntimeConfigHandler").finish_non_exhaustive()
    }
}

#[tonic::async_trait]
impl<P> RuntimeConfigService for RuntimeConfigHandler<P>
where
    P: ConfigPublisher,
{
    /// Replaces a node's shard configuration. Returns once the new snapshot
    /// is installed and every bound stream has been notified.
    #[cfg_attr(not(doc), autometrics(objective = API_SLO))]
    #[tracing::instrument(skip(self))]
    async fn publish_config(
        &self,
        request: Request<PublishConfigRequest>,
    ) -> std::result::Result<Response<PublishConfigResponse>, Status> {
        let req = request.into_inner();
        let config = ShardConfig {
            total_hosts: req.total_hosts,
            default_shard_size: req.default_shard_size,
            tenants: req.tenant_shard_sizes.into_iter().collect(),
        };

        let receipt = self.publisher.publish_config(&req.node_id, &config)?;
        Ok(Response::new(PublishConfigResponse {
            snapshot_version: receipt.snapshot_version,
            sequence: receipt.sequence,
        }))
    }

    #[cfg_attr(not(doc), autometrics(objective = API_SLO))]
    #[tracing::instrument(skip(self))]
    async fn fetch_snapshot(
        &self,
        request: Request<FetchSnapshotRequest>,
    ) -> std::result::Result<Response<FetchSnapshotResponse>, Status> {
        let node_id = request.into_inner().node_id;
        if node_id.is_empty() {
            return Err(Status::invalid_argument("node_id must not be empty"));
        }

        let snapshot = self.publisher.current_snapshot(&node_id);
        let values = runtime_values(&snapshot);
        debug!(node_id, version = snapshot.version(), "Snapshot fetched");

        let type_versions = snapshot
            .type_urls()
            .map(|type_url| TypeVersion {
                type_url: type_url.to_string(),
                version: snapshot.type_version(type_url).unwrap_or_default().to_string(),
            })
            .collect();
        let entries = snapshot
            .resources()
            .iter()
            .map(|(key, resource)| SnapshotEntry {
                type_url: key.type_url().to_string(),
                name: key.name().to_string(),
                version: resource.version(),
                value: values.get(key.name()).copied().unwrap_or_default(),
            })
            .collect();

        Ok(Response::new(FetchSnapshotResponse {
            snapshot_version: snapshot.version().to_string(),
            sequence: snapshot.sequence(),
            type_versions,
            entries,
        }))
    }
}
