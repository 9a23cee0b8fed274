use tonic::Request;
use tonic::Response;
use tonic::Status;
use tonic::Streaming;
use tracing::debug;

use crate::proto::discovery::aggregated_discovery_service_server::AggregatedDiscoveryService;
use crate::proto::discovery::DiscoveryRequest;
use crate::DiscoveryServer;
use crate::ResponseStream;

#[tonic::async_trait]
impl AggregatedDiscoveryService for DiscoveryServer {
    type StreamResourcesStream = ResponseStream;

    /// Opens one long-lived stream; the node is identified by its first
    /// request.
    #[tracing::instrument(skip_all)]
    async fn stream_resources(
        &self,
        request: Request<Streaming<DiscoveryRequest>>,
    ) -> std::result::Result<Response<Self::StreamResourcesStream>, Status> {
        debug!(remote_addr = ?request.remote_addr(), "Discovery stream opened");
        Ok(Response::new(self.open_stream(request.into_inner())))
    }
}
