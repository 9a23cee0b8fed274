use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use prost::Message;
use shard_control_plane::proto::discovery::aggregated_discovery_service_client::AggregatedDiscoveryServiceClient;
use shard_control_plane::proto::discovery::discovery_request::Kind;
use shard_control_plane::proto::discovery::AckRequest;
use shard_control_plane::proto::discovery::DiscoveryRequest;
use shard_control_plane::proto::discovery::DiscoveryResponse;
use shard_control_plane::proto::discovery::Node;
use shard_control_plane::proto::discovery::RuntimeValue;
use shard_control_plane::proto::discovery::SubscribeRequest;
use shard_control_plane::proto::runtime_config::runtime_config_service_client::RuntimeConfigServiceClient;
use shard_control_plane::proto::runtime_config::PublishConfigRequest;
use shard_control_plane::proto::runtime_config::PublishConfigResponse;
use shard_control_plane::serve_on_listener;
use shard_control_plane::ControlPlane;
use shard_control_plane::DiscoveryConfig;
use shard_control_plane::DiscoveryServer;
use shard_control_plane::ServerConfig;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_stream::wrappers::ReceiverStream;
use tonic::codec::CompressionEncoding;
use tonic::transport::Channel;
use tonic::Status;
use tonic::Streaming;

pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(2);
pub const SILENCE: Duration = Duration::from_millis(100);

/// A control plane serving both gRPC services on a loopback port.
pub struct TestControlPlane {
    pub addr: SocketAddr,
    pub plane: Arc<ControlPlane>,
    pub discovery: DiscoveryServer,
    shutdown: watch::Sender<()>,
    handle: JoinHandle<shard_control_plane::Result<()>>,
}

impl TestControlPlane {
    pub async fn start() -> Self {
        Self::start_with(DiscoveryConfig::default()).await
    }

    pub async fn start_with(config: DiscoveryConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
        let addr = listener.local_addr().expect("local addr");
        let (shutdown, shutdown_rx) = watch::channel(());

        let plane = Arc::new(ControlPlane::default());
        let discovery = DiscoveryServer::new(plane.cache().clone(), config, shutdown_rx.clone());

        let server = discovery.clone();
        let publisher = plane.clone();
        let handle = tokio::spawn(async move {
            serve_on_listener(server, publisher, &ServerConfig::default(), listener, shutdown_rx).await
        });

        Self {
            addr,
            plane,
            discovery,
            shutdown,
            handle,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn operator(&self) -> RuntimeConfigServiceClient<Channel> {
        RuntimeConfigServiceClient::connect(self.endpoint())
            .await
            .expect("operator connects")
            .send_compressed(CompressionEncoding::Gzip)
            .accept_compressed(CompressionEncoding::Gzip)
    }

    pub async fn connect_node(
        &self,
        node_id: &str,
    ) -> NodeStream {
        NodeStream::connect(self.endpoint(), node_id).await
    }

    /// Polls until `n` discovery handlers are running.
    pub async fn wait_for_streams(
        &self,
        n: u64,
    ) {
        timeout(RESPONSE_TIMEOUT, async {
            while self.discovery.active_count() != n {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("stream count reached");
    }

    /// Every client must be dropped first; graceful shutdown waits for open
    /// connections.
    pub async fn stop(self) {
        self.shutdown.send(()).expect("server still running");
        let result = timeout(RESPONSE_TIMEOUT, self.handle)
            .await
            .expect("server stops in time")
            .expect("server task not panicked");
        assert!(result.is_ok());
    }
}

/// Client side of one discovery stream, as a data-plane node drives it.
pub struct NodeStream {
    node_id: String,
    first_sent: bool,
    requests: mpsc::Sender<DiscoveryRequest>,
    responses: Streaming<DiscoveryResponse>,
}

impl NodeStream {
    pub async fn connect(
        endpoint: String,
        node_id: &str,
    ) -> Self {
        let mut client = AggregatedDiscoveryServiceClient::connect(endpoint)
            .await
            .expect("node connects")
            .accept_compressed(CompressionEncoding::Gzip);
        let (requests, rx) = mpsc::channel(16);
        let responses = client
            .stream_resources(ReceiverStream::new(rx))
            .await
            .expect("stream opened")
            .into_inner();

        Self {
            node_id: node_id.to_string(),
            first_sent: false,
            requests,
            responses,
        }
    }

    async fn send(
        &mut self,
        kind: Kind,
    ) {
        // only the first request carries the node identity
        let node = (!self.first_sent).then(|| Node {
            id: self.node_id.clone(),
            cluster: String::new(),
        });
        self.first_sent = true;
        self.requests
            .send(DiscoveryRequest { node, kind: Some(kind) })
            .await
            .expect("request stream open");
    }

    pub async fn subscribe(
        &mut self,
        type_url: &str,
        names: &[&str],
    ) {
        self.send(Kind::Subscribe(SubscribeRequest {
            type_url: type_url.to_string(),
            resource_names: names.iter().map(|n| n.to_string()).collect(),
        }))
        .await;
    }

    pub async fn ack(
        &mut self,
        push: &DiscoveryResponse,
    ) {
        self.respond(push, true, "").await;
    }

    pub async fn nack(
        &mut self,
        push: &DiscoveryResponse,
        reason: &str,
    ) {
        self.respond(push, false, reason).await;
    }

    async fn respond(
        &mut self,
        push: &DiscoveryResponse,
        accepted: bool,
        error_detail: &str,
    ) {
        self.send(Kind::Ack(AckRequest {
            type_url: push.type_url.clone(),
            version_info: push.version_info.clone(),
            response_nonce: push.nonce.clone(),
            accepted,
            error_detail: error_detail.to_string(),
        }))
        .await;
    }

    pub async fn next(&mut self) -> Result<DiscoveryResponse, Status> {
        match timeout(RESPONSE_TIMEOUT, self.responses.message())
            .await
            .expect("response in time")
        {
            Ok(Some(response)) => Ok(response),
            Ok(None) => Err(Status::cancelled("stream closed by server")),
            Err(status) => Err(status),
        }
    }

    pub async fn next_push(&mut self) -> DiscoveryResponse {
        self.next().await.expect("push received")
    }

    pub async fn assert_silent(&mut self) {
        assert!(
            timeout(SILENCE, self.responses.message()).await.is_err(),
            "unexpected push"
        );
    }
}

/// Decodes every resource payload of a push into `name -> value`.
pub fn values(push: &DiscoveryResponse) -> BTreeMap<String, i64> {
    push.resources
        .iter()
        .map(|resource| {
            let value = RuntimeValue::decode(resource.payload.clone())
                .expect("payload decodes")
                .value;
            (resource.name.clone(), value)
        })
        .collect()
}

pub fn publish_request(
    node_id: &str,
    total_hosts: i64,
    default_shard_size: i64,
    tenants: &[(&str, i64)],
) -> PublishConfigRequest {
    PublishConfigRequest {
        node_id: node_id.to_string(),
        total_hosts,
        default_shard_size,
        tenant_shard_sizes: tenants.iter().map(|(t, s)| (t.to_string(), *s)).collect(),
    }
}

pub async fn publish(
    operator: &mut RuntimeConfigServiceClient<Channel>,
    request: PublishConfigRequest,
) -> PublishConfigResponse {
    operator
        .publish_config(request)
        .await
        .expect("publish accepted")
        .into_inner()
}
