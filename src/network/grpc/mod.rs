//! gRPC listener for the discovery stream and the operator API.
//!
//! Both services share one listener, one keepalive policy and a tonic-health
//! service. Every service accepts and sends gzip.

mod discovery_service;
mod runtime_config_service;
pub use runtime_config_service::*;


//-------------------------------------------------------------------------------
// Start RPC Server
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::codec::CompressionEncoding;
use tonic::transport::server::Router;
use tonic::transport::Server;
use tonic_health::server::health_reporter;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::proto::discovery::aggregated_discovery_service_server::AggregatedDiscoveryServiceServer;
use crate::proto::runtime_config::runtime_config_service_server::RuntimeConfigServiceServer;
use crate::ConfigPublisher;
use crate::DiscoveryServer;
use crate::Result;
use crate::ServerConfig;

/// Serves both services on `config.listen_address` until the shutdown
/// signal fires.
pub async fn start_rpc_server<P>(
    discovery: DiscoveryServer,
    publisher: Arc<P>,
    config: &ServerConfig,
    mut shutdown_signal: watch::Receiver<()>,
) -> Result<()>
where
    P: ConfigPublisher,
{
    let listen_address = config.socket_addr()?;
    let router = build_router(discovery, publisher, config).await;

    info!("RPC server listening on {}", listen_address);
    if let Err(e) = router
        .serve_with_shutdown(
            listen_address,
            shutdown_signal.changed().map(|_s| {
                warn!("Stopping RPC server. {}", listen_address);
            }),
        )
        .await
    {
        error!("error to start rpc server :{:?}.", e);
        return Err(e.into());
    }
    debug!("rpc service finished!");
    Ok(())
}

/// Same as [`start_rpc_server`] on an already bound listener.
pub async fn serve_on_listener<P>(
    discovery: DiscoveryServer,
    publisher: Arc<P>,
    config: &ServerConfig,
    listener: TcpListener,
    mut shutdown_signal: watch::Receiver<()>,
) -> Result<()>
where
    P: ConfigPublisher,
{
    let router = build_router(discovery, publisher, config).await;

    if let Err(e) = router
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
            let _ = shutdown_signal.changed().await;
        })
        .await
    {
        error!("rpc server on listener failed :{:?}.", e);
        return Err(e.into());
    }
    Ok(())
}

async fn build_router<P>(
    discovery: DiscoveryServer,
    publisher: Arc<P>,
    config: &ServerConfig,
) -> Router
where
    P: ConfigPublisher,
{
    let (mut health_reporter, health_service) = health_reporter();
    health_reporter
        .set_serving::<AggregatedDiscoveryServiceServer<DiscoveryServer>>()
        .await;
    health_reporter
        .set_serving::<RuntimeConfigServiceServer<RuntimeConfigHandler<P>>>()
        .await;

    Server::builder()
        .tcp_nodelay(config.tcp_nodelay)
        .tcp_keepalive(Some(Duration::from_secs(config.tcp_keepalive_in_secs)))
        .http2_keepalive_interval(Some(Duration::from_secs(config.http2_keep_alive_interval_in_secs)))
        .http2_keepalive_timeout(Some(Duration::from_secs(config.http2_keep_alive_timeout_in_secs)))
        .max_concurrent_streams(Some(config.max_concurrent_streams))
        .add_service(health_service)
        .add_service(
            AggregatedDiscoveryServiceServer::new(discovery)
                .accept_compressed(CompressionEncoding::Gzip)
                .send_compressed(CompressionEncoding::Gzip),
        )
        .add_service(
            RuntimeConfigServiceServer::new(RuntimeConfigHandler::new(publisher))
                .accept_compressed(CompressionEncoding::Gzip)
                .send_compressed(CompressionEncoding::Gzip),
        )
}
