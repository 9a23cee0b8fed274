use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::health_client::HealthClient;
use tonic_health::pb::HealthCheckRequest;

use crate::common::TestControlPlane;

#[tokio::test]
async fn both_services_report_serving() {
    let server = TestControlPlane::start().await;
    let channel = tonic::transport::Endpoint::new(server.endpoint())
        .unwrap()
        .connect()
        .await
        .unwrap();
    let mut health = HealthClient::new(channel);

    for service in [
        "shard.discovery.v1.AggregatedDiscoveryService",
        "shard.config.v1.RuntimeConfigService",
    ] {
        let status = health
            .check(HealthCheckRequest {
                service: service.to_string(),
            })
            .await
            .unwrap()
            .into_inner()
            .status;
        assert_eq!(status, ServingStatus::Serving as i32, "{service}");
    }

    drop(health);
    server.stop().await;
}
