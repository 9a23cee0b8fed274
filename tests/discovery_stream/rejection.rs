use shard_control_plane::constants::GLOBAL_SETTING_TYPE;
use shard_control_plane::proto::runtime_config::FetchSnapshotRequest;
use shard_control_plane::DiscoveryConfig;
use tonic::Code;

use crate::common::publish;
use crate::common::publish_request;
use crate::common::values;
use crate::common::TestControlPlane;

#[tokio::test]
async fn rejected_revision_is_not_retried_and_next_publish_is_offered() {
    let server = TestControlPlane::start().await;
    let mut operator = server.operator().await;

    let mut node = server.connect_node("edge-1").await;
    node.subscribe(GLOBAL_SETTING_TYPE, &[]).await;
    publish(&mut operator, publish_request("edge-1", 8, 2, &[])).await;
    let accepted = node.next_push().await;
    node.ack(&accepted).await;

    publish(&mut operator, publish_request("edge-1", 0, 2, &[])).await;
    let refused = node.next_push().await;
    assert_eq!(refused.version_info, "2");
    node.nack(&refused, "total_hosts must be positive").await;
    node.assert_silent().await;

    // the store keeps what the operator asked for, rejected or not
    let current = operator
        .fetch_snapshot(FetchSnapshotRequest {
            node_id: "edge-1".to_string(),
        })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(current.snapshot_version, "snapshot-2");

    publish(&mut operator, publish_request("edge-1", 12, 2, &[])).await;
    let fixed = node.next_push().await;
    assert_eq!(fixed.version_info, "3");
    assert_eq!(values(&fixed)["total_hosts"], 12);

    drop(node);
    drop(operator);
    server.stop().await;
}

#[tokio::test]
async fn stream_without_node_identity_is_rejected() {
    let server = TestControlPlane::start().await;

    let mut node = server.connect_node("").await;
    node.subscribe(GLOBAL_SETTING_TYPE, &[]).await;
    let status = node.next().await.unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);

    drop(node);
    server.stop().await;
}

#[tokio::test]
async fn stream_without_node_identity_binds_to_configured_default() {
    let server = TestControlPlane::start_with(DiscoveryConfig {
        default_node_id: Some("envoy-shuffle-shard".to_string()),
        ..Default::default()
    })
    .await;
    let mut operator = server.operator().await;
    publish(&mut operator, publish_request("envoy-shuffle-shard", 8, 2, &[])).await;

    let mut node = server.connect_node("").await;
    node.subscribe(GLOBAL_SETTING_TYPE, &[]).await;
    let push = node.next_push().await;
    assert_eq!(push.snapshot_version, "snapshot-1");

    drop(node);
    drop(operator);
    server.stop().await;
}
