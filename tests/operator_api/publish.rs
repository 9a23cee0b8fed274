use shard_control_plane::constants::GLOBAL_SETTING_TYPE;
use shard_control_plane::constants::TENANT_OVERRIDE_TYPE;
use shard_control_plane::proto::runtime_config::FetchSnapshotRequest;
use tonic::Code;

use crate::common::publish;
use crate::common::publish_request;
use crate::common::TestControlPlane;

#[tokio::test]
async fn publish_then_fetch_reports_versions_and_values() {
    let server = TestControlPlane::start().await;
    let mut operator = server.operator().await;

    let receipt = publish(&mut operator, publish_request("edge-1", 8, 2, &[("A", 2), ("B", 3)])).await;
    assert_eq!(receipt.snapshot_version, "snapshot-1");
    assert_eq!(receipt.sequence, 1);

    let receipt = publish(&mut operator, publish_request("edge-1", 8, 2, &[("A", 2)])).await;
    assert_eq!(receipt.sequence, 2);

    let snapshot = operator
        .fetch_snapshot(FetchSnapshotRequest {
            node_id: "edge-1".to_string(),
        })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(snapshot.snapshot_version, "snapshot-2");

    let version_of = |type_url: &str| {
        snapshot
            .type_versions
            .iter()
            .find(|tv| tv.type_url == type_url)
            .map(|tv| tv.version.clone())
    };
    assert_eq!(version_of(GLOBAL_SETTING_TYPE).as_deref(), Some("1"));
    assert_eq!(version_of(TENANT_OVERRIDE_TYPE).as_deref(), Some("2"));

    let tenants: Vec<(&str, i64)> = snapshot
        .entries
        .iter()
        .filter(|e| e.type_url == TENANT_OVERRIDE_TYPE)
        .map(|e| (e.name.as_str(), e.value))
        .collect();
    assert_eq!(tenants, vec![("customer.A", 2)]);

    drop(operator);
    server.stop().await;
}

#[tokio::test]
async fn invalid_publish_is_rejected_without_side_effects() {
    let server = TestControlPlane::start().await;
    let mut operator = server.operator().await;
    publish(&mut operator, publish_request("edge-1", 8, 2, &[])).await;

    let negative = operator
        .publish_config(publish_request("edge-1", -1, 2, &[]))
        .await
        .unwrap_err();
    assert_eq!(negative.code(), Code::InvalidArgument);

    let bad_tenant = operator
        .publish_config(publish_request("edge-1", 8, 2, &[("bad tenant/name", 1)]))
        .await
        .unwrap_err();
    assert_eq!(bad_tenant.code(), Code::InvalidArgument);

    let no_node = operator
        .publish_config(publish_request("", 8, 2, &[]))
        .await
        .unwrap_err();
    assert_eq!(no_node.code(), Code::InvalidArgument);

    let snapshot = operator
        .fetch_snapshot(FetchSnapshotRequest {
            node_id: "edge-1".to_string(),
        })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(snapshot.sequence, 1);

    drop(operator);
    server.stop().await;
}
