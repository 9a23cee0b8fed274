use std::collections::BTreeMap;

use shard_control_plane::constants::GLOBAL_SETTING_TYPE;
use shard_control_plane::constants::TENANT_OVERRIDE_TYPE;

use crate::common::publish;
use crate::common::publish_request;
use crate::common::values;
use crate::common::TestControlPlane;

fn expected(pairs: &[(&str, i64)]) -> BTreeMap<String, i64> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

#[tokio::test]
async fn node_converges_on_every_operator_publish() {
    let server = TestControlPlane::start().await;
    let mut operator = server.operator().await;

    let mut node = server.connect_node("envoy-shuffle-shard").await;
    node.subscribe(GLOBAL_SETTING_TYPE, &[]).await;
    node.subscribe(TENANT_OVERRIDE_TYPE, &[]).await;
    // nothing configured yet
    node.assert_silent().await;

    let receipt = publish(
        &mut operator,
        publish_request(
            "envoy-shuffle-shard",
            8,
            2,
            &[("customer-A", 2), ("customer-B", 2), ("customer-C", 2)],
        ),
    )
    .await;
    assert_eq!(receipt.snapshot_version, "snapshot-1");

    let mut pushes = vec![node.next_push().await, node.next_push().await];
    pushes.sort_by(|a, b| a.type_url.cmp(&b.type_url));
    let (global, tenants) = (&pushes[0], &pushes[1]);

    assert_eq!(global.type_url, GLOBAL_SETTING_TYPE);
    assert_eq!(global.snapshot_version, "snapshot-1");
    assert_eq!(values(global), expected(&[("default_shard_size", 2), ("total_hosts", 8)]));
    assert_eq!(tenants.snapshot_version, "snapshot-1");
    assert_eq!(
        values(tenants),
        expected(&[
            ("customer.customer-A", 2),
            ("customer.customer-B", 2),
            ("customer.customer-C", 2),
        ])
    );

    node.ack(global).await;
    node.ack(tenants).await;
    node.assert_silent().await;

    // only the tenant overrides move
    publish(
        &mut operator,
        publish_request("envoy-shuffle-shard", 8, 2, &[("customer-A", 4), ("customer-B", 2)]),
    )
    .await;
    let update = node.next_push().await;
    assert_eq!(update.type_url, TENANT_OVERRIDE_TYPE);
    assert_eq!(update.version_info, "2");
    assert_eq!(update.snapshot_version, "snapshot-2");
    assert_eq!(
        values(&update),
        expected(&[("customer.customer-A", 4), ("customer.customer-B", 2)])
    );
    node.assert_silent().await;

    drop(node);
    drop(operator);
    server.stop().await;
}

#[tokio::test]
async fn slow_node_receives_only_the_latest_revision() {
    let server = TestControlPlane::start().await;
    let mut operator = server.operator().await;

    let mut node = server.connect_node("edge-1").await;
    node.subscribe(GLOBAL_SETTING_TYPE, &[]).await;
    publish(&mut operator, publish_request("edge-1", 8, 2, &[])).await;
    let first = node.next_push().await;
    assert_eq!(first.version_info, "1");

    // unacknowledged: later revisions wait
    publish(&mut operator, publish_request("edge-1", 9, 2, &[])).await;
    publish(&mut operator, publish_request("edge-1", 10, 2, &[])).await;
    node.assert_silent().await;

    node.ack(&first).await;
    let latest = node.next_push().await;
    assert_eq!(latest.version_info, "3");
    assert_eq!(latest.snapshot_version, "snapshot-3");
    assert_eq!(values(&latest)["total_hosts"], 10);

    drop(node);
    drop(operator);
    server.stop().await;
}

#[tokio::test]
async fn nodes_sharing_an_id_converge_and_other_ids_stay_untouched() {
    let server = TestControlPlane::start().await;
    let mut operator = server.operator().await;

    let mut first = server.connect_node("edge-1").await;
    let mut second = server.connect_node("edge-1").await;
    let mut other = server.connect_node("edge-2").await;
    for node in [&mut first, &mut second, &mut other] {
        node.subscribe(GLOBAL_SETTING_TYPE, &[]).await;
    }
    server.wait_for_streams(3).await;

    publish(&mut operator, publish_request("edge-1", 16, 4, &[])).await;

    let a = first.next_push().await;
    let b = second.next_push().await;
    assert_eq!(a.snapshot_version, b.snapshot_version);
    assert_eq!(values(&a), values(&b));
    assert_ne!(a.nonce, "");
    other.assert_silent().await;

    drop((first, second, other));
    drop(operator);
    server.stop().await;
}

#[tokio::test]
async fn name_filter_limits_the_push() {
    let server = TestControlPlane::start().await;
    let mut operator = server.operator().await;
    publish(
        &mut operator,
        publish_request("edge-1", 8, 2, &[("A", 3), ("B", 5)]),
    )
    .await;

    let mut node = server.connect_node("edge-1").await;
    node.subscribe(TENANT_OVERRIDE_TYPE, &["customer.B"]).await;
    let push = node.next_push().await;
    assert_eq!(values(&push), expected(&[("customer.B", 5)]));

    drop(node);
    drop(operator);
    server.stop().await;
}
