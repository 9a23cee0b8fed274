use shard_control_plane::constants::GLOBAL_SETTING_TYPE;
use shard_control_plane::constants::TENANT_OVERRIDE_TYPE;

use crate::common::publish;
use crate::common::publish_request;
use crate::common::values;
use crate::common::TestControlPlane;

#[tokio::test]
async fn reconnecting_node_receives_current_state_in_full() {
    let server = TestControlPlane::start().await;
    let mut operator = server.operator().await;
    publish(&mut operator, publish_request("edge-1", 8, 2, &[("A", 3)])).await;

    let mut node = server.connect_node("edge-1").await;
    node.subscribe(GLOBAL_SETTING_TYPE, &[]).await;
    let before = node.next_push().await;
    node.ack(&before).await;
    drop(node);
    server.wait_for_streams(0).await;
    assert_eq!(server.plane.cache().subscriber_count("edge-1"), 0);

    // published while the node was away
    publish(&mut operator, publish_request("edge-1", 24, 3, &[("A", 3)])).await;

    let mut node = server.connect_node("edge-1").await;
    node.subscribe(GLOBAL_SETTING_TYPE, &[]).await;
    node.subscribe(TENANT_OVERRIDE_TYPE, &[]).await;

    let global = node.next_push().await;
    assert_eq!(global.type_url, GLOBAL_SETTING_TYPE);
    assert_eq!(global.snapshot_version, "snapshot-2");
    assert_eq!(values(&global)["total_hosts"], 24);
    assert_eq!(values(&global)["default_shard_size"], 3);

    // a fresh session has no acknowledgement history
    let tenants = node.next_push().await;
    assert_eq!(tenants.type_url, TENANT_OVERRIDE_TYPE);
    assert_eq!(tenants.version_info, "1");
    assert_eq!(values(&tenants)["customer.A"], 3);

    drop(node);
    drop(operator);
    server.stop().await;
}
