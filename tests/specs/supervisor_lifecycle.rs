//! Declarative connections become running service units.

use crate::prelude::*;
use ne_adapters::ServiceCall;
use serde_json::json;

#[tokio::test]
async fn happy_path_materializes_the_seeded_connection() {
    let rig = SupervisorRig::build();
    rig.start().await;

    // Unit file written with the interface template
    let unit = std::fs::read_to_string(rig.unit_path("ne-interface-mtc-01")).unwrap();
    assert!(unit.contains("--conn-id=mtc-01"));
    assert!(unit.contains("Restart=always"));
    assert!(unit.contains("Description=Nodi Edge Interface: mtc-01"));

    // One daemon-reload, one start, service map entry active
    assert_eq!(rig.manager.daemon_reload_count(), 1);
    assert_eq!(rig.manager.start_count("ne-interface-mtc-01"), 1);
    let record = rig.record("mtc-01").unwrap();
    assert!(record.active);
    assert!(record.enabled);

    rig.app.stop().await;
}

#[tokio::test]
async fn hot_add_starts_a_second_worker() {
    let rig = SupervisorRig::build();
    rig.start().await;
    let interfaces_before = rig
        .app
        .hooks()
        .service_snapshot()
        .iter()
        .filter(|r| r.conn_id.is_some())
        .count();
    assert_eq!(interfaces_before, 1);

    rig.db
        .execute_batch(
            "INSERT INTO conns (conn, protocol, host, port, updated_at)
             VALUES ('mtc-02', 'mtc', '10.0.0.2', 502, 200);",
        )
        .unwrap();
    rig.bus
        .publish("system/supervisor/conn_added", json!("mtc-02"))
        .await
        .unwrap();
    rig.bus.commit().await.unwrap();

    wait_until(|| rig.record("mtc-02").map(|r| r.active).unwrap_or(false)).await;
    assert!(rig.unit_path("ne-interface-mtc-02").exists());
    assert!(rig.manager.daemon_reload_count() >= 2);
    let interfaces_now = rig
        .app
        .hooks()
        .service_snapshot()
        .iter()
        .filter(|r| r.conn_id.is_some())
        .count();
    assert_eq!(interfaces_now, 2);

    rig.app.stop().await;
}

#[tokio::test]
async fn hot_remove_scrubs_every_trace() {
    let rig = SupervisorRig::build();
    rig.start().await;

    rig.db
        .execute_batch(
            "INSERT INTO conns (conn, protocol, host, port, updated_at)
             VALUES ('mtc-02', 'mtc', '10.0.0.2', 502, 200);",
        )
        .unwrap();
    rig.bus
        .publish("system/supervisor/conn_added", json!("mtc-02"))
        .await
        .unwrap();
    rig.bus.commit().await.unwrap();
    wait_until(|| rig.record("mtc-02").map(|r| r.active).unwrap_or(false)).await;

    rig.bus
        .publish("system/supervisor/conn_removed", json!("mtc-02"))
        .await
        .unwrap();
    rig.bus.commit().await.unwrap();
    wait_until(|| rig.record("mtc-02").is_none()).await;

    // No unit file, no registry row, no map entry
    assert!(!rig.unit_path("ne-interface-mtc-02").exists());
    assert!(rig.db.select_app("mtc-02").unwrap().is_none());
    assert!(rig
        .manager
        .calls()
        .contains(&ServiceCall::Stop("ne-interface-mtc-02".to_string())));

    // The first worker keeps running
    assert!(rig.record("mtc-01").unwrap().active);

    rig.app.stop().await;
}
