// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::config::SUPERVISOR_APP_ID;
use ne_adapters::{FakeServiceManager, MemoryTagBus, ServiceCall, TagBus};
use ne_core::FakeClock;
use ne_engine::{App, AppArgs, AppConfig, BusFactory};
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;

struct Rig {
    app: App<SupervisorApp<FakeServiceManager, FakeClock>>,
    manager: FakeServiceManager,
    clock: FakeClock,
    bus: MemoryTagBus,
    db: ne_storage::EdgeDB,
    unit_dir: PathBuf,
    _tmp: tempfile::TempDir,
}

impl Rig {
    fn hooks(&self) -> &Arc<SupervisorApp<FakeServiceManager, FakeClock>> {
        self.app.hooks()
    }

    fn unit_path(&self, name: &str) -> PathBuf {
        self.unit_dir.join(format!("{name}.service"))
    }

    fn record(&self, app_id: &str) -> Option<ServiceRecord> {
        self.hooks()
            .service_snapshot()
            .into_iter()
            .find(|r| r.app_id == app_id)
    }
}

fn fast_engine_config() -> AppConfig {
    AppConfig {
        retry_delay: Duration::from_millis(5),
        execute_interval: Duration::from_millis(5),
        manage_interval: Duration::from_millis(10),
        exception_limit: 1,
        stop_timeout: Duration::from_millis(500),
    }
}

fn build_rig() -> Rig {
    let tmp = tempfile::tempdir().unwrap();
    let unit_dir = tmp.path().join("units");
    std::fs::create_dir_all(&unit_dir).unwrap();

    let db_path = tmp.path().join("edge.db");
    let db = ne_storage::EdgeDB::open(&db_path).unwrap();
    db.execute_batch(
        "INSERT INTO conns (conn, protocol, host, port, updated_at)
         VALUES ('mtc-01', 'mtc', '10.0.0.1', 502, 100);",
    )
    .unwrap();

    let cfg = SupervisorConfig {
        db_path,
        license_dir: tmp.path().join("license").join("tokens"),
        pubkey_file: tmp.path().join("license").join("cloud_pub.pem"),
        unit_dir: unit_dir.clone(),
        interpreter: PathBuf::from("/usr/bin/python3"),
        entitlement_check_interval: Duration::from_secs(60),
    };

    let manager = FakeServiceManager::new();
    let clock = FakeClock::new();
    let hooks = SupervisorApp::new(cfg, manager.clone(), clock.clone());

    let bus = MemoryTagBus::new();
    let factory_bus = bus.clone();
    let factory: BusFactory = Arc::new(move |_, _| Arc::new(factory_bus.clone()) as Arc<dyn TagBus>);

    let app = App::new(
        SUPERVISOR_APP_ID,
        AppArgs::default(),
        fast_engine_config(),
        hooks,
        factory,
    );

    Rig {
        app,
        manager,
        clock,
        bus,
        db,
        unit_dir,
        _tmp: tmp,
    }
}

async fn wait_until(mut probe: impl FnMut() -> bool) {
    for _ in 0..400 {
        if probe() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

async fn start_and_settle(rig: &Rig) {
    rig.app.start();
    wait_until(|| rig.record("mtc-01").map(|r| r.active).unwrap_or(false)).await;
}

#[tokio::test]
async fn initial_sync_materializes_declared_connections() {
    let rig = build_rig();
    start_and_settle(&rig).await;

    // Unit file on disk with the fixed substitutions
    let unit = std::fs::read_to_string(rig.unit_path("ne-interface-mtc-01")).unwrap();
    assert!(unit.contains("--conn-id=mtc-01"));
    assert!(unit.contains("Restart=always"));
    assert!(unit.contains("-m nodi_edge_intf.modbus_tcp_client"));

    // One reload after all units were written, then one start
    assert_eq!(rig.manager.daemon_reload_count(), 1);
    assert_eq!(rig.manager.start_count("ne-interface-mtc-01"), 1);

    // Registry row persisted, service map mirrors the registry
    let row = rig.db.select_app("mtc-01").unwrap().unwrap();
    assert!(row.enabled);
    assert_eq!(row.conn_id.as_deref(), Some("mtc-01"));
    let registry_len = rig.db.select_app_registry(None).unwrap().len();
    assert_eq!(rig.hooks().service_snapshot().len(), registry_len);

    rig.app.stop().await;
}

#[tokio::test]
async fn addons_get_disabled_registry_rows() {
    let rig = build_rig();
    start_and_settle(&rig).await;

    for addon in ["vplc", "snf"] {
        let row = rig.db.select_app(addon).unwrap().unwrap();
        assert!(!row.enabled, "{addon} must start disabled");
        assert_eq!(row.category, ne_core::AppCategory::Addon);
    }
    // Disabled addons are tracked but never started
    assert_eq!(rig.manager.start_count("ne-addon-vplc"), 0);

    rig.app.stop().await;
}

#[tokio::test]
async fn unknown_protocol_rows_are_skipped() {
    let rig = build_rig();
    rig.db
        .execute_batch(
            "INSERT INTO conns (conn, protocol, host, port, updated_at)
             VALUES ('odd-01', 'zzz', 'h', 1, 100);",
        )
        .unwrap();

    start_and_settle(&rig).await;

    assert!(rig.record("odd-01").is_none());
    assert!(!rig.unit_path("ne-interface-odd-01").exists());

    rig.app.stop().await;
}

#[tokio::test]
async fn conn_added_event_starts_a_new_worker() {
    let rig = build_rig();
    start_and_settle(&rig).await;
    let before = rig.hooks().service_snapshot().len();

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
    assert_eq!(rig.hooks().service_snapshot().len(), before + 1);
    assert!(rig.db.select_app("mtc-02").unwrap().is_some());
    assert_eq!(rig.manager.start_count("ne-interface-mtc-02"), 1);

    rig.app.stop().await;
}

#[tokio::test]
async fn conn_added_without_a_row_is_dropped() {
    let rig = build_rig();
    start_and_settle(&rig).await;
    let before = rig.hooks().service_snapshot().len();

    rig.bus
        .publish("system/supervisor/conn_added", json!("ghost-01"))
        .await
        .unwrap();
    rig.bus.commit().await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert_eq!(rig.hooks().service_snapshot().len(), before);
    assert!(rig.record("ghost-01").is_none());

    rig.app.stop().await;
}

#[tokio::test]
async fn conn_removed_event_tears_the_worker_down() {
    let rig = build_rig();
    rig.db
        .execute_batch(
            "INSERT INTO conns (conn, protocol, host, port, updated_at)
             VALUES ('mtc-02', 'mtc', '10.0.0.2', 502, 200);",
        )
        .unwrap();
    start_and_settle(&rig).await;
    wait_until(|| rig.record("mtc-02").map(|r| r.active).unwrap_or(false)).await;

    rig.bus
        .publish("system/supervisor/conn_removed", json!("mtc-02"))
        .await
        .unwrap();
    rig.bus.commit().await.unwrap();

    wait_until(|| rig.record("mtc-02").is_none()).await;
    assert!(!rig.unit_path("ne-interface-mtc-02").exists());
    assert!(rig.db.select_app("mtc-02").unwrap().is_none());
    assert!(rig
        .manager
        .calls()
        .contains(&ServiceCall::Stop("ne-interface-mtc-02".to_string())));
    // The survivor is untouched
    assert!(rig.record("mtc-01").unwrap().active);

    rig.app.stop().await;
}

#[tokio::test]
async fn healthcheck_restarts_then_gives_up_at_the_limit() {
    let rig = build_rig();
    rig.manager.set_zombie("ne-interface-mtc-01");
    start_and_settle(&rig).await;
    assert_eq!(rig.manager.start_count("ne-interface-mtc-01"), 1);

    use ne_engine::AppHooks;
    // Five throttled restarts
    for attempt in 1..=5u32 {
        rig.hooks().on_manage(rig.app.ctx()).await.unwrap();
        assert_eq!(
            rig.manager.start_count("ne-interface-mtc-01") as u32,
            1 + attempt
        );
        assert_eq!(rig.record("mtc-01").unwrap().restart_count, attempt);
    }

    // Sixth probe exceeds the limit: marked inactive, no more starts
    rig.hooks().on_manage(rig.app.ctx()).await.unwrap();
    assert!(!rig.record("mtc-01").unwrap().active);
    assert_eq!(rig.manager.start_count("ne-interface-mtc-01"), 6);

    // Dead and given up: further manage passes leave it alone
    rig.hooks().on_manage(rig.app.ctx()).await.unwrap();
    assert_eq!(rig.manager.start_count("ne-interface-mtc-01"), 6);

    rig.app.stop().await;
}

#[tokio::test]
async fn quiet_window_resets_the_restart_counter() {
    let rig = build_rig();
    rig.manager.set_zombie("ne-interface-mtc-01");
    start_and_settle(&rig).await;

    use ne_engine::AppHooks;
    rig.hooks().on_manage(rig.app.ctx()).await.unwrap();
    rig.hooks().on_manage(rig.app.ctx()).await.unwrap();
    assert_eq!(rig.record("mtc-01").unwrap().restart_count, 2);

    // More than the 300 s window passes without a restart
    rig.clock.advance(Duration::from_secs(301));
    rig.hooks().on_manage(rig.app.ctx()).await.unwrap();

    // Counter was reset before this attempt was counted
    assert_eq!(rig.record("mtc-01").unwrap().restart_count, 1);
    assert!(rig.record("mtc-01").unwrap().active);

    rig.app.stop().await;
}

#[tokio::test]
async fn failed_restart_marks_the_service_inactive() {
    let rig = build_rig();
    start_and_settle(&rig).await;

    rig.manager.set_active("ne-interface-mtc-01", false);
    rig.manager.fail_start("ne-interface-mtc-01");

    use ne_engine::AppHooks;
    rig.hooks().on_manage(rig.app.ctx()).await.unwrap();
    assert!(!rig.record("mtc-01").unwrap().active);

    rig.app.stop().await;
}

#[tokio::test]
async fn restart_command_stops_then_starts() {
    let rig = build_rig();
    start_and_settle(&rig).await;

    rig.bus
        .publish("supervisor/_cmd/restart", json!({"app_id": "mtc-01"}))
        .await
        .unwrap();
    rig.bus.commit().await.unwrap();

    wait_until(|| {
        let calls = rig.manager.calls();
        calls.contains(&ServiceCall::Stop("ne-interface-mtc-01".to_string()))
            && rig.manager.start_count("ne-interface-mtc-01") == 2
    })
    .await;
    assert!(rig.record("mtc-01").unwrap().active);

    rig.app.stop().await;
}

#[tokio::test]
async fn restart_command_accepts_string_payloads() {
    let rig = build_rig();
    start_and_settle(&rig).await;

    rig.bus
        .publish(
            "supervisor/_cmd/restart",
            json!("{\"app_id\": \"mtc-01\"}"),
        )
        .await
        .unwrap();
    rig.bus.commit().await.unwrap();

    wait_until(|| rig.manager.start_count("ne-interface-mtc-01") == 2).await;

    rig.app.stop().await;
}

#[tokio::test]
async fn list_command_publishes_the_service_map() {
    let rig = build_rig();
    start_and_settle(&rig).await;

    rig.bus
        .publish("supervisor/_cmd/list", json!({}))
        .await
        .unwrap();
    rig.bus.commit().await.unwrap();

    let list = wait_for_key(&rig.bus, "supervisor/_event/service_list").await;
    let entry = &list["mtc-01"];
    assert_eq!(entry["category"], "interface");
    assert_eq!(entry["active"], true);

    rig.app.stop().await;
}

#[tokio::test]
async fn activation_without_a_key_is_a_structured_error() {
    let rig = build_rig();
    start_and_settle(&rig).await;

    let result = rig
        .hooks()
        .activate_addon("vplc", "some-token", rig.app.ctx())
        .await;
    assert_eq!(result["ok"], false);
    assert_eq!(result["error"], "license manager unavailable");

    rig.app.stop().await;
}

#[tokio::test]
async fn manage_status_lands_on_the_bus() {
    let rig = build_rig();
    start_and_settle(&rig).await;

    use ne_engine::AppHooks;
    rig.hooks().on_manage(rig.app.ctx()).await.unwrap();

    let count = wait_for_key(&rig.bus, "supervisor/_meta/service_count").await;
    assert_eq!(
        count.as_u64().unwrap() as usize,
        rig.hooks().service_snapshot().len()
    );
    assert!(rig.bus.get("supervisor/_meta/state").await.is_some());
    assert!(rig.bus.get("supervisor/_meta/services").await.is_some());

    rig.app.stop().await;
}

#[tokio::test]
async fn disconnect_stops_everything() {
    let rig = build_rig();
    start_and_settle(&rig).await;

    use ne_engine::AppHooks;
    rig.hooks().on_disconnect(rig.app.ctx()).await.unwrap();

    assert!(!rig.record("mtc-01").unwrap().active);
    assert!(rig
        .manager
        .calls()
        .contains(&ServiceCall::Stop("ne-interface-mtc-01".to_string())));

    rig.app.stop().await;
}

async fn wait_for_key(bus: &MemoryTagBus, key: &str) -> serde_json::Value {
    for _ in 0..400 {
        if let Some(value) = bus.get(key).await {
            return value;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("key {key} never appeared on the bus");
}
