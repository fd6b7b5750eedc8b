//! Worker hot reconfigure vs restart-on-connection-change.

use crate::prelude::*;
use ne_core::AppState;
use serde_json::json;

#[tokio::test]
async fn block_edit_reconfigures_in_the_same_process() {
    let rig = WorkerRig::build("mtc-01");
    rig.start().await;

    let configure_before = rig.app.ctx().stats().stage(AppState::Configure).done;
    assert!(configure_before);

    // Edit only the block schedule: a hot-reload change
    rig.db
        .execute_batch("UPDATE blocks SET schedule = 0.5, updated_at = 200 WHERE conn = 'mtc-01';")
        .unwrap();
    rig.bus
        .publish("system/mtc-01/config_reload", json!(1))
        .await
        .unwrap();
    rig.bus.commit().await.unwrap();

    // The FSM visits CONFIGURE once and returns to EXECUTE
    wait_until(|| rig.app.hooks().block_configs().first().map(|b| b.schedule) == Some(0.5)).await;
    wait_until(|| rig.app.ctx().stats().stage(AppState::Configure).done).await;
    wait_until(|| rig.app.ctx().current_state() == Some(AppState::Execute)).await;

    // Same OS process: the engine never stopped
    assert!(rig.app.is_running());
    assert_eq!(rig.app.ctx().exit_code(), None);

    rig.app.stop().await;
}

#[tokio::test]
async fn port_change_exits_zero_for_the_service_manager() {
    let rig = WorkerRig::build("mtc-01");
    rig.start().await;

    rig.db
        .execute_batch("UPDATE conns SET port = 503, updated_at = 200 WHERE conn = 'mtc-01';")
        .unwrap();
    rig.bus
        .publish("system/mtc-01/config_reload", json!(1))
        .await
        .unwrap();
    rig.bus.commit().await.unwrap();

    // The worker itself requested exit(0); systemd's Restart=always
    // takes it from here.
    wait_until(|| !rig.app.is_running()).await;
    assert_eq!(rig.app.ctx().exit_code(), Some(0));
}

#[tokio::test]
async fn reconfigure_signal_is_single_shot() {
    let rig = WorkerRig::build("mtc-01");
    rig.start().await;

    rig.app.ctx().request_reconfigure();
    wait_until(|| !rig.app.ctx().reconfigure_pending()).await;
    wait_until(|| rig.app.ctx().current_state() == Some(AppState::Execute)).await;

    // Consumed exactly once; the engine is back in EXECUTE with the
    // signal clear.
    assert!(!rig.app.ctx().reconfigure_pending());
    assert!(rig.app.is_running());

    rig.app.stop().await;
}
