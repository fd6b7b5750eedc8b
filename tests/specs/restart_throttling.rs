//! Healthcheck restart throttling on top of the service manager.

use crate::prelude::*;
use ne_engine::AppHooks;
use std::time::Duration;

#[tokio::test]
async fn at_most_five_restarts_then_give_up() {
    let rig = SupervisorRig::build();
    // Starts succeed but the unit never reports active
    rig.manager.set_zombie("ne-interface-mtc-01");
    rig.start().await;
    assert_eq!(rig.manager.start_count("ne-interface-mtc-01"), 1);

    // Drive the manage plane: five throttled restarts within the window
    for _ in 0..5 {
        rig.app.hooks().on_manage(rig.app.ctx()).await.unwrap();
    }
    assert_eq!(rig.manager.start_count("ne-interface-mtc-01"), 6);
    assert_eq!(rig.record("mtc-01").unwrap().restart_count, 5);

    // The next probe exceeds the limit: marked dead, left alone
    rig.app.hooks().on_manage(rig.app.ctx()).await.unwrap();
    assert!(!rig.record("mtc-01").unwrap().active);

    for _ in 0..3 {
        rig.app.hooks().on_manage(rig.app.ctx()).await.unwrap();
    }
    assert_eq!(rig.manager.start_count("ne-interface-mtc-01"), 6);

    rig.app.stop().await;
}

#[tokio::test]
async fn quiet_window_clears_the_counter() {
    let rig = SupervisorRig::build();
    rig.manager.set_zombie("ne-interface-mtc-01");
    rig.start().await;

    for _ in 0..3 {
        rig.app.hooks().on_manage(rig.app.ctx()).await.unwrap();
    }
    assert_eq!(rig.record("mtc-01").unwrap().restart_count, 3);

    // 300 s of monotonic quiet forgives the earlier restarts
    rig.clock.advance(Duration::from_secs(301));
    rig.app.hooks().on_manage(rig.app.ctx()).await.unwrap();
    assert_eq!(rig.record("mtc-01").unwrap().restart_count, 1);
    assert!(rig.record("mtc-01").unwrap().active);

    rig.app.stop().await;
}
