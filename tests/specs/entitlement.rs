//! Entitlement round-trip: activate, expire, sweep.

use crate::prelude::*;
use serde_json::json;

#[tokio::test]
async fn activation_then_expiry_sweep() {
    let rig = SupervisorRig::build();
    rig.clock.set_epoch(real_epoch());
    rig.start().await;

    // Token must satisfy real-clock signature validation; expiry is
    // enforced against the supervisor's own clock.
    let exp = real_epoch() + 3600;
    let token = mint_token("vplc", exp);

    let result = rig
        .app
        .hooks()
        .activate_addon("vplc", &token, rig.app.ctx())
        .await;
    assert_eq!(result["ok"], true);
    assert_eq!(result["expires_at"], json!(exp));

    // Enabled immediately, unit running, token cached, event published
    let row = rig.db.select_app("vplc").unwrap().unwrap();
    assert!(row.enabled);
    assert_eq!(row.license_expires_at, Some(exp as i64));
    assert!(rig.unit_path("ne-addon-vplc").exists());
    assert!(rig.token_path("vplc").exists());
    assert!(rig.record("vplc").unwrap().active);
    assert_eq!(
        wait_for_key(&rig.bus, "supervisor/_event/addon_activated").await,
        json!("vplc")
    );
    let unit = std::fs::read_to_string(rig.unit_path("ne-addon-vplc")).unwrap();
    assert!(unit.contains("Restart=on-failure"));
    assert!(!unit.contains("--conn-id"));

    // Clock passes the expiry; one sweep deactivates everything
    rig.clock.set_epoch(exp + 1);
    rig.app.hooks().entitlement_sweep(rig.app.ctx()).await;

    let row = rig.db.select_app("vplc").unwrap().unwrap();
    assert!(!row.enabled);
    assert_eq!(row.license_token, None);
    assert_eq!(row.license_expires_at, None);
    assert!(!rig.unit_path("ne-addon-vplc").exists());
    assert!(!rig.token_path("vplc").exists());
    assert_eq!(
        wait_for_key(&rig.bus, "supervisor/_event/addon_deactivated").await,
        json!("vplc")
    );

    rig.app.stop().await;
}

#[tokio::test]
async fn activation_via_bus_command_replies_on_the_event_key() {
    let rig = SupervisorRig::build();
    rig.clock.set_epoch(real_epoch());
    rig.start().await;

    let token = mint_token("vplc", real_epoch() + 3600);
    rig.bus
        .publish(
            "supervisor/_cmd/activate",
            json!({"app_id": "vplc", "token": token}),
        )
        .await
        .unwrap();
    rig.bus.commit().await.unwrap();

    let reply = wait_for_key(&rig.bus, "supervisor/_event/activate_result").await;
    assert_eq!(reply["ok"], true);
    assert_eq!(reply["app_id"], "vplc");
    wait_until(|| rig.record("vplc").map(|r| r.active).unwrap_or(false)).await;

    rig.app.stop().await;
}

#[tokio::test]
async fn mismatched_token_app_id_is_refused() {
    let rig = SupervisorRig::build();
    rig.clock.set_epoch(real_epoch());
    rig.start().await;

    let token = mint_token("snf", real_epoch() + 3600);
    let result = rig
        .app
        .hooks()
        .activate_addon("vplc", &token, rig.app.ctx())
        .await;
    assert_eq!(result["ok"], false);
    assert!(result["error"].as_str().unwrap().contains("mismatch"));
    assert!(!rig.db.select_app("vplc").unwrap().unwrap().enabled);

    rig.app.stop().await;
}

#[tokio::test]
async fn expired_token_never_activates() {
    let rig = SupervisorRig::build();
    rig.clock.set_epoch(real_epoch());
    rig.start().await;

    let token = mint_token("vplc", real_epoch().saturating_sub(120));
    let result = rig
        .app
        .hooks()
        .activate_addon("vplc", &token, rig.app.ctx())
        .await;
    assert_eq!(result["ok"], false);
    assert_eq!(result["error"], "invalid or expired token");

    rig.app.stop().await;
}

#[tokio::test]
async fn unknown_addon_is_refused() {
    let rig = SupervisorRig::build();
    rig.clock.set_epoch(real_epoch());
    rig.start().await;

    let token = mint_token("mystery", real_epoch() + 3600);
    let result = rig
        .app
        .hooks()
        .activate_addon("mystery", &token, rig.app.ctx())
        .await;
    assert_eq!(result["ok"], false);
    assert!(result["error"].as_str().unwrap().contains("unknown addon"));

    rig.app.stop().await;
}

#[tokio::test]
async fn deactivate_command_round_trips() {
    let rig = SupervisorRig::build();
    rig.clock.set_epoch(real_epoch());
    rig.start().await;

    let token = mint_token("vplc", real_epoch() + 3600);
    let result = rig
        .app
        .hooks()
        .activate_addon("vplc", &token, rig.app.ctx())
        .await;
    assert_eq!(result["ok"], true);

    rig.bus
        .publish("supervisor/_cmd/deactivate", json!({"app_id": "vplc"}))
        .await
        .unwrap();
    rig.bus.commit().await.unwrap();

    let reply = wait_for_key(&rig.bus, "supervisor/_event/deactivate_result").await;
    assert_eq!(reply["ok"], true);
    wait_until(|| rig.record("vplc").map(|r| !r.active).unwrap_or(false)).await;
    assert!(!rig.db.select_app("vplc").unwrap().unwrap().enabled);

    rig.app.stop().await;
}
