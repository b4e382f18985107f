mod common;

use common::{FakeElement, Harness, HOME, WATCH_A};
use rewind_engine::{ControlSurface, MediaElement};
use serde_json::json;

#[tokio::test(start_paused = true)]
async fn test_snapshot_query_and_restore() {
    let h = Harness::new(WATCH_A);
    let element = FakeElement::new(65.4);
    h.host.attach(element.clone());
    let control = ControlSurface::new(h.engine.clone());

    let response = control.handle_json(&json!({ "type": "GET_SNAPSHOT" })).await;
    assert_eq!(response, json!({ "ok": false }));

    h.engine.handle_signal(h.signal()).await;
    let response = control.handle_json(&json!({ "type": "GET_SNAPSHOT" })).await;
    assert_eq!(response, json!({ "ok": true, "timeText": "01:05" }));

    let response = control.handle_json(&json!({ "type": "RESTORE_TIME" })).await;
    assert_eq!(response, json!({ "ok": true, "restoredTimeText": "01:05" }));
    assert_eq!(element.position(), 65.4);
}

#[tokio::test(start_paused = true)]
async fn test_restore_without_snapshot() {
    let h = Harness::new(WATCH_A);
    let control = ControlSurface::new(h.engine.clone());

    let response = control.handle_json(&json!({ "type": "RESTORE_TIME" })).await;
    assert_eq!(response, json!({ "ok": false, "message": "no_snapshot" }));
}

#[tokio::test(start_paused = true)]
async fn test_force_reset_responses() {
    let h = Harness::new(HOME);
    let control = ControlSurface::new(h.engine.clone());

    let response = control.handle_json(&json!({ "type": "FORCE_RESET" })).await;
    assert_eq!(response, json!({ "ok": false, "reason": "not_watch_page" }));

    h.host.navigate(WATCH_A);
    h.host.attach(FakeElement::new(12.0));
    let response = control.handle_json(&json!({ "type": "FORCE_RESET" })).await;
    assert_eq!(response, json!({ "ok": true }));
}

#[tokio::test]
async fn test_unknown_request_is_rejected() {
    let h = Harness::new(WATCH_A);
    let control = ControlSurface::new(h.engine.clone());

    let response = control.handle_json(&json!({ "type": "PING" })).await;
    assert_eq!(response["ok"], json!(false));
    assert!(response["message"].as_str().unwrap().starts_with("unsupported request"));

    let response = control.handle_json(&json!("GET_SNAPSHOT")).await;
    assert_eq!(response["ok"], json!(false));
}
