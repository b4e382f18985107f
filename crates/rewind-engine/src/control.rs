//! Control surface: the request/response interface a popup or other
//! out-of-process controller talks to.
//!
//! Requests are `{"type": "GET_SNAPSHOT" | "RESTORE_TIME" | "FORCE_RESET"}`;
//! responses always carry `ok` and use camelCase field names.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::engine::ResetEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlRequest {
    GetSnapshot,
    RestoreTime,
    ForceReset,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restored_time_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForceResetResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ControlResponse {
    Snapshot(SnapshotResponse),
    Restore(RestoreResponse),
    ForceReset(ForceResetResponse),
}

pub struct ControlSurface {
    engine: Arc<ResetEngine>,
}

impl ControlSurface {
    pub fn new(engine: Arc<ResetEngine>) -> Self {
        Self { engine }
    }

    pub async fn handle(&self, request: ControlRequest) -> ControlResponse {
        match request {
            ControlRequest::GetSnapshot => ControlResponse::Snapshot(self.get_snapshot()),
            ControlRequest::RestoreTime => ControlResponse::Restore(self.restore().await),
            ControlRequest::ForceReset => ControlResponse::ForceReset(self.force_reset().await),
        }
    }

    /// Decode a raw request, handle it, encode the response.
    pub async fn handle_json(&self, request: &Value) -> Value {
        let request: ControlRequest = match serde_json::from_value(request.clone()) {
            Ok(request) => request,
            Err(e) => {
                return json!({
                    "ok": false,
                    "message": format!("unsupported request: {e}"),
                })
            }
        };
        let response = self.handle(request).await;
        serde_json::to_value(response)
            .unwrap_or_else(|e| json!({ "ok": false, "message": e.to_string() }))
    }

    fn get_snapshot(&self) -> SnapshotResponse {
        match self.engine.snapshot_for_current_target() {
            Some(snapshot) => SnapshotResponse {
                ok: true,
                time_text: Some(snapshot.time_text()),
            },
            None => SnapshotResponse {
                ok: false,
                time_text: None,
            },
        }
    }

    async fn restore(&self) -> RestoreResponse {
        match self.engine.restore().await {
            Ok(report) => RestoreResponse {
                ok: true,
                restored_time_text: Some(report.time_text),
                message: None,
            },
            Err(e) => RestoreResponse {
                ok: false,
                restored_time_text: None,
                message: Some(e.reason().to_string()),
            },
        }
    }

    async fn force_reset(&self) -> ForceResetResponse {
        match self.engine.force_reset().await {
            Ok(_) => ForceResetResponse {
                ok: true,
                reason: None,
            },
            Err(e) => ForceResetResponse {
                ok: false,
                reason: Some(e.reason().to_string()),
            },
        }
    }
}
