use crate::error::{ScheduleError, StoreError};
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Maps a scheduling failure to its stable code and structured details.
pub fn schedule_err(id: &str, e: &ScheduleError) -> serde_json::Value {
    err(id, e.code(), e.to_string(), e.details())
}

pub fn store_err(id: &str, e: &StoreError) -> serde_json::Value {
    let details = match e {
        StoreError::NotFound(what) => Some(json!({ "missing": what })),
        StoreError::Db(_) | StoreError::Failed(_) => None,
    };
    err(id, e.code(), e.to_string(), details)
}
