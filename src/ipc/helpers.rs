use crate::days::Day;
use crate::error::ScheduleError;
use crate::gate::WorkspaceGate;
use crate::ipc::error::{err, schedule_err};
use crate::ipc::types::{AppState, Request};
use crate::model::{check_capacity, Candidate, ClassFields};
use crate::store::SqliteStore;
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::warn;

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn parse_day(req: &Request, key: &str) -> Result<Day, serde_json::Value> {
    let raw = required_str(req, key)?;
    Day::parse(&raw).ok_or_else(|| {
        err(
            &req.id,
            "bad_params",
            format!("{} must be one of: mon, tue, wed, thu, fri, sat, sun", key),
            Some(json!({ "value": raw })),
        )
    })
}

pub fn optional_day(req: &Request, key: &str) -> Result<Option<Day>, serde_json::Value> {
    match req.params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(_) => parse_day(req, key).map(Some),
    }
}

pub fn parse_days(req: &Request, key: &str) -> Result<Vec<Day>, serde_json::Value> {
    let Some(raw) = req.params.get(key).and_then(|v| v.as_array()) else {
        return Err(err(&req.id, "bad_params", format!("missing {}", key), None));
    };
    let mut out = Vec::new();
    for v in raw {
        let day = v.as_str().and_then(Day::parse).ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                format!("{} must contain only day names", key),
                Some(json!({ "value": v })),
            )
        })?;
        out.push(day);
    }
    Ok(out)
}

pub fn parse_json<T: DeserializeOwned>(req: &Request, key: &str) -> Result<T, serde_json::Value> {
    let Some(raw) = req.params.get(key) else {
        return Err(err(&req.id, "bad_params", format!("missing {}", key), None));
    };
    serde_json::from_value(raw.clone()).map_err(|e| {
        err(
            &req.id,
            "bad_params",
            format!("invalid {}: {}", key, e),
            None,
        )
    })
}

/// Normalized class fields; oversize classes are rejected before any lookup.
pub fn parse_fields(req: &Request) -> Result<ClassFields, serde_json::Value> {
    let fields = parse_json::<ClassFields>(req, "fields").map(ClassFields::normalized)?;
    check_capacity(fields.teachers.len(), fields.student_ids.len())
        .map_err(|e| schedule_err(&req.id, &e))?;
    Ok(fields)
}

pub fn parse_candidate(req: &Request) -> Result<Candidate, serde_json::Value> {
    parse_json(req, "candidate")
}

/// Runs `f` inside a transaction. Any error rolls back every write `f` made.
pub fn with_unit_of_work<T>(
    state: &AppState,
    req: &Request,
    f: impl FnOnce(&mut SqliteStore<'_>, &WorkspaceGate<'_>) -> Result<T, ScheduleError>,
) -> Result<T, serde_json::Value> {
    let conn = db_conn(state, req)?;
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| err(&req.id, "db_tx_failed", e.to_string(), None))?;

    let result = {
        let mut store = SqliteStore::new(&tx, &state.days);
        let gate = WorkspaceGate::new(&tx, &state.days, &state.config);
        f(&mut store, &gate)
    };

    match result {
        Ok(v) => {
            tx.commit()
                .map_err(|e| err(&req.id, "db_commit_failed", e.to_string(), None))?;
            Ok(v)
        }
        Err(e) => {
            let rolled_back = tx.rollback().is_ok();
            if !rolled_back {
                warn!(method = %req.method, "rollback failed");
            }
            let mut resp = schedule_err(&req.id, &e);
            if matches!(e, ScheduleError::PartialDeletion { .. }) {
                resp["error"]["details"]["rolledBack"] = json!(rolled_back);
            }
            Err(resp)
        }
    }
}
