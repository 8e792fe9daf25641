use crate::ipc::error::{err, ok, schedule_err, store_err};
use crate::ipc::helpers::{db_conn, required_str};
use crate::ipc::types::{AppState, Request};
use crate::slots::{consecutive_slots, load_slots, parse_hhmm};
use serde_json::json;
use uuid::Uuid;

fn handle_slots_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "slots": [] }));
    };
    match load_slots(conn) {
        Ok(slots) => ok(&req.id, json!({ "slots": slots })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_slots_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let (start, end) = match (required_str(req, "startTime"), required_str(req, "endTime")) {
        (Ok(s), Ok(e)) => (s, e),
        (Err(resp), _) | (_, Err(resp)) => return resp,
    };
    match (parse_hhmm(&start), parse_hhmm(&end)) {
        (Some(s), Some(e)) if s < e => {}
        _ => {
            return err(
                &req.id,
                "bad_params",
                "startTime/endTime must be HH:MM with startTime < endTime",
                Some(json!({ "startTime": start, "endTime": end })),
            )
        }
    }

    let sort_order = match req.params.get("sortOrder").and_then(|v| v.as_i64()) {
        Some(n) => n,
        None => {
            match conn.query_row(
                "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM time_slots",
                [],
                |r| r.get::<_, i64>(0),
            ) {
                Ok(n) => n,
                Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
            }
        }
    };
    let slot_id = req
        .params
        .get("slotId")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    if let Err(e) = conn.execute(
        "INSERT INTO time_slots(id, name, start_time, end_time, sort_order) VALUES(?, ?, ?, ?, ?)",
        (&slot_id, &name, &start, &end, sort_order),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "time_slots" })),
        );
    }
    ok(&req.id, json!({ "slotId": slot_id, "sortOrder": sort_order }))
}

fn handle_slots_consecutive(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let start = match required_str(req, "startSlotId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(duration) = req.params.get("durationMinutes").and_then(|v| v.as_i64()) else {
        return err(&req.id, "bad_params", "missing durationMinutes", None);
    };
    let slots = match load_slots(conn) {
        Ok(s) => s,
        Err(e) => return store_err(&req.id, &e),
    };
    match consecutive_slots(&slots, &start, duration, &state.config) {
        Ok(ids) => ok(&req.id, json!({ "slotIds": ids })),
        Err(e) => schedule_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "slots.list" => Some(handle_slots_list(state, req)),
        "slots.create" => Some(handle_slots_create(state, req)),
        "slots.consecutive" => Some(handle_slots_consecutive(state, req)),
        _ => None,
    }
}
