use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::{db_conn, optional_day, parse_json, required_str, with_unit_of_work};
use crate::ipc::types::{AppState, Request};
use crate::model::AssignmentData;
use crate::reconcile;
use crate::store::{AssignmentStore, SqliteStore};
use serde_json::json;

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let day = match optional_day(req, "day") {
        Ok(d) => d,
        Err(resp) => return resp,
    };
    let store = SqliteStore::new(conn, &state.days);
    let rows = match day {
        Some(d) => store.list(d),
        None => store.list_week(),
    };
    match rows {
        Ok(rows) => ok(&req.id, json!({ "assignments": rows })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let id = match required_str(req, "assignmentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match SqliteStore::new(conn, &state.days).get(&id) {
        Ok(Some(row)) => ok(&req.id, json!({ "assignment": row })),
        Ok(None) => err(
            &req.id,
            "not_found",
            "assignment not found",
            Some(json!({ "assignmentId": id })),
        ),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let data = match parse_json::<AssignmentData>(req, "assignment") {
        Ok(d) => d.normalized(),
        Err(resp) => return resp,
    };
    match with_unit_of_work(state, req, |store, gate| {
        reconcile::create_assignment(store, gate, &data)
    }) {
        Ok(row) => ok(&req.id, json!({ "assignment": row })),
        Err(resp) => resp,
    }
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match required_str(req, "assignmentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let data = match parse_json::<AssignmentData>(req, "assignment") {
        Ok(d) => d.normalized(),
        Err(resp) => return resp,
    };
    match with_unit_of_work(state, req, |store, gate| {
        reconcile::update_assignment(store, gate, &id, &data)
    }) {
        Ok(row) => ok(&req.id, json!({ "assignment": row })),
        Err(resp) => resp,
    }
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match required_str(req, "assignmentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match with_unit_of_work(state, req, |store, _| Ok(store.delete(&id)?)) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(resp) => resp,
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "assignments.list" => Some(handle_list(state, req)),
        "assignments.get" => Some(handle_get(state, req)),
        "assignments.create" => Some(handle_create(state, req)),
        "assignments.update" => Some(handle_update(state, req)),
        "assignments.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
