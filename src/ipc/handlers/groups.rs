use crate::groups::{resolve, teacher_view};
use crate::ipc::error::{ok, store_err};
use crate::ipc::helpers::{db_conn, optional_day};
use crate::ipc::types::{AppState, Request};
use crate::store::{AssignmentStore, SqliteStore};
use serde_json::json;

fn handle_groups_list(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    let rows = match rows {
        Ok(r) => r,
        Err(e) => return store_err(&req.id, &e),
    };
    let groups = resolve(&rows);

    match req.params.get("teacherId").and_then(|v| v.as_str()) {
        Some(teacher_id) => {
            let by_slot = teacher_view(&groups, teacher_id);
            ok(&req.id, json!({ "teacherId": teacher_id, "bySlot": by_slot }))
        }
        None => ok(&req.id, json!({ "groups": groups })),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "groups.list" => Some(handle_groups_list(state, req)),
        _ => None,
    }
}
