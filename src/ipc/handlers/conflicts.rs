use crate::conflict;
use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::{db_conn, parse_candidate};
use crate::ipc::types::{AppState, Request};
use crate::model::{Candidate, MAX_STUDENTS, MAX_TEACHERS};
use crate::store::SqliteStore;
use serde_json::json;
use std::collections::HashSet;

fn parse_ignore_ids(req: &Request) -> Result<HashSet<String>, serde_json::Value> {
    let mut out = HashSet::new();
    if let Some(id) = req.params.get("ignoreAssignmentId").and_then(|v| v.as_str()) {
        out.insert(id.to_string());
    }
    match req.params.get("ignoreAssignmentIds") {
        None | Some(serde_json::Value::Null) => {}
        Some(serde_json::Value::Array(items)) => {
            for v in items {
                let Some(id) = v.as_str() else {
                    return Err(err(
                        &req.id,
                        "bad_params",
                        "ignoreAssignmentIds must contain only strings",
                        None,
                    ));
                };
                out.insert(id.to_string());
            }
        }
        Some(_) => {
            return Err(err(
                &req.id,
                "bad_params",
                "ignoreAssignmentIds must be an array",
                None,
            ))
        }
    }
    Ok(out)
}

fn parse(req: &Request) -> Result<(Candidate, HashSet<String>), serde_json::Value> {
    let candidate = parse_candidate(req)?;
    if candidate.teacher_id_set().len() > MAX_TEACHERS
        || candidate.student_id_set().len() > MAX_STUDENTS
    {
        return Err(err(
            &req.id,
            "capacity_exceeded",
            "candidate exceeds class capacity",
            Some(json!({ "maxTeachers": MAX_TEACHERS, "maxStudents": MAX_STUDENTS })),
        ));
    }
    Ok((candidate, parse_ignore_ids(req)?))
}

fn handle_check(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let (candidate, ignore) = match parse(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let store = SqliteStore::new(conn, &state.days);
    match conflict::detect(&store, &candidate, &ignore) {
        Ok(report) => ok(&req.id, json!(report)),
        Err(e) => store_err(&req.id, &e),
    }
}

/// Advisory highlighting only; never fails on store errors.
fn handle_probe(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let (candidate, ignore) = match parse(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let store = SqliteStore::new(conn, &state.days);
    ok(&req.id, json!(conflict::probe(&store, &candidate, &ignore)))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "conflicts.check" => Some(handle_check(state, req)),
        "conflicts.probe" => Some(handle_probe(state, req)),
        _ => None,
    }
}
