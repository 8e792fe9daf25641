use crate::availability::EntityKind;
use crate::db::now_rfc3339;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, required_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::OptionalExtension;
use serde_json::json;
use uuid::Uuid;

fn id_key(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Teacher => "teacherId",
        EntityKind::Student => "studentId",
    }
}

fn handle_list(state: &mut AppState, req: &Request, kind: EntityKind) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ kind.table(): [] }));
    };
    let include_inactive = req
        .params
        .get("includeInactive")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let sql = format!(
        "SELECT id, name, color, active FROM {} WHERE active = 1 OR ? ORDER BY name, id",
        kind.table()
    );
    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([include_inactive as i64], |r| {
            let id: String = r.get(0)?;
            let name: String = r.get(1)?;
            let color: Option<String> = r.get(2)?;
            let active: i64 = r.get(3)?;
            Ok(json!({
                "id": id,
                "name": name,
                "color": color,
                "active": active != 0
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(list) => ok(&req.id, json!({ kind.table(): list })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_create(state: &mut AppState, req: &Request, kind: EntityKind) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let color = req
        .params
        .get("color")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string());

    let id = Uuid::new_v4().to_string();
    let sql = format!(
        "INSERT INTO {}(id, name, color, active, created_at) VALUES(?, ?, ?, 1, ?)",
        kind.table()
    );
    if let Err(e) = conn.execute(&sql, (&id, &name, &color, now_rfc3339())) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": kind.table() })),
        );
    }
    ok(&req.id, json!({ id_key(kind): id, "name": name }))
}

fn handle_update(state: &mut AppState, req: &Request, kind: EntityKind) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let id = match required_str(req, id_key(kind)) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };
    for (k, v) in patch {
        let res = match k.as_str() {
            "name" => match v.as_str().map(str::trim).filter(|s| !s.is_empty()) {
                Some(name) => tx.execute(
                    &format!("UPDATE {} SET name = ? WHERE id = ?", kind.table()),
                    (name, &id),
                ),
                None => return err(&req.id, "bad_params", "name must be a non-empty string", None),
            },
            "color" => tx.execute(
                &format!("UPDATE {} SET color = ? WHERE id = ?", kind.table()),
                (v.as_str(), &id),
            ),
            // Deactivating keeps existing assignments; callers flag them via
            // availability.mismatches and the grids.
            "active" => match v.as_bool() {
                Some(b) => tx.execute(
                    &format!("UPDATE {} SET active = ? WHERE id = ?", kind.table()),
                    (b as i64, &id),
                ),
                None => return err(&req.id, "bad_params", "active must be boolean", None),
            },
            other => {
                return err(
                    &req.id,
                    "bad_params",
                    format!("unknown patch key: {}", other),
                    None,
                )
            }
        };
        match res {
            Ok(0) => return err(&req.id, "not_found", format!("{} not found", kind.as_str()), None),
            Ok(_) => {}
            Err(e) => return err(&req.id, "db_update_failed", e.to_string(), None),
        }
    }
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "ok": true }))
}

fn handle_delete(state: &mut AppState, req: &Request, kind: EntityKind) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let id = match required_str(req, id_key(kind)) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let ref_sql = match kind {
        EntityKind::Teacher => "SELECT COUNT(*) FROM assignment_teachers WHERE teacher_id = ?",
        EntityKind::Student => "SELECT COUNT(*) FROM assignment_students WHERE student_id = ?",
    };
    let in_use: i64 = match conn.query_row(ref_sql, [&id], |r| r.get(0)) {
        Ok(n) => n,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if in_use > 0 {
        return err(
            &req.id,
            "in_use",
            format!("{} is still assigned; remove the assignments first", kind.as_str()),
            Some(json!({ "assignments": in_use })),
        );
    }

    let exists: Option<i64> = match conn
        .query_row(
            &format!("SELECT 1 FROM {} WHERE id = ?", kind.table()),
            [&id],
            |r| r.get(0),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if exists.is_none() {
        return err(&req.id, "not_found", format!("{} not found", kind.as_str()), None);
    }

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };
    if let Err(e) = tx.execute(
        "DELETE FROM availability WHERE entity_type = ? AND entity_id = ?",
        (kind.as_str(), &id),
    ) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "availability" })),
        );
    }
    if let Err(e) = tx.execute(&format!("DELETE FROM {} WHERE id = ?", kind.table()), [&id]) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": kind.table() })),
        );
    }
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let (family, action) = req.method.split_once('.')?;
    let kind = match family {
        "teachers" => EntityKind::Teacher,
        "students" => EntityKind::Student,
        _ => return None,
    };
    match action {
        "list" => Some(handle_list(state, req, kind)),
        "create" => Some(handle_create(state, req, kind)),
        "update" => Some(handle_update(state, req, kind)),
        "delete" => Some(handle_delete(state, req, kind)),
        _ => None,
    }
}
