use crate::availability::{self, EntityKind};
use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::{db_conn, parse_day, required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn parse_kind(req: &Request) -> Result<EntityKind, serde_json::Value> {
    let raw = required_str(req, "entityType")?;
    EntityKind::parse(&raw).ok_or_else(|| {
        err(
            &req.id,
            "bad_params",
            "entityType must be one of: teacher, student",
            Some(json!({ "entityType": raw })),
        )
    })
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let (kind, day) = match (parse_kind(req), parse_day(req, "day")) {
        (Ok(k), Ok(d)) => (k, d),
        (Err(resp), _) | (_, Err(resp)) => return resp,
    };
    match availability::list(conn, &state.days, kind, day) {
        Ok(entries) => ok(&req.id, json!({ "day": day, "entries": entries })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_toggle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let parsed = (|| {
        Ok::<_, serde_json::Value>((
            parse_kind(req)?,
            required_str(req, "entityId")?,
            parse_day(req, "day")?,
            required_str(req, "slotId")?,
        ))
    })();
    let (kind, entity_id, day, slot_id) = match parsed {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match availability::toggle(conn, &state.days, kind, &entity_id, day, &slot_id) {
        Ok(available) => ok(
            &req.id,
            json!({ "entityId": entity_id, "day": day, "slotId": slot_id, "available": available }),
        ),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_apply_to_all_days(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let parsed = (|| {
        Ok::<_, serde_json::Value>((
            parse_kind(req)?,
            required_str(req, "entityId")?,
            parse_day(req, "fromDay")?,
        ))
    })();
    let (kind, entity_id, from) = match parsed {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match availability::apply_to_all_days(conn, &state.days, kind, &entity_id, from) {
        Ok(set) => ok(
            &req.id,
            json!({ "entityId": entity_id, "slotIds": set.into_iter().collect::<Vec<_>>() }),
        ),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_mismatches(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    match availability::mismatches(conn, &state.days) {
        Ok(items) => ok(&req.id, json!({ "mismatches": items })),
        Err(e) => store_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "availability.list" => Some(handle_list(state, req)),
        "availability.toggle" => Some(handle_toggle(state, req)),
        "availability.applyToAllDays" => Some(handle_apply_to_all_days(state, req)),
        "availability.mismatches" => Some(handle_mismatches(state, req)),
        _ => None,
    }
}
