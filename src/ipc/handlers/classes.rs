use crate::error::ScheduleError;
use crate::groups::{find_group, ClassGroupId};
use crate::ipc::error::{err, ok, schedule_err, store_err};
use crate::ipc::helpers::{db_conn, parse_days, parse_fields, required_str, with_unit_of_work};
use crate::ipc::types::{AppState, Request};
use crate::reconcile::{self, EditRequest, PlanOptions};
use crate::slots::{consecutive_slots, load_slots};
use crate::store::SqliteStore;
use serde_json::json;

fn parse_group_id(req: &Request) -> Result<ClassGroupId, serde_json::Value> {
    required_str(req, "classGroupId").map(|raw| ClassGroupId::from_raw(&raw))
}

fn plan_options(state: &AppState) -> PlanOptions {
    PlanOptions {
        refresh_existing_on_add: state.config.refresh_existing_on_add,
    }
}

fn handle_classes_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let parsed = (|| {
        Ok::<_, serde_json::Value>((
            parse_days(req, "days")?,
            required_str(req, "startSlotId")?,
            parse_fields(req)?,
        ))
    })();
    let (days, start_slot_id, fields) = match parsed {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let duration = match req.params.get("durationMinutes") {
        None | Some(serde_json::Value::Null) => state.config.slot_minutes,
        Some(v) => match v.as_i64() {
            Some(n) => n,
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    "durationMinutes must be an integer",
                    None,
                )
            }
        },
    };

    let slots = match load_slots(conn) {
        Ok(s) => s,
        Err(e) => return store_err(&req.id, &e),
    };
    let slot_ids = match consecutive_slots(&slots, &start_slot_id, duration, &state.config) {
        Ok(ids) => ids,
        Err(e) => return schedule_err(&req.id, &e),
    };

    match with_unit_of_work(state, req, |store, gate| {
        reconcile::create_class(store, gate, &days, &slot_ids, &fields)
    }) {
        Ok(rows) => ok(
            &req.id,
            json!({ "slotIds": slot_ids, "assignments": rows }),
        ),
        Err(resp) => resp,
    }
}

/// Dry run: reports the strategy and the writes a reconcile would perform.
fn handle_classes_plan(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let parsed = (|| {
        Ok::<_, serde_json::Value>((
            parse_group_id(req)?,
            parse_days(req, "selectedDays")?,
            parse_fields(req)?,
        ))
    })();
    let (group_id, selected_days, fields) = match parsed {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let store = SqliteStore::new(conn, &state.days);
    let group = match find_group(&store, &group_id) {
        Ok(Some(g)) => g,
        Ok(None) => {
            return schedule_err(&req.id, &ScheduleError::GroupNotFound(group_id.to_string()))
        }
        Err(e) => return store_err(&req.id, &e),
    };
    let edit = EditRequest {
        group: &group,
        selected_days,
        fields,
    };
    match reconcile::plan(&store, &edit, plan_options(state)) {
        Ok(plan) => ok(&req.id, json!({ "plan": plan })),
        Err(e) => schedule_err(&req.id, &e),
    }
}

fn handle_classes_reconcile(state: &mut AppState, req: &Request) -> serde_json::Value {
    let parsed = (|| {
        Ok::<_, serde_json::Value>((
            parse_group_id(req)?,
            parse_days(req, "selectedDays")?,
            parse_fields(req)?,
        ))
    })();
    let (group_id, selected_days, fields) = match parsed {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let opts = plan_options(state);

    match with_unit_of_work(state, req, |store, gate| {
        let group = find_group(&*store, &group_id)?
            .ok_or_else(|| ScheduleError::GroupNotFound(group_id.to_string()))?;
        let edit = EditRequest {
            group: &group,
            selected_days,
            fields,
        };
        reconcile::reconcile(store, gate, &edit, opts)
    }) {
        Ok((plan, outcome)) => ok(&req.id, json!({ "plan": plan, "outcome": outcome })),
        Err(resp) => resp,
    }
}

fn handle_classes_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let group_id = match parse_group_id(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match with_unit_of_work(state, req, |store, _| {
        let group = find_group(&*store, &group_id)?
            .ok_or_else(|| ScheduleError::GroupNotFound(group_id.to_string()))?;
        reconcile::delete_group(store, &group.identity)
    }) {
        Ok(deleted) => ok(&req.id, json!({ "deletedIds": deleted })),
        Err(resp) => resp,
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.create" => Some(handle_classes_create(state, req)),
        "classes.plan" => Some(handle_classes_plan(state, req)),
        "classes.reconcile" => Some(handle_classes_reconcile(state, req)),
        "classes.delete" => Some(handle_classes_delete(state, req)),
        _ => None,
    }
}
