use crate::config::{self, DAY_DATES_KEY, SCHEDULING_KEY};
use crate::days::{Day, DayTable};
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use tracing::info;

#[derive(Clone, Copy)]
enum SetupSection {
    Scheduling,
    DayDates,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "scheduling" => Some(Self::Scheduling),
            "dayDates" => Some(Self::DayDates),
            _ => None,
        }
    }
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = db_conn(state, req) {
        return resp;
    }
    ok(
        &req.id,
        json!({
            "scheduling": state.config.to_json(),
            "dayDates": state.days.to_json(),
        }),
    )
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let section_raw = match required_str(req, "section") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(section) = SetupSection::parse(&section_raw) else {
        return err(
            &req.id,
            "bad_params",
            "section must be one of: scheduling, dayDates",
            Some(json!({ "section": section_raw })),
        );
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    match section {
        SetupSection::Scheduling => {
            let mut next = state.config.clone();
            if let Err(msg) = next.apply_patch(patch) {
                return err(&req.id, "bad_params", msg, None);
            }
            if let Err(e) = db::settings_set_json(conn, SCHEDULING_KEY, &next.to_json()) {
                return err(&req.id, "db_update_failed", e.to_string(), None);
            }
            info!(config = ?next, "scheduling config updated");
            state.config = next;
        }
        SetupSection::DayDates => {
            // Partial patches merge over the current table; the result must
            // still be a full bijection.
            let mut merged = state.days.to_json();
            for (k, v) in patch {
                let Some(day) = Day::parse(k) else {
                    return err(
                        &req.id,
                        "bad_params",
                        format!("unknown day: {}", k),
                        Some(json!({ "key": k })),
                    );
                };
                merged[day.as_str()] = v.clone();
            }
            let table = match DayTable::from_json(&merged) {
                Ok(t) => t,
                Err(msg) => return err(&req.id, "bad_params", msg, None),
            };
            if let Err(e) = db::settings_set_json(conn, DAY_DATES_KEY, &table.to_json()) {
                return err(&req.id, "db_update_failed", e.to_string(), None);
            }
            info!("day/date table updated");
            state.days = table;
        }
    }

    // Re-read so the response reflects what is stored.
    match (config::load_scheduling(conn), config::load_day_table(conn)) {
        (Ok(cfg), Ok(days)) => ok(
            &req.id,
            json!({ "scheduling": cfg.to_json(), "dayDates": days.to_json() }),
        ),
        (Err(e), _) | (_, Err(e)) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
