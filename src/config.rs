use crate::db;
use crate::days::DayTable;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub const SCHEDULING_KEY: &str = "setup.scheduling";
pub const DAY_DATES_KEY: &str = "setup.dayDates";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingConfig {
    pub slot_minutes: i64,
    pub allowed_slot_spans: Vec<i64>,
    pub require_availability: bool,
    pub refresh_existing_on_add: bool,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            slot_minutes: 25,
            allowed_slot_spans: vec![1, 2, 4],
            require_availability: false,
            refresh_existing_on_add: false,
        }
    }
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool().ok_or_else(|| format!("{} must be boolean", key))
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

impl SchedulingConfig {
    /// Applies a partial JSON patch. Unknown keys are rejected.
    pub fn apply_patch(&mut self, patch: &Map<String, Value>) -> Result<(), String> {
        for (k, v) in patch {
            match k.as_str() {
                "slotMinutes" => self.slot_minutes = parse_i64_range(v, k, 5, 120)?,
                "allowedSlotSpans" => {
                    let arr = v
                        .as_array()
                        .ok_or_else(|| format!("{} must be an array", k))?;
                    let mut spans = Vec::new();
                    for item in arr {
                        let n = parse_i64_range(item, k, 1, 12)?;
                        if !spans.contains(&n) {
                            spans.push(n);
                        }
                    }
                    if spans.is_empty() {
                        return Err(format!("{} must not be empty", k));
                    }
                    spans.sort_unstable();
                    self.allowed_slot_spans = spans;
                }
                "requireAvailability" => self.require_availability = parse_bool(v, k)?,
                "refreshExistingOnAdd" => self.refresh_existing_on_add = parse_bool(v, k)?,
                other => return Err(format!("unknown scheduling key: {}", other)),
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Value {
        json!(self)
    }
}

/// Stored values merged over defaults. Bad stored values fall back to defaults.
pub fn load_scheduling(conn: &Connection) -> anyhow::Result<SchedulingConfig> {
    let mut cfg = SchedulingConfig::default();
    if let Some(Value::Object(stored)) = db::settings_get_json(conn, SCHEDULING_KEY)? {
        let mut candidate = cfg.clone();
        if candidate.apply_patch(&stored).is_ok() {
            cfg = candidate;
        }
    }
    Ok(cfg)
}

pub fn load_day_table(conn: &Connection) -> anyhow::Result<DayTable> {
    match db::settings_get_json(conn, DAY_DATES_KEY)? {
        Some(v) => DayTable::from_json(&v).map_err(|e| anyhow::anyhow!(e)),
        None => Ok(DayTable::default()),
    }
}
