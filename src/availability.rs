//! Per-(entity, day) sets of slot ids a teacher or student can be booked into.
//!
//! Availability is edited independently of assignments and is never shrunk
//! by scheduling. An entity that becomes unavailable while assigned stays
//! assigned; `mismatches` reports those cases.

use crate::days::{Day, DayTable};
use crate::error::StoreError;
use crate::store::{AssignmentStore, SqliteStore};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

pub type SlotSet = BTreeSet<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Teacher,
    Student,
}

impl EntityKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "teacher" | "teachers" => Some(Self::Teacher),
            "student" | "students" => Some(Self::Student),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Teacher => "teacher",
            Self::Student => "student",
        }
    }

    pub fn table(self) -> &'static str {
        match self {
            Self::Teacher => "teachers",
            Self::Student => "students",
        }
    }
}

/// Flips one slot id. Returns whether the slot is available afterwards.
pub fn toggle_slot(set: &mut SlotSet, slot_id: &str) -> bool {
    if set.remove(slot_id) {
        false
    } else {
        set.insert(slot_id.to_string());
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityEntry {
    pub id: String,
    pub name: String,
    pub availability_slots: Vec<String>,
    pub color_tag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Mismatch {
    pub entity_type: EntityKind,
    pub entity_id: String,
    pub day: Day,
    pub slot_id: String,
    pub assignment_id: String,
}

fn decode_slots(raw: &str) -> SlotSet {
    serde_json::from_str::<Vec<String>>(raw)
        .map(|v| v.into_iter().collect())
        .unwrap_or_default()
}

fn encode_slots(set: &SlotSet) -> Result<String, StoreError> {
    serde_json::to_string(&set.iter().collect::<Vec<_>>())
        .map_err(|e| StoreError::Failed(e.to_string()))
}

pub fn entity_exists(conn: &Connection, kind: EntityKind, id: &str) -> Result<bool, StoreError> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?", kind.table());
    let found: Option<i64> = conn.query_row(&sql, [id], |r| r.get(0)).optional()?;
    Ok(found.is_some())
}

pub fn get_slots(
    conn: &Connection,
    days: &DayTable,
    kind: EntityKind,
    entity_id: &str,
    day: Day,
) -> Result<SlotSet, StoreError> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT slot_ids FROM availability
             WHERE entity_type = ? AND entity_id = ? AND date_key = ?",
            (kind.as_str(), entity_id, days.key(day)),
            |r| r.get(0),
        )
        .optional()?;
    Ok(raw.as_deref().map(decode_slots).unwrap_or_default())
}

fn put_slots(
    conn: &Connection,
    days: &DayTable,
    kind: EntityKind,
    entity_id: &str,
    day: Day,
    set: &SlotSet,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO availability(entity_type, entity_id, date_key, slot_ids)
         VALUES(?, ?, ?, ?)
         ON CONFLICT(entity_type, entity_id, date_key) DO UPDATE SET slot_ids = excluded.slot_ids",
        (kind.as_str(), entity_id, days.key(day), encode_slots(set)?),
    )?;
    Ok(())
}

pub fn is_available(
    conn: &Connection,
    days: &DayTable,
    kind: EntityKind,
    entity_id: &str,
    day: Day,
    slot_id: &str,
) -> Result<bool, StoreError> {
    Ok(get_slots(conn, days, kind, entity_id, day)?.contains(slot_id))
}

/// Availability Provider: every entity of `kind` with its slots on `day`.
pub fn list(
    conn: &Connection,
    days: &DayTable,
    kind: EntityKind,
    day: Day,
) -> Result<Vec<AvailabilityEntry>, StoreError> {
    let sql = format!(
        "SELECT e.id, e.name, e.color, av.slot_ids
         FROM {} e
         LEFT JOIN availability av
           ON av.entity_type = ? AND av.entity_id = e.id AND av.date_key = ?
         WHERE e.active = 1
         ORDER BY e.name, e.id",
        kind.table()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map((kind.as_str(), days.key(day)), |r| {
            let raw: Option<String> = r.get(3)?;
            Ok(AvailabilityEntry {
                id: r.get(0)?,
                name: r.get(1)?,
                color_tag: r.get(2)?,
                availability_slots: raw
                    .as_deref()
                    .map(decode_slots)
                    .unwrap_or_default()
                    .into_iter()
                    .collect(),
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(rows)
}

pub fn toggle(
    conn: &Connection,
    days: &DayTable,
    kind: EntityKind,
    entity_id: &str,
    day: Day,
    slot_id: &str,
) -> Result<bool, StoreError> {
    if !entity_exists(conn, kind, entity_id)? {
        return Err(StoreError::NotFound(format!("{} {}", kind.as_str(), entity_id)));
    }
    let mut set = get_slots(conn, days, kind, entity_id, day)?;
    let now_available = toggle_slot(&mut set, slot_id);
    put_slots(conn, days, kind, entity_id, day, &set)?;
    Ok(now_available)
}

/// Copies `from`'s set onto all seven days, creating day records where absent.
pub fn apply_to_all_days(
    conn: &Connection,
    days: &DayTable,
    kind: EntityKind,
    entity_id: &str,
    from: Day,
) -> Result<SlotSet, StoreError> {
    if !entity_exists(conn, kind, entity_id)? {
        return Err(StoreError::NotFound(format!("{} {}", kind.as_str(), entity_id)));
    }
    let set = get_slots(conn, days, kind, entity_id, from)?;
    for day in Day::ALL {
        put_slots(conn, days, kind, entity_id, day, &set)?;
    }
    Ok(set)
}

/// Every (entity, day, slot) that is booked but not marked available.
pub fn mismatches(conn: &Connection, days: &DayTable) -> Result<Vec<Mismatch>, StoreError> {
    let mut cache: HashMap<(EntityKind, String, Day), SlotSet> = HashMap::new();
    let store = SqliteStore::new(conn, days);
    let mut out = Vec::new();

    for row in store.list_week()? {
        let refs = row
            .data
            .teachers
            .iter()
            .map(|t| (EntityKind::Teacher, &t.teacher_id))
            .chain(row.data.student_ids.iter().map(|s| (EntityKind::Student, s)));
        for (kind, entity_id) in refs {
            let key = (kind, entity_id.clone(), row.data.day);
            if !cache.contains_key(&key) {
                let set = get_slots(conn, days, kind, entity_id, row.data.day)?;
                cache.insert(key.clone(), set);
            }
            if !cache[&key].contains(&row.data.slot_id) {
                out.push(Mismatch {
                    entity_type: kind,
                    entity_id: entity_id.clone(),
                    day: row.data.day,
                    slot_id: row.data.slot_id.clone(),
                    assignment_id: row.id.clone(),
                });
            }
        }
    }
    Ok(out)
}
