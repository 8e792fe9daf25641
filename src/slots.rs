use crate::config::SchedulingConfig;
use crate::error::{ScheduleError, StoreError};
use chrono::NaiveTime;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub id: String,
    pub name: String,
    pub start_time: String,
    pub end_time: String,
    pub sort_order: i64,
}

pub fn parse_hhmm(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").ok()
}

pub fn load_slots(conn: &Connection) -> Result<Vec<TimeSlot>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, start_time, end_time, sort_order
         FROM time_slots
         ORDER BY sort_order, id",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(TimeSlot {
                id: r.get(0)?,
                name: r.get(1)?,
                start_time: r.get(2)?,
                end_time: r.get(3)?,
                sort_order: r.get(4)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(rows)
}

/// Slot ids covering `duration_minutes` starting at `start_slot_id`, in
/// display order. Each following slot must start exactly where the previous
/// one ends.
pub fn consecutive_slots(
    slots: &[TimeSlot],
    start_slot_id: &str,
    duration_minutes: i64,
    cfg: &SchedulingConfig,
) -> Result<Vec<String>, ScheduleError> {
    let insufficient = || ScheduleError::InsufficientSlots {
        start_slot_id: start_slot_id.to_string(),
        duration_minutes,
    };

    if duration_minutes <= 0
        || cfg.slot_minutes <= 0
        || duration_minutes % cfg.slot_minutes != 0
    {
        return Err(insufficient());
    }
    let span = duration_minutes / cfg.slot_minutes;
    if !cfg.allowed_slot_spans.contains(&span) {
        return Err(insufficient());
    }

    let mut ordered: Vec<&TimeSlot> = slots.iter().collect();
    ordered.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.id.cmp(&b.id)));
    let Some(start) = ordered.iter().position(|s| s.id == start_slot_id) else {
        return Err(insufficient());
    };

    let span = span as usize;
    let window = ordered.get(start..start + span).ok_or_else(insufficient)?;
    for pair in window.windows(2) {
        let (Some(prev_end), Some(next_start)) =
            (parse_hhmm(&pair[0].end_time), parse_hhmm(&pair[1].start_time))
        else {
            return Err(insufficient());
        };
        if prev_end != next_start {
            return Err(insufficient());
        }
    }
    Ok(window.iter().map(|s| s.id.clone()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(id: &str, order: i64, start: &str, end: &str) -> TimeSlot {
        TimeSlot {
            id: id.into(),
            name: id.into(),
            start_time: start.into(),
            end_time: end.into(),
            sort_order: order,
        }
    }

    fn day_slots() -> Vec<TimeSlot> {
        vec![
            slot("p3", 3, "16:50", "17:15"),
            slot("p1", 1, "16:00", "16:25"),
            slot("p2", 2, "16:25", "16:50"),
            slot("p4", 4, "17:15", "17:40"),
            slot("p5", 5, "18:00", "18:25"),
        ]
    }

    #[test]
    fn spans_follow_display_order() {
        let cfg = SchedulingConfig::default();
        let slots = day_slots();
        assert_eq!(consecutive_slots(&slots, "p2", 25, &cfg).unwrap(), vec!["p2"]);
        assert_eq!(
            consecutive_slots(&slots, "p1", 50, &cfg).unwrap(),
            vec!["p1", "p2"]
        );
        assert_eq!(
            consecutive_slots(&slots, "p1", 100, &cfg).unwrap(),
            vec!["p1", "p2", "p3", "p4"]
        );
    }

    #[test]
    fn rejects_short_tail_gaps_and_odd_durations() {
        let cfg = SchedulingConfig::default();
        let slots = day_slots();
        // Runs off the end.
        assert!(consecutive_slots(&slots, "p3", 100, &cfg).is_err());
        // 17:40 -> 18:00 gap.
        assert!(consecutive_slots(&slots, "p4", 50, &cfg).is_err());
        // 75 minutes is three slots, not an allowed span.
        assert!(matches!(
            consecutive_slots(&slots, "p1", 75, &cfg),
            Err(ScheduleError::InsufficientSlots { duration_minutes: 75, .. })
        ));
        assert!(consecutive_slots(&slots, "p1", 30, &cfg).is_err());
        assert!(consecutive_slots(&slots, "nope", 25, &cfg).is_err());
    }
}
