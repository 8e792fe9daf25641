use crate::days::Day;
use crate::model::{MAX_STUDENTS, MAX_TEACHERS};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Failed(String),
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Db(_) => "db_query_failed",
            StoreError::NotFound(_) => "not_found",
            StoreError::Failed(_) => "store_failed",
        }
    }
}

/// Overlap found by the local detector at one target day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayConflict {
    pub day: Day,
    pub conflicting_teacher_ids: Vec<String>,
    pub conflicting_student_ids: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("scheduling conflict on {}", days_list(.0))]
    Conflict(Vec<DayConflict>),

    #[error("rejected for {day}: {}", .errors.join("; "))]
    ValidationRejected { day: Day, errors: Vec<String> },

    /// A delete failed after earlier deletes in the same sweep succeeded.
    #[error("partial deletion: {} row(s) deleted before {failed_id} failed: {source}", .deleted.len())]
    PartialDeletion {
        deleted: Vec<String>,
        failed_id: String,
        #[source]
        source: StoreError,
    },

    #[error(
        "capacity exceeded: {} teacher(s) (max {}), {} student(s) (max {})",
        .teachers,
        MAX_TEACHERS,
        .students,
        MAX_STUDENTS
    )]
    Capacity { teachers: usize, students: usize },

    #[error("not enough consecutive slots after {start_slot_id} for {duration_minutes} minutes")]
    InsufficientSlots {
        start_slot_id: String,
        duration_minutes: i64,
    },

    #[error("at least one day must be selected")]
    EmptyDaySet,

    #[error("class group {0} not found")]
    GroupNotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn days_list(conflicts: &[DayConflict]) -> String {
    conflicts
        .iter()
        .map(|c| c.day.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl ScheduleError {
    pub fn code(&self) -> &'static str {
        match self {
            ScheduleError::Conflict(_) => "conflict",
            ScheduleError::ValidationRejected { .. } => "validation_rejected",
            ScheduleError::PartialDeletion { .. } => "partial_deletion",
            ScheduleError::Capacity { .. } => "capacity_exceeded",
            ScheduleError::InsufficientSlots { .. } => "insufficient_slots",
            ScheduleError::EmptyDaySet => "bad_params",
            ScheduleError::GroupNotFound(_) => "not_found",
            ScheduleError::Store(e) => e.code(),
        }
    }

    /// Structured payload for the IPC error object, keyed by day where it applies.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            ScheduleError::Conflict(days) => {
                let mut by_day = serde_json::Map::new();
                for c in days {
                    by_day.insert(
                        c.day.as_str().to_string(),
                        json!({
                            "conflictingTeacherIds": c.conflicting_teacher_ids,
                            "conflictingStudentIds": c.conflicting_student_ids,
                        }),
                    );
                }
                Some(json!({ "days": by_day }))
            }
            ScheduleError::ValidationRejected { day, errors } => Some(json!({
                "day": day,
                "errors": errors,
            })),
            ScheduleError::PartialDeletion {
                deleted, failed_id, ..
            } => Some(json!({
                "deletedIds": deleted,
                "failedId": failed_id,
            })),
            ScheduleError::Capacity { teachers, students } => Some(json!({
                "teachers": teachers,
                "students": students,
                "maxTeachers": MAX_TEACHERS,
                "maxStudents": MAX_STUDENTS,
            })),
            ScheduleError::InsufficientSlots {
                start_slot_id,
                duration_minutes,
            } => Some(json!({
                "startSlotId": start_slot_id,
                "durationMinutes": duration_minutes,
            })),
            ScheduleError::GroupNotFound(id) => Some(json!({ "classGroupId": id })),
            ScheduleError::EmptyDaySet | ScheduleError::Store(_) => None,
        }
    }
}
