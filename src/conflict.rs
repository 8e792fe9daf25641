//! Conflict detection between a candidate occurrence and the other classes
//! booked at the same day and slot.
//!
//! Rows whose teacher-id-set and student-id-set both equal the candidate's
//! are siblings of the same class and never conflict. Any other row at the
//! slot that shares a teacher or a student does. Partial overlap (same
//! students, one different teacher) is foreign, not a sibling.

use crate::error::StoreError;
use crate::model::{Assignment, Candidate};
use crate::store::AssignmentStore;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictReport {
    pub conflict: bool,
    pub conflicting_teacher_ids: Vec<String>,
    pub conflicting_student_ids: Vec<String>,
}

pub fn is_sibling(candidate: &Candidate, row: &Assignment) -> bool {
    candidate.teacher_id_set() == row.data.teacher_id_set()
        && candidate.student_id_set() == row.data.student_id_set()
}

/// Pure form: `rows` may contain other days and slots; they are filtered here.
pub fn detect_in_rows(
    candidate: &Candidate,
    rows: &[Assignment],
    ignore: &HashSet<String>,
) -> ConflictReport {
    let teachers = candidate.teacher_id_set();
    let students = candidate.student_id_set();

    let mut hit_teachers: BTreeSet<&str> = BTreeSet::new();
    let mut hit_students: BTreeSet<&str> = BTreeSet::new();

    let foreign = rows.iter().filter(|r| {
        r.data.day == candidate.day
            && r.data.slot_id == candidate.slot_id
            && !ignore.contains(&r.id)
            && !is_sibling(candidate, r)
    });
    for row in foreign {
        hit_teachers.extend(row.data.teacher_id_set().intersection(&teachers).copied());
        hit_students.extend(row.data.student_id_set().intersection(&students).copied());
    }

    ConflictReport {
        conflict: !hit_teachers.is_empty() || !hit_students.is_empty(),
        conflicting_teacher_ids: hit_teachers.into_iter().map(str::to_string).collect(),
        conflicting_student_ids: hit_students.into_iter().map(str::to_string).collect(),
    }
}

pub fn detect<S>(
    store: &S,
    candidate: &Candidate,
    ignore: &HashSet<String>,
) -> Result<ConflictReport, StoreError>
where
    S: AssignmentStore + ?Sized,
{
    let rows = store.list(candidate.day)?;
    Ok(detect_in_rows(candidate, &rows, ignore))
}

/// Advisory variant used for UI highlighting: a failed lookup reads as
/// "no conflict" and is logged.
pub fn probe<S>(store: &S, candidate: &Candidate, ignore: &HashSet<String>) -> ConflictReport
where
    S: AssignmentStore + ?Sized,
{
    match detect(store, candidate, ignore) {
        Ok(report) => report,
        Err(e) => {
            warn!(day = %candidate.day, slot_id = %candidate.slot_id, error = %e, "conflict probe failed");
            ConflictReport::default()
        }
    }
}
