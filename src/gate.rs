use crate::availability::{self, EntityKind};
use crate::config::SchedulingConfig;
use crate::conflict;
use crate::days::DayTable;
use crate::error::StoreError;
use crate::model::{Candidate, MAX_STUDENTS, MAX_TEACHERS};
use crate::store::{SqliteStore, Validation, ValidationGate};
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashSet;

/// Server-side re-check against the live workspace database.
pub struct WorkspaceGate<'a> {
    conn: &'a Connection,
    days: &'a DayTable,
    config: &'a SchedulingConfig,
}

impl<'a> WorkspaceGate<'a> {
    pub fn new(conn: &'a Connection, days: &'a DayTable, config: &'a SchedulingConfig) -> Self {
        Self { conn, days, config }
    }
}

impl ValidationGate for WorkspaceGate<'_> {
    fn validate(
        &self,
        candidate: &Candidate,
        ignore: &HashSet<String>,
    ) -> Result<Validation, StoreError> {
        let mut errors = Vec::new();
        let day = candidate.day;

        let teachers = candidate.teacher_id_set();
        let students = candidate.student_id_set();
        if teachers.len() > MAX_TEACHERS {
            errors.push(format!("at most {} teachers per class", MAX_TEACHERS));
        }
        if students.len() > MAX_STUDENTS {
            errors.push(format!("at most {} students per class", MAX_STUDENTS));
        }

        let slot_exists: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM time_slots WHERE id = ?",
                [&candidate.slot_id],
                |r| r.get(0),
            )
            .optional()?;
        if slot_exists.is_none() {
            errors.push(format!("unknown slot {}", candidate.slot_id));
        }

        let refs = teachers
            .iter()
            .map(|id| (EntityKind::Teacher, *id))
            .chain(students.iter().map(|id| (EntityKind::Student, *id)));
        for (kind, id) in refs {
            if !availability::entity_exists(self.conn, kind, id)? {
                errors.push(format!("unknown {} {}", kind.as_str(), id));
                continue;
            }
            if self.config.require_availability
                && !availability::is_available(self.conn, self.days, kind, id, day, &candidate.slot_id)?
            {
                errors.push(format!(
                    "{} {} is not available on {} at slot {}",
                    kind.as_str(),
                    id,
                    day,
                    candidate.slot_id
                ));
            }
        }

        let store = SqliteStore::new(self.conn, self.days);
        let report = conflict::detect(&store, candidate, ignore)?;
        for t in &report.conflicting_teacher_ids {
            errors.push(format!(
                "teacher {} is already booked on {} at slot {}",
                t, day, candidate.slot_id
            ));
        }
        for s in &report.conflicting_student_ids {
            errors.push(format!(
                "student {} is already booked on {} at slot {}",
                s, day, candidate.slot_id
            ));
        }

        if errors.is_empty() {
            Ok(Validation::accepted())
        } else {
            Ok(Validation::rejected(errors))
        }
    }
}
