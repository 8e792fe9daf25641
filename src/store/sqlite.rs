use super::AssignmentStore;
use crate::days::{Day, DayTable};
use crate::db::now_rfc3339;
use crate::error::StoreError;
use crate::model::{Assignment, AssignmentData, TeacherRef};
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// `AssignmentStore` over the workspace database. Borrow it from a
/// transaction to get unit-of-work semantics.
pub struct SqliteStore<'a> {
    conn: &'a Connection,
    days: &'a DayTable,
}

impl<'a> SqliteStore<'a> {
    pub fn new(conn: &'a Connection, days: &'a DayTable) -> Self {
        Self { conn, days }
    }

    pub fn get(&self, id: &str) -> Result<Option<Assignment>, StoreError> {
        let date_key: Option<String> = self
            .conn
            .query_row(
                "SELECT date_key FROM assignments WHERE id = ?",
                [id],
                |r| r.get(0),
            )
            .optional()?;
        let Some(date_key) = date_key else {
            return Ok(None);
        };
        let Some(day) = self.days.day_for_key(&date_key) else {
            return Ok(None);
        };
        Ok(self.list(day)?.into_iter().find(|a| a.id == id))
    }

    fn write_refs(&self, id: &str, data: &AssignmentData) -> Result<(), StoreError> {
        self.conn
            .execute("DELETE FROM assignment_teachers WHERE assignment_id = ?", [id])?;
        self.conn
            .execute("DELETE FROM assignment_students WHERE assignment_id = ?", [id])?;
        for (i, t) in data.teachers.iter().enumerate() {
            self.conn.execute(
                "INSERT INTO assignment_teachers(assignment_id, teacher_id, is_substitute, position)
                 VALUES(?, ?, ?, ?)",
                (id, &t.teacher_id, t.is_substitute as i64, i as i64),
            )?;
        }
        for (i, s) in data.student_ids.iter().enumerate() {
            self.conn.execute(
                "INSERT INTO assignment_students(assignment_id, student_id, position)
                 VALUES(?, ?, ?)",
                (id, s, i as i64),
            )?;
        }
        Ok(())
    }
}

impl AssignmentStore for SqliteStore<'_> {
    fn list(&self, day: Day) -> Result<Vec<Assignment>, StoreError> {
        let date_key = self.days.key(day);

        let mut stmt = self.conn.prepare(
            "SELECT a.id, a.slot_id, a.subject, a.notes, a.color
             FROM assignments a
             LEFT JOIN time_slots ts ON ts.id = a.slot_id
             WHERE a.date_key = ?
             ORDER BY ts.sort_order, a.rowid",
        )?;
        let mut rows = stmt
            .query_map([date_key], |r| {
                Ok(Assignment {
                    id: r.get(0)?,
                    data: AssignmentData {
                        day,
                        slot_id: r.get(1)?,
                        teachers: Vec::new(),
                        student_ids: Vec::new(),
                        subject: r.get(2)?,
                        notes: r.get(3)?,
                        color: r.get(4)?,
                    },
                })
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;

        let mut index: HashMap<String, usize> = HashMap::new();
        for (i, a) in rows.iter().enumerate() {
            index.insert(a.id.clone(), i);
        }

        let mut t_stmt = self.conn.prepare(
            "SELECT at.assignment_id, at.teacher_id, at.is_substitute
             FROM assignment_teachers at
             JOIN assignments a ON a.id = at.assignment_id
             WHERE a.date_key = ?
             ORDER BY at.assignment_id, at.position",
        )?;
        let teacher_rows = t_stmt
            .query_map([date_key], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    TeacherRef {
                        teacher_id: r.get(1)?,
                        is_substitute: r.get::<_, i64>(2)? != 0,
                    },
                ))
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
        for (aid, t) in teacher_rows {
            if let Some(&i) = index.get(&aid) {
                rows[i].data.teachers.push(t);
            }
        }

        let mut s_stmt = self.conn.prepare(
            "SELECT s.assignment_id, s.student_id
             FROM assignment_students s
             JOIN assignments a ON a.id = s.assignment_id
             WHERE a.date_key = ?
             ORDER BY s.assignment_id, s.position",
        )?;
        let student_rows = s_stmt
            .query_map([date_key], |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
        for (aid, sid) in student_rows {
            if let Some(&i) = index.get(&aid) {
                rows[i].data.student_ids.push(sid);
            }
        }

        Ok(rows)
    }

    fn create(&mut self, data: &AssignmentData) -> Result<Assignment, StoreError> {
        let id = Uuid::new_v4().to_string();
        let now = now_rfc3339();
        self.conn.execute(
            "INSERT INTO assignments(id, date_key, slot_id, subject, notes, color, created_at, updated_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
            (
                &id,
                self.days.key(data.day),
                &data.slot_id,
                &data.subject,
                &data.notes,
                &data.color,
                &now,
                &now,
            ),
        )?;
        self.write_refs(&id, data)?;
        debug!(assignment_id = %id, day = %data.day, slot_id = %data.slot_id, "assignment created");
        Ok(Assignment {
            id,
            data: data.clone(),
        })
    }

    fn update(&mut self, id: &str, data: &AssignmentData) -> Result<Assignment, StoreError> {
        let changed = self.conn.execute(
            "UPDATE assignments
             SET date_key = ?, slot_id = ?, subject = ?, notes = ?, color = ?, updated_at = ?
             WHERE id = ?",
            (
                self.days.key(data.day),
                &data.slot_id,
                &data.subject,
                &data.notes,
                &data.color,
                now_rfc3339(),
                id,
            ),
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("assignment {}", id)));
        }
        self.write_refs(id, data)?;
        debug!(assignment_id = %id, day = %data.day, "assignment updated");
        Ok(Assignment {
            id: id.to_string(),
            data: data.clone(),
        })
    }

    fn delete(&mut self, id: &str) -> Result<(), StoreError> {
        // No ON DELETE CASCADE; children first.
        self.conn
            .execute("DELETE FROM assignment_teachers WHERE assignment_id = ?", [id])?;
        self.conn
            .execute("DELETE FROM assignment_students WHERE assignment_id = ?", [id])?;
        let changed = self
            .conn
            .execute("DELETE FROM assignments WHERE id = ?", [id])?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("assignment {}", id)));
        }
        debug!(assignment_id = %id, "assignment deleted");
        Ok(())
    }
}
