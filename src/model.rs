use crate::days::Day;
use crate::error::ScheduleError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const MAX_TEACHERS: usize = 2;
pub const MAX_STUDENTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherRef {
    pub teacher_id: String,
    #[serde(default)]
    pub is_substitute: bool,
}

/// Everything about one occurrence except its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentData {
    pub day: Day,
    pub slot_id: String,
    pub teachers: Vec<TeacherRef>,
    pub student_ids: Vec<String>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub color: Option<String>,
}

impl AssignmentData {
    pub fn teacher_id_set(&self) -> BTreeSet<&str> {
        self.teachers.iter().map(|t| t.teacher_id.as_str()).collect()
    }

    pub fn student_id_set(&self) -> BTreeSet<&str> {
        self.student_ids.iter().map(|s| s.as_str()).collect()
    }

    /// Same cleanup as `ClassFields::normalized`: repeated ids dropped
    /// (first occurrence wins), subject trimmed.
    pub fn normalized(mut self) -> AssignmentData {
        let mut seen = BTreeSet::new();
        self.teachers.retain(|t| seen.insert(t.teacher_id.clone()));
        let mut seen = BTreeSet::new();
        self.student_ids.retain(|s| seen.insert(s.clone()));
        self.subject = self.subject.trim().to_string();
        self
    }

    pub fn candidate(&self) -> Candidate {
        Candidate {
            day: self.day,
            slot_id: self.slot_id.clone(),
            teacher_ids: self.teachers.iter().map(|t| t.teacher_id.clone()).collect(),
            student_ids: self.student_ids.clone(),
        }
    }
}

/// One stored row: one occurrence of a class on one day at one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: String,
    #[serde(flatten)]
    pub data: AssignmentData,
}

/// The shape shared by the conflict detector and the validation gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub day: Day,
    pub slot_id: String,
    pub teacher_ids: Vec<String>,
    pub student_ids: Vec<String>,
}

impl Candidate {
    pub fn teacher_id_set(&self) -> BTreeSet<&str> {
        self.teacher_ids.iter().map(|s| s.as_str()).collect()
    }

    pub fn student_id_set(&self) -> BTreeSet<&str> {
        self.student_ids.iter().map(|s| s.as_str()).collect()
    }
}

/// Field values coming from an edit form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassFields {
    pub teachers: Vec<TeacherRef>,
    pub student_ids: Vec<String>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub color: Option<String>,
}

impl ClassFields {
    pub fn for_day(&self, day: Day, slot_id: &str) -> AssignmentData {
        AssignmentData {
            day,
            slot_id: slot_id.to_string(),
            teachers: self.teachers.clone(),
            student_ids: self.student_ids.clone(),
            subject: self.subject.clone(),
            notes: self.notes.clone(),
            color: self.color.clone(),
        }
    }

    /// Drops repeated ids (first occurrence wins) and trims the subject.
    pub fn normalized(mut self) -> ClassFields {
        let mut seen = BTreeSet::new();
        self.teachers.retain(|t| seen.insert(t.teacher_id.clone()));
        let mut seen = BTreeSet::new();
        self.student_ids.retain(|s| seen.insert(s.clone()));
        self.subject = self.subject.trim().to_string();
        self
    }
}

pub fn check_capacity(teachers: usize, students: usize) -> Result<(), ScheduleError> {
    if teachers > MAX_TEACHERS || students > MAX_STUDENTS {
        return Err(ScheduleError::Capacity { teachers, students });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_rejects_third_teacher_and_sixth_student() {
        assert!(check_capacity(2, 5).is_ok());
        assert!(check_capacity(0, 0).is_ok());
        assert!(matches!(
            check_capacity(3, 1),
            Err(ScheduleError::Capacity { teachers: 3, .. })
        ));
        assert!(matches!(
            check_capacity(1, 6),
            Err(ScheduleError::Capacity { students: 6, .. })
        ));
    }

    #[test]
    fn normalized_drops_duplicate_refs() {
        let f = ClassFields {
            teachers: vec![
                TeacherRef { teacher_id: "t1".into(), is_substitute: false },
                TeacherRef { teacher_id: "t1".into(), is_substitute: true },
            ],
            student_ids: vec!["s1".into(), "s2".into(), "s1".into()],
            subject: "  Math ".into(),
            notes: String::new(),
            color: None,
        }
        .normalized();
        assert_eq!(f.teachers.len(), 1);
        assert!(!f.teachers[0].is_substitute);
        assert_eq!(f.student_ids, vec!["s1".to_string(), "s2".to_string()]);
        assert_eq!(f.subject, "Math");
    }

    #[test]
    fn single_row_data_normalizes_like_class_fields() {
        let d = AssignmentData {
            day: Day::Tue,
            slot_id: "s1".into(),
            teachers: vec![
                TeacherRef { teacher_id: "t2".into(), is_substitute: true },
                TeacherRef { teacher_id: "t2".into(), is_substitute: false },
            ],
            student_ids: vec!["s3".into(), "s3".into()],
            subject: "\tReading ".into(),
            notes: " kept as is ".into(),
            color: None,
        }
        .normalized();
        assert_eq!(d.teachers.len(), 1);
        assert!(d.teachers[0].is_substitute);
        assert_eq!(d.student_ids, vec!["s3".to_string()]);
        assert_eq!(d.subject, "Reading");
        assert_eq!(d.notes, " kept as is ");
        assert_eq!(d.candidate().teacher_ids, vec!["t2".to_string()]);
    }
}
