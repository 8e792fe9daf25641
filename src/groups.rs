//! Derives logical multi-day classes from flat per-day assignment rows.
//!
//! A class group is every row sharing the same slot, teacher-id-set,
//! student-id-set and subject. Groups are recomputed on every read and
//! addressed by a content hash, never by a stored key.

use crate::days::{normalize_days, Day};
use crate::error::StoreError;
use crate::model::Assignment;
use crate::store::AssignmentStore;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ClassGroupId(String);

impl ClassGroupId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn from_raw(s: &str) -> Self {
        ClassGroupId(s.trim().to_ascii_lowercase())
    }
}

impl fmt::Display for ClassGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The pre-edit identity of a class.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupIdentity {
    pub slot_id: String,
    pub teacher_ids: BTreeSet<String>,
    pub student_ids: BTreeSet<String>,
    pub subject: String,
}

impl GroupIdentity {
    pub fn of(row: &Assignment) -> GroupIdentity {
        GroupIdentity {
            slot_id: row.data.slot_id.clone(),
            teacher_ids: row.data.teachers.iter().map(|t| t.teacher_id.clone()).collect(),
            student_ids: row.data.student_ids.iter().cloned().collect(),
            subject: row.data.subject.clone(),
        }
    }

    pub fn matches(&self, row: &Assignment) -> bool {
        row.data.slot_id == self.slot_id
            && row.data.subject == self.subject
            && row.data.teacher_id_set()
                == self.teacher_ids.iter().map(String::as_str).collect::<BTreeSet<_>>()
            && row.data.student_id_set()
                == self.student_ids.iter().map(String::as_str).collect::<BTreeSet<_>>()
    }

    pub fn id(&self) -> ClassGroupId {
        let mut h = Sha256::new();
        // Unit separators keep ("ab","c") and ("a","bc") apart.
        for t in &self.teacher_ids {
            h.update(b"t\x1f");
            h.update(t.as_bytes());
            h.update(b"\x1e");
        }
        for s in &self.student_ids {
            h.update(b"s\x1f");
            h.update(s.as_bytes());
            h.update(b"\x1e");
        }
        h.update(b"j\x1f");
        h.update(self.subject.as_bytes());
        h.update(b"\x1eslot\x1f");
        h.update(self.slot_id.as_bytes());
        let digest = h.finalize();
        ClassGroupId(hex::encode(&digest[..16]))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassGroup {
    pub id: ClassGroupId,
    pub identity: GroupIdentity,
    pub days: Vec<Day>,
    pub member_assignments: Vec<Assignment>,
}

impl ClassGroup {
    pub fn members_on(&self, day: Day) -> impl Iterator<Item = &Assignment> {
        self.member_assignments
            .iter()
            .filter(move |a| a.data.day == day)
    }
}

/// Groups rows from one day or the whole week. Output is ordered by slot id
/// and then by group id; member order follows input order.
pub fn resolve(rows: &[Assignment]) -> Vec<ClassGroup> {
    let mut by_slot: BTreeMap<&str, BTreeMap<ClassGroupId, (GroupIdentity, Vec<Assignment>)>> =
        BTreeMap::new();
    for row in rows {
        let identity = GroupIdentity::of(row);
        let id = identity.id();
        by_slot
            .entry(row.data.slot_id.as_str())
            .or_default()
            .entry(id)
            .or_insert_with(|| (identity, Vec::new()))
            .1
            .push(row.clone());
    }

    let mut out = Vec::new();
    for (_, groups) in by_slot {
        for (id, (identity, members)) in groups {
            let days = normalize_days(members.iter().map(|m| m.data.day));
            out.push(ClassGroup {
                id,
                identity,
                days,
                member_assignments: members,
            });
        }
    }
    out
}

/// Single-teacher display: groups the teacher takes part in, bucketed by slot.
pub fn teacher_view<'g>(
    groups: &'g [ClassGroup],
    teacher_id: &str,
) -> BTreeMap<String, Vec<&'g ClassGroup>> {
    let mut out: BTreeMap<String, Vec<&ClassGroup>> = BTreeMap::new();
    for g in groups {
        if g.identity.teacher_ids.contains(teacher_id) {
            out.entry(g.identity.slot_id.clone()).or_default().push(g);
        }
    }
    out
}

pub fn find_group<S>(store: &S, id: &ClassGroupId) -> Result<Option<ClassGroup>, StoreError>
where
    S: AssignmentStore + ?Sized,
{
    let rows = store.list_week()?;
    Ok(resolve(&rows).into_iter().find(|g| &g.id == id))
}

/// Re-scans `days` for every row matching `identity`, including rows that
/// were not part of an earlier read.
pub fn rescan_members<S>(
    store: &S,
    identity: &GroupIdentity,
    days: &[Day],
) -> Result<Vec<Assignment>, StoreError>
where
    S: AssignmentStore + ?Sized,
{
    let mut out = Vec::new();
    for &day in days {
        out.extend(store.list(day)?.into_iter().filter(|r| identity.matches(r)));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AssignmentData, TeacherRef};

    fn row(id: &str, day: Day, slot: &str, t: &[&str], s: &[&str], subject: &str) -> Assignment {
        Assignment {
            id: id.into(),
            data: AssignmentData {
                day,
                slot_id: slot.into(),
                teachers: t
                    .iter()
                    .map(|x| TeacherRef {
                        teacher_id: x.to_string(),
                        is_substitute: false,
                    })
                    .collect(),
                student_ids: s.iter().map(|x| x.to_string()).collect(),
                subject: subject.into(),
                notes: String::new(),
                color: None,
            },
        }
    }

    #[test]
    fn rows_with_same_identity_merge_across_days() {
        let rows = vec![
            row("a1", Day::Wed, "s3", &["T1"], &["S1"], "Math"),
            row("a2", Day::Mon, "s3", &["T1"], &["S1"], "Math"),
            row("a3", Day::Mon, "s3", &["T1"], &["S2"], "Math"),
        ];
        let groups = resolve(&rows);
        assert_eq!(groups.len(), 2);
        let g = groups
            .iter()
            .find(|g| g.member_assignments.len() == 2)
            .expect("merged group");
        assert_eq!(g.days, vec![Day::Mon, Day::Wed]);
    }

    #[test]
    fn id_ignores_ref_order_but_not_subject_or_slot() {
        let a = GroupIdentity::of(&row("x", Day::Mon, "s1", &["T1", "T2"], &["S2", "S1"], "Math"));
        let b = GroupIdentity::of(&row("y", Day::Fri, "s1", &["T2", "T1"], &["S1", "S2"], "Math"));
        assert_eq!(a.id(), b.id());
        assert_eq!(a.id().as_str().len(), 32);

        let c = GroupIdentity::of(&row("z", Day::Mon, "s1", &["T1", "T2"], &["S1", "S2"], "math"));
        assert_ne!(a.id(), c.id());
        let d = GroupIdentity::of(&row("w", Day::Mon, "s2", &["T1", "T2"], &["S1", "S2"], "Math"));
        assert_ne!(a.id(), d.id());
    }

    #[test]
    fn teacher_view_buckets_by_slot() {
        let rows = vec![
            row("a1", Day::Mon, "s1", &["T1"], &["S1"], "Math"),
            row("a2", Day::Mon, "s1", &["T1"], &["S2"], "Art"),
            row("a3", Day::Mon, "s2", &["T2"], &["S3"], "Math"),
        ];
        let groups = resolve(&rows);
        let view = teacher_view(&groups, "T1");
        assert_eq!(view.len(), 1);
        assert_eq!(view["s1"].len(), 2);
    }
}
