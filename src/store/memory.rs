use super::{AssignmentStore, Validation, ValidationGate};
use crate::days::Day;
use crate::error::StoreError;
use crate::model::{Assignment, AssignmentData, Candidate};
use std::cell::{Cell, RefCell};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    List(Day),
    Create(Day),
    Update(String),
    Delete(String),
}

/// In-memory store with an operation log and fault injection.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub rows: Vec<Assignment>,
    pub ops: RefCell<Vec<Op>>,
    next_id: usize,
    /// Fail the nth delete call (0-based).
    pub fail_delete_at: Option<usize>,
    deletes_seen: usize,
    pub fail_list: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&mut self, data: AssignmentData) -> String {
        self.next_id += 1;
        let id = format!("a{}", self.next_id);
        self.rows.push(Assignment {
            id: id.clone(),
            data,
        });
        id
    }

    pub fn writes(&self) -> Vec<Op> {
        self.ops
            .borrow()
            .iter()
            .filter(|op| !matches!(op, Op::List(_)))
            .cloned()
            .collect()
    }

    pub fn days_covered(&self) -> Vec<Day> {
        crate::days::normalize_days(self.rows.iter().map(|r| r.data.day))
    }
}

impl AssignmentStore for MemoryStore {
    fn list(&self, day: Day) -> Result<Vec<Assignment>, StoreError> {
        self.ops.borrow_mut().push(Op::List(day));
        if self.fail_list {
            return Err(StoreError::Failed("list unavailable".into()));
        }
        Ok(self
            .rows
            .iter()
            .filter(|r| r.data.day == day)
            .cloned()
            .collect())
    }

    fn create(&mut self, data: &AssignmentData) -> Result<Assignment, StoreError> {
        self.ops.borrow_mut().push(Op::Create(data.day));
        let id = self.seed(data.clone());
        Ok(Assignment {
            id,
            data: data.clone(),
        })
    }

    fn update(&mut self, id: &str, data: &AssignmentData) -> Result<Assignment, StoreError> {
        self.ops.borrow_mut().push(Op::Update(id.to_string()));
        let Some(row) = self.rows.iter_mut().find(|r| r.id == id) else {
            return Err(StoreError::NotFound(format!("assignment {}", id)));
        };
        row.data = data.clone();
        Ok(row.clone())
    }

    fn delete(&mut self, id: &str) -> Result<(), StoreError> {
        self.ops.borrow_mut().push(Op::Delete(id.to_string()));
        let n = self.deletes_seen;
        self.deletes_seen += 1;
        if self.fail_delete_at == Some(n) {
            return Err(StoreError::Failed("connection reset".into()));
        }
        let before = self.rows.len();
        self.rows.retain(|r| r.id != id);
        if self.rows.len() == before {
            return Err(StoreError::NotFound(format!("assignment {}", id)));
        }
        Ok(())
    }
}

/// Gate that rejects a fixed set of days and counts calls.
#[derive(Debug, Default)]
pub struct ScriptedGate {
    pub reject_days: HashSet<Day>,
    pub calls: Cell<usize>,
    /// Ignore set passed on the most recent call.
    pub last_ignore: RefCell<HashSet<String>>,
}

impl ScriptedGate {
    pub fn rejecting(days: &[Day]) -> Self {
        Self {
            reject_days: days.iter().copied().collect(),
            ..Self::default()
        }
    }
}

impl ValidationGate for ScriptedGate {
    fn validate(
        &self,
        candidate: &Candidate,
        ignore: &HashSet<String>,
    ) -> Result<Validation, StoreError> {
        self.calls.set(self.calls.get() + 1);
        *self.last_ignore.borrow_mut() = ignore.clone();
        if self.reject_days.contains(&candidate.day) {
            return Ok(Validation::rejected(vec![format!(
                "slot {} is closed on {}",
                candidate.slot_id, candidate.day
            )]));
        }
        Ok(Validation::accepted())
    }
}
