//! Assignment store and validation gate seams consumed by the scheduling core.

#[cfg(test)]
pub mod memory;
pub mod sqlite;

use crate::days::Day;
use crate::error::StoreError;
use crate::model::{Assignment, AssignmentData, Candidate};
use serde::Serialize;
use std::collections::HashSet;

pub use sqlite::SqliteStore;

/// CRUD over per-day assignment rows. Implementations address days through
/// the injected day/date table.
pub trait AssignmentStore {
    fn list(&self, day: Day) -> Result<Vec<Assignment>, StoreError>;
    fn create(&mut self, data: &AssignmentData) -> Result<Assignment, StoreError>;
    fn update(&mut self, id: &str, data: &AssignmentData) -> Result<Assignment, StoreError>;
    fn delete(&mut self, id: &str) -> Result<(), StoreError>;

    fn list_week(&self) -> Result<Vec<Assignment>, StoreError> {
        let mut out = Vec::new();
        for day in Day::ALL {
            out.extend(self.list(day)?);
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Validation {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl Validation {
    pub fn accepted() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn rejected(errors: Vec<String>) -> Self {
        Self {
            valid: false,
            errors,
        }
    }
}

/// Authoritative point-in-time check run immediately before every write.
/// Rows in `ignore` are the ones the write replaces and never count as
/// conflicts.
pub trait ValidationGate {
    fn validate(
        &self,
        candidate: &Candidate,
        ignore: &HashSet<String>,
    ) -> Result<Validation, StoreError>;
}
