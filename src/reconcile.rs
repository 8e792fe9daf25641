//! Day-set reconciliation for class groups.
//!
//! `plan` reads the store and decides what to write; `execute` applies a plan
//! one call at a time, stopping at the first failure. Strategy selection,
//! first match wins:
//!
//! 1. same single day: update the sole row in place
//! 2. days only added, teachers/students unchanged: create the new days and
//!    leave existing rows alone
//! 3. same days, teachers/students unchanged: field-only update of every member
//! 4. anything else: delete every row of the old identity, then create fresh
//!    rows for each selected day
//!
//! In case 4 all deletes finish before the first create. A failed delete after
//! earlier deletes succeeded is reported as `PartialDeletion`; this module
//! never restores rows, the surrounding unit of work does.

use crate::conflict;
use crate::days::{normalize_days, Day};
use crate::error::{DayConflict, ScheduleError};
use crate::groups::{rescan_members, ClassGroup, ClassGroupId, GroupIdentity};
use crate::model::{check_capacity, Assignment, AssignmentData, ClassFields};
use crate::store::{AssignmentStore, ValidationGate};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Strategy {
    SingleDayUpdate,
    PureAddition,
    FieldEdit,
    General,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedUpdate {
    pub assignment_id: String,
    pub data: AssignmentData,
    /// Teacher or student set changes; the gate checks it before any write.
    pub precheck: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedDelete {
    pub assignment_id: String,
    pub day: Day,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedCreate {
    pub data: AssignmentData,
    /// Day was not covered before the edit; the gate checks it before any write.
    pub precheck: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub class_group_id: ClassGroupId,
    pub strategy: Strategy,
    pub original_days: Vec<Day>,
    pub selected_days: Vec<Day>,
    pub to_update: Vec<PlannedUpdate>,
    pub to_create: Vec<PlannedCreate>,
    pub to_delete: Vec<PlannedDelete>,
    pub conflicts: Vec<DayConflict>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    pub created: Vec<Assignment>,
    pub updated: Vec<Assignment>,
    pub deleted_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlanOptions {
    /// Also rewrite subject/notes/color of existing rows on a pure addition.
    pub refresh_existing_on_add: bool,
}

pub struct EditRequest<'a> {
    pub group: &'a ClassGroup,
    pub selected_days: Vec<Day>,
    pub fields: ClassFields,
}

fn day_conflict(day: Day, report: conflict::ConflictReport) -> Option<DayConflict> {
    report.conflict.then(|| DayConflict {
        day,
        conflicting_teacher_ids: report.conflicting_teacher_ids,
        conflicting_student_ids: report.conflicting_student_ids,
    })
}

/// Rewrites only the non-structural fields of an existing row.
fn with_fields(row: &Assignment, fields: &ClassFields) -> AssignmentData {
    let mut data = row.data.clone();
    data.subject = fields.subject.clone();
    data.notes = fields.notes.clone();
    data.color = fields.color.clone();
    data
}

pub fn plan<S>(store: &S, req: &EditRequest<'_>, opts: PlanOptions) -> Result<Plan, ScheduleError>
where
    S: AssignmentStore + ?Sized,
{
    let fields = req.fields.clone().normalized();
    check_capacity(fields.teachers.len(), fields.student_ids.len())?;

    let selected = normalize_days(req.selected_days.iter().copied());
    if selected.is_empty() {
        return Err(ScheduleError::EmptyDaySet);
    }

    let group = req.group;
    let identity = &group.identity;
    let slot_id = identity.slot_id.as_str();
    let original = group.days.clone();
    let original_set: BTreeSet<Day> = original.iter().copied().collect();
    let selected_set: BTreeSet<Day> = selected.iter().copied().collect();
    let added: Vec<Day> = selected_set.difference(&original_set).copied().collect();
    let removed_any = original_set.difference(&selected_set).next().is_some();

    let new_teachers: BTreeSet<String> =
        fields.teachers.iter().map(|t| t.teacher_id.clone()).collect();
    let new_students: BTreeSet<String> = fields.student_ids.iter().cloned().collect();
    let topology_unchanged =
        new_teachers == identity.teacher_ids && new_students == identity.student_ids;

    let mut plan = Plan {
        class_group_id: group.id.clone(),
        strategy: Strategy::General,
        original_days: original.clone(),
        selected_days: selected.clone(),
        to_update: Vec::new(),
        to_create: Vec::new(),
        to_delete: Vec::new(),
        conflicts: Vec::new(),
    };

    if selected == original && original.len() == 1 {
        plan.strategy = Strategy::SingleDayUpdate;
        let day = original[0];
        let data = fields.for_day(day, slot_id);
        if !topology_unchanged {
            let ignore: HashSet<String> = group.members_on(day).map(|m| m.id.clone()).collect();
            let report = conflict::detect(store, &data.candidate(), &ignore)?;
            plan.conflicts.extend(day_conflict(day, report));
        }
        for m in group.members_on(day) {
            plan.to_update.push(PlannedUpdate {
                assignment_id: m.id.clone(),
                data: data.clone(),
                precheck: !topology_unchanged,
            });
        }
    } else if !removed_any && !added.is_empty() && topology_unchanged {
        plan.strategy = Strategy::PureAddition;
        for &day in &added {
            let data = fields.for_day(day, slot_id);
            let report = conflict::detect(store, &data.candidate(), &HashSet::new())?;
            plan.conflicts.extend(day_conflict(day, report));
            plan.to_create.push(PlannedCreate {
                data,
                precheck: true,
            });
        }
        if opts.refresh_existing_on_add {
            for m in &group.member_assignments {
                plan.to_update.push(PlannedUpdate {
                    assignment_id: m.id.clone(),
                    data: with_fields(m, &fields),
                    precheck: false,
                });
            }
        }
    } else if selected == original && topology_unchanged {
        plan.strategy = Strategy::FieldEdit;
        for m in &group.member_assignments {
            let mut data = with_fields(m, &fields);
            // Same id set; only substitute flags can differ.
            data.teachers = fields.teachers.clone();
            plan.to_update.push(PlannedUpdate {
                assignment_id: m.id.clone(),
                data,
                precheck: false,
            });
        }
    } else {
        plan.strategy = Strategy::General;
        for row in rescan_members(store, identity, &original)? {
            plan.to_delete.push(PlannedDelete {
                assignment_id: row.id,
                day: row.data.day,
            });
        }
        let ignore: HashSet<String> = plan
            .to_delete
            .iter()
            .map(|d| d.assignment_id.clone())
            .collect();
        for &day in &selected {
            let data = fields.for_day(day, slot_id);
            let report = conflict::detect(store, &data.candidate(), &ignore)?;
            plan.conflicts.extend(day_conflict(day, report));
            plan.to_create.push(PlannedCreate {
                data,
                precheck: !original_set.contains(&day),
            });
        }
    }

    debug!(
        class_group_id = %plan.class_group_id,
        strategy = ?plan.strategy,
        updates = plan.to_update.len(),
        creates = plan.to_create.len(),
        deletes = plan.to_delete.len(),
        conflicts = plan.conflicts.len(),
        "planned class edit"
    );
    Ok(plan)
}

fn validate_before_write<G>(
    gate: &G,
    data: &AssignmentData,
    ignore: &HashSet<String>,
) -> Result<(), ScheduleError>
where
    G: ValidationGate + ?Sized,
{
    let v = gate.validate(&data.candidate(), ignore)?;
    if v.valid {
        return Ok(());
    }
    warn!(day = %data.day, slot_id = %data.slot_id, errors = ?v.errors, "validation gate rejected candidate");
    Err(ScheduleError::ValidationRejected {
        day: data.day,
        errors: v.errors,
    })
}

fn create_validated<S, G>(
    store: &mut S,
    gate: &G,
    creates: &[PlannedCreate],
    out: &mut Outcome,
) -> Result<(), ScheduleError>
where
    S: AssignmentStore + ?Sized,
    G: ValidationGate + ?Sized,
{
    for c in creates {
        validate_before_write(gate, &c.data, &HashSet::new())?;
        out.created.push(store.create(&c.data)?);
    }
    Ok(())
}

fn delete_sweep<S>(store: &mut S, ids: &[String], out: &mut Outcome) -> Result<(), ScheduleError>
where
    S: AssignmentStore + ?Sized,
{
    for id in ids {
        if let Err(e) = store.delete(id) {
            if out.deleted_ids.is_empty() {
                return Err(ScheduleError::Store(e));
            }
            warn!(failed_id = %id, deleted = out.deleted_ids.len(), error = %e, "delete sweep stopped part way");
            return Err(ScheduleError::PartialDeletion {
                deleted: out.deleted_ids.clone(),
                failed_id: id.clone(),
                source: e,
            });
        }
        out.deleted_ids.push(id.clone());
    }
    Ok(())
}

pub fn execute<S, G>(store: &mut S, gate: &G, plan: &Plan) -> Result<Outcome, ScheduleError>
where
    S: AssignmentStore + ?Sized,
    G: ValidationGate + ?Sized,
{
    if !plan.conflicts.is_empty() {
        warn!(class_group_id = %plan.class_group_id, days = plan.conflicts.len(), "class edit blocked by conflicts");
        return Err(ScheduleError::Conflict(plan.conflicts.clone()));
    }

    info!(
        class_group_id = %plan.class_group_id,
        strategy = ?plan.strategy,
        "reconciling class days"
    );

    let mut out = Outcome::default();
    match plan.strategy {
        Strategy::SingleDayUpdate | Strategy::FieldEdit => {
            let replaced: HashSet<String> = plan
                .to_update
                .iter()
                .map(|u| u.assignment_id.clone())
                .collect();
            for u in plan.to_update.iter().filter(|u| u.precheck) {
                validate_before_write(gate, &u.data, &replaced)?;
            }
            for u in &plan.to_update {
                out.updated.push(store.update(&u.assignment_id, &u.data)?);
            }
        }
        Strategy::PureAddition => {
            for c in plan.to_create.iter().filter(|c| c.precheck) {
                validate_before_write(gate, &c.data, &HashSet::new())?;
            }
            create_validated(store, gate, &plan.to_create, &mut out)?;
            for u in &plan.to_update {
                out.updated.push(store.update(&u.assignment_id, &u.data)?);
            }
        }
        Strategy::General => {
            for c in plan.to_create.iter().filter(|c| c.precheck) {
                validate_before_write(gate, &c.data, &HashSet::new())?;
            }
            let ids: Vec<String> = plan
                .to_delete
                .iter()
                .map(|d| d.assignment_id.clone())
                .collect();
            delete_sweep(store, &ids, &mut out)?;
            create_validated(store, gate, &plan.to_create, &mut out)?;
        }
    }

    info!(
        class_group_id = %plan.class_group_id,
        created = out.created.len(),
        updated = out.updated.len(),
        deleted = out.deleted_ids.len(),
        "class days reconciled"
    );
    Ok(out)
}

pub fn reconcile<S, G>(
    store: &mut S,
    gate: &G,
    req: &EditRequest<'_>,
    opts: PlanOptions,
) -> Result<(Plan, Outcome), ScheduleError>
where
    S: AssignmentStore + ?Sized,
    G: ValidationGate + ?Sized,
{
    let plan = plan(&*store, req, opts)?;
    let outcome = execute(store, gate, &plan)?;
    Ok((plan, outcome))
}

/// Creates one row per (day, slot). Conflicts on any target abort before the
/// first write; the gate then checks each row right before it is created.
pub fn create_class<S, G>(
    store: &mut S,
    gate: &G,
    days: &[Day],
    slot_ids: &[String],
    fields: &ClassFields,
) -> Result<Vec<Assignment>, ScheduleError>
where
    S: AssignmentStore + ?Sized,
    G: ValidationGate + ?Sized,
{
    let fields = fields.clone().normalized();
    check_capacity(fields.teachers.len(), fields.student_ids.len())?;
    let days = normalize_days(days.iter().copied());
    if days.is_empty() {
        return Err(ScheduleError::EmptyDaySet);
    }

    let mut rows = Vec::new();
    let mut by_day: BTreeMap<Day, (BTreeSet<String>, BTreeSet<String>)> = BTreeMap::new();
    for &day in &days {
        for slot_id in slot_ids {
            let data = fields.for_day(day, slot_id);
            let report = conflict::detect(&*store, &data.candidate(), &HashSet::new())?;
            if report.conflict {
                let entry = by_day.entry(day).or_default();
                entry.0.extend(report.conflicting_teacher_ids);
                entry.1.extend(report.conflicting_student_ids);
            }
            rows.push(data);
        }
    }
    if !by_day.is_empty() {
        let conflicts = by_day
            .into_iter()
            .map(|(day, (t, s))| DayConflict {
                day,
                conflicting_teacher_ids: t.into_iter().collect(),
                conflicting_student_ids: s.into_iter().collect(),
            })
            .collect();
        return Err(ScheduleError::Conflict(conflicts));
    }

    let mut created = Vec::new();
    for data in &rows {
        validate_before_write(gate, data, &HashSet::new())?;
        created.push(store.create(data)?);
    }
    info!(rows = created.len(), days = days.len(), "class created");
    Ok(created)
}

pub fn create_assignment<S, G>(
    store: &mut S,
    gate: &G,
    data: &AssignmentData,
) -> Result<Assignment, ScheduleError>
where
    S: AssignmentStore + ?Sized,
    G: ValidationGate + ?Sized,
{
    check_capacity(data.teachers.len(), data.student_ids.len())?;
    let report = conflict::detect(&*store, &data.candidate(), &HashSet::new())?;
    if let Some(c) = day_conflict(data.day, report) {
        return Err(ScheduleError::Conflict(vec![c]));
    }
    validate_before_write(gate, data, &HashSet::new())?;
    Ok(store.create(data)?)
}

/// Single-row edit; the row itself is ignored when looking for conflicts.
pub fn update_assignment<S, G>(
    store: &mut S,
    gate: &G,
    id: &str,
    data: &AssignmentData,
) -> Result<Assignment, ScheduleError>
where
    S: AssignmentStore + ?Sized,
    G: ValidationGate + ?Sized,
{
    check_capacity(data.teachers.len(), data.student_ids.len())?;
    let ignore: HashSet<String> = [id.to_string()].into_iter().collect();
    let report = conflict::detect(&*store, &data.candidate(), &ignore)?;
    if let Some(c) = day_conflict(data.day, report) {
        return Err(ScheduleError::Conflict(vec![c]));
    }
    validate_before_write(gate, data, &ignore)?;
    Ok(store.update(id, data)?)
}

/// Group-wide delete sweep. Rows are found again by identity on every day.
pub fn delete_group<S>(store: &mut S, identity: &GroupIdentity) -> Result<Vec<String>, ScheduleError>
where
    S: AssignmentStore + ?Sized,
{
    let ids: Vec<String> = rescan_members(&*store, identity, &Day::ALL)?
        .into_iter()
        .map(|r| r.id)
        .collect();
    let mut out = Outcome::default();
    delete_sweep(store, &ids, &mut out)?;
    info!(class_group_id = %identity.id(), deleted = out.deleted_ids.len(), "class group deleted");
    Ok(out.deleted_ids)
}
