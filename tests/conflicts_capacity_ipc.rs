mod test_support;

use serde_json::json;
use test_support::{class_fields, error_code, request, request_ok, seed_workspace, spawn_sidecar};

fn assignment(day: &str, slot: &str, teachers: &[&String], students: &[&String]) -> serde_json::Value {
    json!({
        "day": day,
        "slotId": slot,
        "teachers": teachers.iter().map(|t| json!({ "teacherId": t })).collect::<Vec<_>>(),
        "studentIds": students,
        "subject": "Math",
    })
}

#[test]
fn check_reports_overlap_and_skips_exact_siblings() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (t, s) = seed_workspace(
        &mut stdin,
        &mut reader,
        "tutord-conflicts",
        &["Ana", "Bo"],
        &["Cy", "Di", "Ed"],
    );

    let existing = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "assignments.create",
        json!({ "assignment": assignment("tue", "s3", &[&t[0]], &[&s[0], &s[1]]) }),
    );
    let existing_id = existing["assignment"]["id"].as_str().expect("id").to_string();

    // Shares one student with the existing row.
    let overlap = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "conflicts.check",
        json!({ "candidate": { "day": "tue", "slotId": "s3", "teacherIds": [t[1]], "studentIds": [s[1], s[2]] } }),
    );
    assert_eq!(overlap["conflict"], true);
    assert_eq!(overlap["conflictingTeacherIds"], json!([]));
    assert_eq!(overlap["conflictingStudentIds"], json!([s[1]]));

    // Same teacher and student sets: a sibling, never a conflict.
    let sibling = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "conflicts.check",
        json!({ "candidate": { "day": "tue", "slotId": "s3", "teacherIds": [t[0]], "studentIds": [s[1], s[0]] } }),
    );
    assert_eq!(sibling["conflict"], false);

    let other_day = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "conflicts.check",
        json!({ "candidate": { "day": "wed", "slotId": "s3", "teacherIds": [t[0]], "studentIds": [s[2]] } }),
    );
    assert_eq!(other_day["conflict"], false);

    let ignored = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "conflicts.check",
        json!({
            "candidate": { "day": "tue", "slotId": "s3", "teacherIds": [t[0]], "studentIds": [s[2]] },
            "ignoreAssignmentIds": [existing_id],
        }),
    );
    assert_eq!(ignored["conflict"], false);

    let probe = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "conflicts.probe",
        json!({ "candidate": { "day": "tue", "slotId": "s3", "teacherIds": [t[0]], "studentIds": [s[2]] } }),
    );
    assert_eq!(probe["conflictingTeacherIds"], json!([t[0]]));
}

#[test]
fn create_and_update_refuse_conflicts() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (t, s) = seed_workspace(&mut stdin, &mut reader, "tutord-create-conflict", &["Ana"], &["Cy", "Di"]);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "assignments.create",
        json!({ "assignment": assignment("mon", "s1", &[&t[0]], &[&s[0]]) }),
    );
    let clash = request(
        &mut stdin,
        &mut reader,
        "2",
        "assignments.create",
        json!({ "assignment": assignment("mon", "s1", &[&t[0]], &[&s[1]]) }),
    );
    assert_eq!(error_code(&clash), Some("conflict"));
    assert_eq!(
        clash.pointer("/error/details/days/mon/conflictingTeacherIds"),
        Some(&json!([t[0]]))
    );

    let second = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "assignments.create",
        json!({ "assignment": assignment("mon", "s2", &[&t[0]], &[&s[1]]) }),
    );
    let second_id = second["assignment"]["id"].as_str().expect("id").to_string();

    // Moving the second row onto s1 would double-book the teacher.
    let moved = request(
        &mut stdin,
        &mut reader,
        "4",
        "assignments.update",
        json!({
            "assignmentId": second_id,
            "assignment": assignment("mon", "s1", &[&t[0]], &[&s[1]]),
        }),
    );
    assert_eq!(error_code(&moved), Some("conflict"));

    // Editing the row in place does not conflict with itself.
    let mut same = assignment("mon", "s2", &[&t[0]], &[&s[1]]);
    same["notes"] = json!("moved to room 4");
    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "assignments.update",
        json!({ "assignmentId": second_id, "assignment": same }),
    );
    assert_eq!(updated["assignment"]["notes"], "moved to room 4");
    let fetched = request_ok(
        &mut stdin,
        &mut reader,
        "5b",
        "assignments.get",
        json!({ "assignmentId": second_id }),
    );
    assert_eq!(fetched["assignment"]["notes"], "moved to room 4");
    assert_eq!(fetched["assignment"]["studentIds"], json!([s[1]]));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "assignments.delete",
        json!({ "assignmentId": second_id }),
    );
    let gone = request(
        &mut stdin,
        &mut reader,
        "7",
        "assignments.delete",
        json!({ "assignmentId": second_id }),
    );
    assert_eq!(error_code(&gone), Some("not_found"));
}

#[test]
fn capacity_limits_are_enforced_before_any_write() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (t, s) = seed_workspace(
        &mut stdin,
        &mut reader,
        "tutord-capacity",
        &["Ana", "Bo", "Cal"],
        &["S1", "S2", "S3", "S4", "S5", "S6"],
    );

    let too_many_teachers = request(
        &mut stdin,
        &mut reader,
        "1",
        "assignments.create",
        json!({ "assignment": assignment("mon", "s1", &[&t[0], &t[1], &t[2]], &[&s[0]]) }),
    );
    assert_eq!(error_code(&too_many_teachers), Some("capacity_exceeded"));

    let students: Vec<&String> = s.iter().collect();
    let too_many_students = request(
        &mut stdin,
        &mut reader,
        "2",
        "classes.create",
        json!({
            "days": ["mon", "tue"],
            "startSlotId": "s1",
            "fields": class_fields(&[&t[0]], &students, "Choir"),
        }),
    );
    assert_eq!(error_code(&too_many_students), Some("capacity_exceeded"));
    assert_eq!(
        too_many_students.pointer("/error/details/maxStudents"),
        Some(&json!(5))
    );

    let at_limit = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "classes.create",
        json!({
            "days": ["mon"],
            "startSlotId": "s1",
            "fields": class_fields(&[&t[0], &t[1]], &students[..5], "Choir"),
        }),
    );
    assert_eq!(at_limit["assignments"].as_array().expect("rows").len(), 1);

    let rows = request_ok(&mut stdin, &mut reader, "4", "assignments.list", json!({}));
    assert_eq!(rows["assignments"].as_array().expect("rows").len(), 1);
}

#[test]
fn unknown_teacher_is_rejected_by_the_gate() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (_t, s) = seed_workspace(&mut stdin, &mut reader, "tutord-unknown-teacher", &["Ana"], &["Cy"]);
    let ghost = "no-such-teacher".to_string();

    let resp = request(
        &mut stdin,
        &mut reader,
        "1",
        "assignments.create",
        json!({ "assignment": assignment("fri", "s1", &[&ghost], &[&s[0]]) }),
    );
    assert_eq!(error_code(&resp), Some("validation_rejected"));
    let errors = resp
        .pointer("/error/details/errors")
        .and_then(|v| v.as_array())
        .expect("errors");
    assert!(errors
        .iter()
        .any(|e| e.as_str().unwrap_or("").contains("no-such-teacher")));
}

#[test]
fn oversize_class_is_rejected_before_slot_or_group_lookup() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (t, s) = seed_workspace(
        &mut stdin,
        &mut reader,
        "tutord-capacity-first",
        &["Ana", "Bo", "Cal"],
        &["S1"],
    );
    let three = class_fields(&[&t[0], &t[1], &t[2]], &[&s[0]], "Math");

    let bad_slot = request(
        &mut stdin,
        &mut reader,
        "1",
        "classes.create",
        json!({ "days": ["mon"], "startSlotId": "no-such-slot", "fields": three }),
    );
    assert_eq!(error_code(&bad_slot), Some("capacity_exceeded"));

    let unknown_group = request(
        &mut stdin,
        &mut reader,
        "2",
        "classes.reconcile",
        json!({ "classGroupId": "0".repeat(32), "selectedDays": ["mon"], "fields": three }),
    );
    assert_eq!(error_code(&unknown_group), Some("capacity_exceeded"));

    let planned = request(
        &mut stdin,
        &mut reader,
        "3",
        "classes.plan",
        json!({ "classGroupId": "0".repeat(32), "selectedDays": ["mon"], "fields": three }),
    );
    assert_eq!(error_code(&planned), Some("capacity_exceeded"));
}

#[test]
fn single_rows_are_normalized_like_class_fields() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (t, s) = seed_workspace(&mut stdin, &mut reader, "tutord-normalize", &["Ana"], &["Ben"]);

    let mut data = assignment("mon", "s1", &[&t[0], &t[0], &t[0]], &[&s[0], &s[0]]);
    data["subject"] = json!("  Math ");
    let created = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "assignments.create",
        json!({ "assignment": data }),
    );
    let row = &created["assignment"];
    assert_eq!(row["teachers"].as_array().expect("teachers").len(), 1);
    assert_eq!(row["studentIds"], json!([s[0]]));
    assert_eq!(row["subject"], "Math");
    let id = row["id"].as_str().expect("id").to_string();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "classes.create",
        json!({
            "days": ["wed"],
            "startSlotId": "s1",
            "fields": class_fields(&[&t[0]], &[&s[0]], "Math"),
        }),
    );
    let groups = request_ok(&mut stdin, &mut reader, "3", "groups.list", json!({}));
    let groups = groups["groups"].as_array().expect("groups");
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["days"], json!(["mon", "wed"]));

    let mut edit = assignment("mon", "s1", &[&t[0], &t[0]], &[&s[0]]);
    edit["subject"] = json!(" Math\t");
    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "assignments.update",
        json!({ "assignmentId": id, "assignment": edit }),
    );
    assert_eq!(updated["assignment"]["teachers"].as_array().expect("teachers").len(), 1);
    assert_eq!(updated["assignment"]["subject"], "Math");
}
