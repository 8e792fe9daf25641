#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_tutord");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn tutord");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

pub fn error_code(value: &serde_json::Value) -> Option<&str> {
    value.pointer("/error/code").and_then(|v| v.as_str())
}

/// Opens a fresh workspace with one teacher per name in `teachers`, one
/// student per name in `students` and four back-to-back 25 minute slots
/// `s1`..`s4`. Returns (teacher ids, student ids).
pub fn seed_workspace(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    prefix: &str,
    teachers: &[&str],
    students: &[&str],
) -> (Vec<String>, Vec<String>) {
    let workspace = temp_dir(prefix);
    let _ = request_ok(
        stdin,
        reader,
        "seed-ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let times = [("s1", "15:00", "15:25"), ("s2", "15:25", "15:50"), ("s3", "15:50", "16:15"), ("s4", "16:15", "16:40")];
    for (i, (id, start, end)) in times.iter().enumerate() {
        let _ = request_ok(
            stdin,
            reader,
            &format!("seed-slot-{}", i),
            "slots.create",
            json!({ "slotId": id, "name": id, "startTime": start, "endTime": end, "sortOrder": i }),
        );
    }
    let mut teacher_ids = Vec::new();
    for (i, name) in teachers.iter().enumerate() {
        let res = request_ok(
            stdin,
            reader,
            &format!("seed-t-{}", i),
            "teachers.create",
            json!({ "name": name }),
        );
        teacher_ids.push(res["teacherId"].as_str().expect("teacherId").to_string());
    }
    let mut student_ids = Vec::new();
    for (i, name) in students.iter().enumerate() {
        let res = request_ok(
            stdin,
            reader,
            &format!("seed-s-{}", i),
            "students.create",
            json!({ "name": name }),
        );
        student_ids.push(res["studentId"].as_str().expect("studentId").to_string());
    }
    (teacher_ids, student_ids)
}

pub fn class_fields(teachers: &[&String], students: &[&String], subject: &str) -> serde_json::Value {
    json!({
        "teachers": teachers.iter().map(|t| json!({ "teacherId": t })).collect::<Vec<_>>(),
        "studentIds": students,
        "subject": subject,
    })
}
