use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_gradebookd");
    let mut child = Command::new(exe)
        .env_remove("GRADEBOOKD_WORKSPACE")
        .env_remove("GRADEBOOKD_DEFAULT_LIMIT")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gradebookd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request_ok(
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
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn ids(page: &serde_json::Value) -> Vec<i64> {
    page["data"]
        .as_array()
        .expect("data array")
        .iter()
        .filter_map(|g| g["id"].as_i64())
        .collect()
}

/// Selects a fresh workspace and records 25 attempts for user 1. Returns the
/// grade ids in creation order.
fn seed_25(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>, dir: &std::path::Path) -> Vec<i64> {
    let _ = request_ok(
        stdin,
        reader,
        "ws",
        "workspace.select",
        json!({ "path": dir.to_string_lossy() }),
    );
    let course = request_ok(stdin, reader, "c", "courses.create", json!({ "name": "Statistics" }));
    let course_id = course["course"]["id"].as_i64().expect("course id");
    let exam = request_ok(stdin, reader, "e", "examinations.create", json!({ "name": "Quiz" }));
    let exam_id = exam["examination"]["id"].as_i64().expect("exam id");

    (0..25)
        .map(|i| {
            let g = request_ok(
                stdin,
                reader,
                &format!("g{}", i),
                "grades.create",
                json!({
                    "userId": 1,
                    "courseId": course_id,
                    "examinationId": exam_id,
                    "score": (i % 11) as f64,
                }),
            );
            g["grade"]["id"].as_i64().expect("grade id")
        })
        .collect()
}

#[test]
fn first_page_holds_the_newest_attempts() {
    let workspace = tempfile::tempdir().expect("temp dir");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let created = seed_25(&mut stdin, &mut reader, workspace.path());

    let page = request_ok(
        &mut stdin,
        &mut reader,
        "p1",
        "grades.list",
        json!({ "userId": 1, "page": 1, "limit": 10 }),
    );
    assert_eq!(page["page"].as_u64(), Some(1));
    assert_eq!(page["limit"].as_u64(), Some(10));
    assert_eq!(page["total"].as_u64(), Some(25));
    assert_eq!(page["totalPages"].as_u64(), Some(3));
    let expected: Vec<i64> = created.iter().rev().take(10).copied().collect();
    assert_eq!(ids(&page), expected);

    // Records carry their course and examination.
    assert_eq!(page["data"][0]["course"]["name"].as_str(), Some("Statistics"));
    assert_eq!(page["data"][0]["examination"]["name"].as_str(), Some("Quiz"));

    let last = request_ok(
        &mut stdin,
        &mut reader,
        "p3",
        "grades.list",
        json!({ "userId": 1, "page": 3, "limit": 10 }),
    );
    let expected: Vec<i64> = created.iter().take(5).rev().copied().collect();
    assert_eq!(ids(&last), expected);

    let beyond = request_ok(
        &mut stdin,
        &mut reader,
        "p9",
        "grades.list",
        json!({ "userId": 1, "page": 9, "limit": 10 }),
    );
    assert!(ids(&beyond).is_empty());
    assert_eq!(beyond["totalPages"].as_u64(), Some(3));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn malformed_paging_params_fall_back_to_defaults() {
    let workspace = tempfile::tempdir().expect("temp dir");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let created = seed_25(&mut stdin, &mut reader, workspace.path());

    let page = request_ok(
        &mut stdin,
        &mut reader,
        "bad",
        "grades.list",
        json!({ "userId": 1, "page": "abc", "limit": 0 }),
    );
    assert_eq!(page["page"].as_u64(), Some(1));
    assert_eq!(page["limit"].as_u64(), Some(10));
    assert_eq!(ids(&page).len(), 10);

    // Numeric strings are read the way a query string would be.
    let page = request_ok(
        &mut stdin,
        &mut reader,
        "str",
        "grades.list",
        json!({ "userId": 1, "page": "2", "limit": "20" }),
    );
    assert_eq!(page["page"].as_u64(), Some(2));
    assert_eq!(page["totalPages"].as_u64(), Some(2));
    let expected: Vec<i64> = created.iter().take(5).rev().copied().collect();
    assert_eq!(ids(&page), expected);

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn user_without_grades_gets_one_empty_page() {
    let workspace = tempfile::tempdir().expect("temp dir");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = seed_25(&mut stdin, &mut reader, workspace.path());

    let page = request_ok(&mut stdin, &mut reader, "p", "grades.list", json!({ "userId": 7 }));
    assert!(ids(&page).is_empty());
    assert_eq!(page["total"].as_u64(), Some(0));
    assert_eq!(page["totalPages"].as_u64(), Some(1));

    drop(stdin);
    let _ = child.wait();
}
