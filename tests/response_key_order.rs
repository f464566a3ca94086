use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_gradebookd");
    let mut child = Command::new(exe)
        .env_remove("GRADEBOOKD_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gradebookd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

/// The response exactly as written on stdout.
fn request_line(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> String {
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
    assert_eq!(value["ok"].as_bool(), Some(true), "{} failed: {}", method, line);
    line.trim().to_string()
}

fn created_id(line: &str, key: &str) -> i64 {
    let value: serde_json::Value = serde_json::from_str(line).expect("parse response json");
    value["result"][key]["id"]
        .as_i64()
        .unwrap_or_else(|| panic!("{} id in {}", key, line))
}

/// Byte offsets of each needle in `line`, in the order given.
fn positions(line: &str, needles: &[&str]) -> Vec<usize> {
    needles
        .iter()
        .map(|n| line.find(n).unwrap_or_else(|| panic!("{} missing in {}", n, line)))
        .collect()
}

fn is_ascending(v: &[usize]) -> bool {
    v.windows(2).all(|w| w[0] < w[1])
}

#[test]
fn histogram_buckets_are_written_in_numeric_order() {
    let workspace = tempfile::tempdir().expect("temp dir");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_line(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.path().to_string_lossy() }),
    );

    let full = request_line(&mut stdin, &mut reader, "f", "stats.fullDistribution", json!({ "userId": 1 }));
    let expected: String = (0..=10)
        .map(|b| format!("\"{}\":0", b))
        .collect::<Vec<_>>()
        .join(",");
    assert!(
        full.contains(&format!("{{\"fullGradeDistribution\":{{{}}}}}", expected)),
        "{}",
        full
    );

    let avg = request_line(&mut stdin, &mut reader, "a", "stats.average", json!({ "userId": 1 }));
    let expected: String = (5..=10)
        .map(|b| format!("\"{}\":0", b))
        .collect::<Vec<_>>()
        .join(",");
    assert!(
        avg.contains(&format!("\"gradeDistribution\":{{{}}}", expected)),
        "{}",
        avg
    );

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn roster_groups_follow_semester_id_not_name() {
    let workspace = tempfile::tempdir().expect("temp dir");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_line(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.path().to_string_lossy() }),
    );

    // Created first, so it has the lower id despite sorting later by name.
    let second = created_id(
        &request_line(&mut stdin, &mut reader, "s1", "semesters.create", json!({ "name": "B-second" })),
        "semester",
    );
    let first = created_id(
        &request_line(&mut stdin, &mut reader, "s2", "semesters.create", json!({ "name": "A-first" })),
        "semester",
    );
    let loose = created_id(
        &request_line(&mut stdin, &mut reader, "c0", "courses.create", json!({ "name": "Loose" })),
        "course",
    );
    let in_first = created_id(
        &request_line(
            &mut stdin,
            &mut reader,
            "c1",
            "courses.create",
            json!({ "name": "Alpha", "semesterId": first }),
        ),
        "course",
    );
    let in_second = created_id(
        &request_line(
            &mut stdin,
            &mut reader,
            "c2",
            "courses.create",
            json!({ "name": "Beta", "semesterId": second }),
        ),
        "course",
    );
    let exam = created_id(
        &request_line(&mut stdin, &mut reader, "e", "examinations.create", json!({ "name": "Final" })),
        "examination",
    );
    for (i, course) in [loose, in_first, in_second].into_iter().enumerate() {
        let _ = request_line(
            &mut stdin,
            &mut reader,
            &format!("g{}", i),
            "grades.create",
            json!({ "userId": 1, "courseId": course, "examinationId": exam, "score": 7 }),
        );
    }

    let passed = request_line(&mut stdin, &mut reader, "p", "courses.passed", json!({ "userId": 1 }));
    let order = positions(&passed, &["\"B-second\":[", "\"A-first\":[", "\"Unspecified\":["]);
    assert!(is_ascending(&order), "{}", passed);

    // The all-courses roster keeps store order: Loose, then Alpha, then Beta.
    let all = request_line(&mut stdin, &mut reader, "l", "courses.list", json!({}));
    let order = positions(&all, &["\"unspecified\":[", "\"A-first\":[", "\"B-second\":["]);
    assert!(is_ascending(&order), "{}", all);

    drop(stdin);
    let _ = child.wait();
}
