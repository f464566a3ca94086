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

fn created_id(result: &serde_json::Value, key: &str) -> i64 {
    result
        .get(key)
        .and_then(|v| v.get("id"))
        .and_then(|v| v.as_i64())
        .unwrap_or_else(|| panic!("{} id in {}", key, result))
}

struct Fixture {
    _workspace: tempfile::TempDir,
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    math: i64,
    physics: i64,
    history: i64,
    art: i64,
    exam: i64,
}

/// Fall 2025 holds Math and Physics, Spring 2026 holds Art, History has no
/// semester.
fn seeded() -> Fixture {
    let workspace = tempfile::tempdir().expect("temp dir");
    let (child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.path().to_string_lossy() }),
    );

    let fall = created_id(
        &request_ok(&mut stdin, &mut reader, "s1", "semesters.create", json!({ "name": "Fall 2025" })),
        "semester",
    );
    let spring = created_id(
        &request_ok(&mut stdin, &mut reader, "s2", "semesters.create", json!({ "name": "Spring 2026" })),
        "semester",
    );

    let mut course = |id: &str, name: &str, semester: Option<i64>| {
        created_id(
            &request_ok(
                &mut stdin,
                &mut reader,
                id,
                "courses.create",
                json!({ "name": name, "semesterId": semester }),
            ),
            "course",
        )
    };
    // Art is created first so its id is lower than Math's.
    let art = course("c1", "Art", Some(spring));
    let math = course("c2", "Math", Some(fall));
    let physics = course("c3", "Physics", Some(fall));
    let history = course("c4", "History", None);

    let exam = created_id(
        &request_ok(&mut stdin, &mut reader, "e1", "examinations.create", json!({ "name": "Final" })),
        "examination",
    );

    Fixture {
        _workspace: workspace,
        child,
        stdin,
        reader,
        math,
        physics,
        history,
        art,
        exam,
    }
}

fn grade(f: &mut Fixture, id: &str, user: i64, course: i64, score: f64) {
    let exam = f.exam;
    let _ = request_ok(
        &mut f.stdin,
        &mut f.reader,
        id,
        "grades.create",
        json!({ "userId": user, "courseId": course, "examinationId": exam, "score": score }),
    );
}

#[test]
fn passed_roster_lists_each_course_once_with_its_best_score() {
    let mut f = seeded();
    let (math, physics, history, art) = (f.math, f.physics, f.history, f.art);
    grade(&mut f, "g1", 1, math, 7.5);
    grade(&mut f, "g2", 1, math, 9.5);
    grade(&mut f, "g3", 1, physics, 4.0);
    grade(&mut f, "g4", 1, history, 6.0);
    grade(&mut f, "g5", 1, art, 5.0);
    grade(&mut f, "g6", 2, physics, 10.0);

    let roster = request_ok(&mut f.stdin, &mut f.reader, "p", "courses.passed", json!({ "userId": 1 }));
    let groups = roster.as_object().expect("roster object");
    let keys: Vec<&str> = groups.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["Fall 2025", "Spring 2026", "Unspecified"]);

    let fall = roster["Fall 2025"].as_array().expect("fall group");
    assert_eq!(fall.len(), 1, "failed physics must not appear: {}", roster);
    assert_eq!(fall[0]["courseId"].as_i64(), Some(math));
    assert_eq!(fall[0]["courseName"].as_str(), Some("Math"));
    assert_eq!(fall[0]["highestGrade"].as_f64(), Some(9.5));

    assert_eq!(roster["Spring 2026"][0]["courseName"].as_str(), Some("Art"));
    assert_eq!(roster["Unspecified"][0]["courseId"].as_i64(), Some(history));

    let _ = f.child.kill();
    let _ = f.child.wait();
}

#[test]
fn passed_roster_is_empty_without_passing_grades() {
    let mut f = seeded();
    let math = f.math;
    grade(&mut f, "g1", 1, math, 4.99);

    let roster = request_ok(&mut f.stdin, &mut f.reader, "p", "courses.passed", json!({ "userId": 1 }));
    assert_eq!(roster, json!({}));

    let _ = f.child.kill();
    let _ = f.child.wait();
}

#[test]
fn course_list_groups_every_course_under_lowercase_fallback() {
    let mut f = seeded();
    let history = f.history;

    let all = request_ok(&mut f.stdin, &mut f.reader, "l", "courses.list", json!({}));
    let fall = all["Fall 2025"].as_array().expect("fall group");
    let names: Vec<&str> = fall.iter().filter_map(|c| c["name"].as_str()).collect();
    assert_eq!(names, vec!["Math", "Physics"]);
    assert_eq!(all["Spring 2026"].as_array().map(Vec::len), Some(1));

    assert!(all.get("Unspecified").is_none());
    let loose = all["unspecified"].as_array().expect("unspecified group");
    assert_eq!(loose[0]["id"].as_i64(), Some(history));
    assert_eq!(loose[0]["semesterId"], serde_json::Value::Null);

    let _ = f.child.kill();
    let _ = f.child.wait();
}

#[test]
fn course_search_and_delete() {
    let mut f = seeded();
    let math = f.math;
    grade(&mut f, "g1", 1, math, 8.0);

    let hits = request_ok(&mut f.stdin, &mut f.reader, "q", "courses.search", json!({ "query": "at" }));
    let names: Vec<&str> = hits["results"]
        .as_array()
        .expect("results")
        .iter()
        .filter_map(|c| c["name"].as_str())
        .collect();
    assert_eq!(names, vec!["Math"]);

    let _ = request_ok(&mut f.stdin, &mut f.reader, "d", "courses.delete", json!({ "id": math }));
    let stats = request_ok(&mut f.stdin, &mut f.reader, "a", "stats.average", json!({ "userId": 1 }));
    assert_eq!(stats["totalCourses"].as_i64(), Some(0));

    let _ = f.child.kill();
    let _ = f.child.wait();
}
