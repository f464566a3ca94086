use crate::engine::aggregate::{course_roster, passed_roster, PASS_THRESHOLD};
use crate::engine::course_view::{
    course_attempt_table, load_course_attempts, load_course_summary, Timeline, TimelineResponse,
};
use crate::engine::pager::PageRequest;
use crate::engine::EngineError;
use crate::ipc::error::{engine_err, err, ok, ok_serialized};
use crate::ipc::helpers::{
    db_conn, id_by_name, is_unique_violation, optional_id, required_id, required_name,
    row_exists, search_query, user_id,
};
use crate::ipc::types::{AppState, Request};
use crate::store::{CourseFilter, CourseOrder, GradeFilter, GradeOrder, RecordStore, SqliteStore};
use serde_json::json;

const SEARCH_LIMIT: u64 = 10;

fn handle_courses_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let name = match required_name(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let semester_id = match optional_id(req, "semesterId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    if let Some(sid) = semester_id {
        match row_exists(conn, "semesters", sid) {
            Ok(true) => {}
            Ok(false) => return engine_err(&req.id, &EngineError::not_found("semester", sid)),
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        }
    }

    match id_by_name(conn, "courses", &name) {
        Ok(Some(_)) => {
            return engine_err(
                &req.id,
                &EngineError::Conflict("course with this name already exists".to_string()),
            )
        }
        Ok(None) => {}
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    match conn.execute(
        "INSERT INTO courses(name, semester_id) VALUES(?, ?)",
        (&name, semester_id),
    ) {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            return engine_err(
                &req.id,
                &EngineError::Conflict("course with this name already exists".to_string()),
            )
        }
        Err(e) => {
            return err(
                &req.id,
                "db_insert_failed",
                e.to_string(),
                Some(json!({ "table": "courses" })),
            )
        }
    }
    let id = conn.last_insert_rowid();
    tracing::info!(course_id = id, ?semester_id, "course created");

    match SqliteStore::new(conn).get_course(id) {
        Ok(Some(course)) => ok(&req.id, json!({ "course": course })),
        Ok(None) => engine_err(&req.id, &EngineError::not_found("course", id)),
        Err(e) => engine_err(&req.id, &EngineError::from(e)),
    }
}

fn handle_courses_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({}));
    };

    match SqliteStore::new(conn).list_courses(&CourseFilter::default()) {
        Ok(courses) => ok_serialized(&req.id, &course_roster(courses)),
        Err(e) => engine_err(&req.id, &EngineError::from(e)),
    }
}

fn handle_courses_passed(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let user = match user_id(req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let filter = GradeFilter {
        min_score: Some(PASS_THRESHOLD),
        ..GradeFilter::for_user(user)
    };
    match SqliteStore::new(conn).list_grades(&filter, GradeOrder::IdAsc, None) {
        Ok(records) => ok_serialized(&req.id, &passed_roster(&records)),
        Err(e) => engine_err(&req.id, &EngineError::from(e)),
    }
}

fn handle_courses_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let id = match required_id(req, "id") {
        Ok(v) => v,
        Err(e) => return e,
    };

    match SqliteStore::new(conn).get_course(id) {
        Ok(Some(course)) => ok(&req.id, json!({ "course": course })),
        Ok(None) => engine_err(&req.id, &EngineError::not_found("course", id)),
        Err(e) => engine_err(&req.id, &EngineError::from(e)),
    }
}

fn handle_courses_search(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let query = match search_query(req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let filter = CourseFilter {
        name_contains: Some(query),
        order: CourseOrder::NameAsc,
        limit: Some(SEARCH_LIMIT),
    };
    match SqliteStore::new(conn).list_courses(&filter) {
        Ok(courses) => {
            let results: Vec<serde_json::Value> = courses
                .into_iter()
                .map(|c| json!({ "id": c.id, "name": c.name }))
                .collect();
            ok(&req.id, json!({ "results": results }))
        }
        Err(e) => engine_err(&req.id, &EngineError::from(e)),
    }
}

fn handle_courses_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let id = match required_id(req, "id") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match required_name(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };

    match conn.execute("UPDATE courses SET name = ? WHERE id = ?", (&name, id)) {
        Ok(0) => return engine_err(&req.id, &EngineError::not_found("course", id)),
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            return engine_err(
                &req.id,
                &EngineError::Conflict("course with this name already exists".to_string()),
            )
        }
        Err(e) => return err(&req.id, "db_update_failed", e.to_string(), None),
    }

    match SqliteStore::new(conn).get_course(id) {
        Ok(Some(course)) => ok(&req.id, json!({ "course": course })),
        Ok(None) => engine_err(&req.id, &EngineError::not_found("course", id)),
        Err(e) => engine_err(&req.id, &EngineError::from(e)),
    }
}

fn handle_courses_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let id = match required_id(req, "id") {
        Ok(v) => v,
        Err(e) => return e,
    };

    match row_exists(conn, "courses", id) {
        Ok(true) => {}
        Ok(false) => return engine_err(&req.id, &EngineError::not_found("course", id)),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    // Grades first; there is no ON DELETE CASCADE.
    if let Err(e) = tx.execute("DELETE FROM grades WHERE course_id = ?", [id]) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "grades" })),
        );
    }

    if let Err(e) = tx.execute("DELETE FROM courses WHERE id = ?", [id]) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "courses" })),
        );
    }

    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }
    tracing::info!(course_id = id, "course deleted");
    ok(&req.id, json!({ "ok": true }))
}

/// `(userId, courseId)` pair shared by the per-course views.
fn user_course(req: &Request) -> Result<(i64, i64), serde_json::Value> {
    let user = user_id(req)?;
    let course = required_id(req, "courseId")?;
    Ok((user, course))
}

fn handle_courses_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let (user, course_id) = match user_course(req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    match load_course_summary(&SqliteStore::new(conn), user, course_id) {
        Ok(summary) => ok_serialized(&req.id, &summary),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_courses_timeline(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let (user, course_id) = match user_course(req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let attempts = match load_course_attempts(&SqliteStore::new(conn), user, course_id) {
        Ok(v) => v,
        Err(e) => return engine_err(&req.id, &e),
    };
    let timeline = Timeline::new(&attempts);
    ok_serialized(&req.id, &TimelineResponse::from(&timeline))
}

fn handle_courses_grades(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let (user, course_id) = match user_course(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let page_req = PageRequest::from_params(
        req.params.get("page"),
        req.params.get("limit"),
        state.config.default_limit,
    );

    match course_attempt_table(&SqliteStore::new(conn), user, course_id, page_req) {
        Ok(page) => ok_serialized(&req.id, &page),
        Err(e) => engine_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "courses.create" => Some(handle_courses_create(state, req)),
        "courses.list" => Some(handle_courses_list(state, req)),
        "courses.passed" => Some(handle_courses_passed(state, req)),
        "courses.get" => Some(handle_courses_get(state, req)),
        "courses.search" => Some(handle_courses_search(state, req)),
        "courses.update" => Some(handle_courses_update(state, req)),
        "courses.delete" => Some(handle_courses_delete(state, req)),
        "courses.summary" => Some(handle_courses_summary(state, req)),
        "courses.timeline" => Some(handle_courses_timeline(state, req)),
        "courses.grades" => Some(handle_courses_grades(state, req)),
        _ => None,
    }
}
