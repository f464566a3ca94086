use crate::db::now_timestamp;
use crate::engine::course_view::paginate_grades;
use crate::engine::pager::PageRequest;
use crate::engine::EngineError;
use crate::ipc::error::{engine_err, err, ok, ok_serialized};
use crate::ipc::helpers::{bad_params, db_conn, optional_id, required_id, row_exists, user_id};
use crate::ipc::types::{AppState, Request};
use crate::model::Grade;
use crate::store::{GradeFilter, SqliteStore};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

fn load_grade(conn: &Connection, id: i64) -> rusqlite::Result<Option<Grade>> {
    conn.query_row(
        "SELECT id, user_id, course_id, examination_id, score, created_at, updated_at
         FROM grades WHERE id = ?",
        [id],
        |row| {
            Ok(Grade {
                id: row.get(0)?,
                user_id: row.get(1)?,
                course_id: row.get(2)?,
                examination_id: row.get(3)?,
                score: row.get(4)?,
                created_at: row.get(5)?,
                updated_at: row.get(6)?,
            })
        },
    )
    .optional()
}

/// `Ok(None)` when absent; a present non-number is rejected.
fn optional_score(req: &Request) -> Result<Option<f64>, serde_json::Value> {
    match req.params.get("score") {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| bad_params(req, "score must be a number")),
    }
}

/// Loads a grade and checks it belongs to `user`.
fn owned_grade(conn: &Connection, req: &Request, user: i64) -> Result<Grade, serde_json::Value> {
    let id = required_id(req, "id")?;
    let grade = match load_grade(conn, id) {
        Ok(Some(g)) => g,
        Ok(None) => return Err(engine_err(&req.id, &EngineError::not_found("grade", id))),
        Err(e) => return Err(err(&req.id, "db_query_failed", e.to_string(), None)),
    };
    if grade.user_id != user {
        tracing::warn!(grade_id = id, user_id = user, "grade owned by another user");
        return Err(engine_err(
            &req.id,
            &EngineError::Forbidden("grade belongs to another user".to_string()),
        ));
    }
    Ok(grade)
}

fn handle_grades_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let parsed = user_id(req).and_then(|user| {
        let course_id = required_id(req, "courseId")?;
        let examination_id = required_id(req, "examinationId")?;
        let score = optional_score(req)?
            .ok_or_else(|| bad_params(req, "missing score"))?;
        Ok((user, course_id, examination_id, score))
    });
    let (user, course_id, examination_id, score) = match parsed {
        Ok(v) => v,
        Err(e) => return e,
    };

    for (table, entity, id) in [
        ("courses", "course", course_id),
        ("examinations", "examination", examination_id),
    ] {
        match row_exists(conn, table, id) {
            Ok(true) => {}
            Ok(false) => return engine_err(&req.id, &EngineError::not_found(entity, id)),
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        }
    }

    let now = now_timestamp();
    if let Err(e) = conn.execute(
        "INSERT INTO grades(user_id, course_id, examination_id, score, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (user, course_id, examination_id, score, &now, &now),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "grades" })),
        );
    }
    let id = conn.last_insert_rowid();
    tracing::debug!(grade_id = id, user_id = user, course_id, "grade created");

    match load_grade(conn, id) {
        Ok(Some(grade)) => ok(&req.id, json!({ "grade": grade })),
        Ok(None) => engine_err(&req.id, &EngineError::not_found("grade", id)),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_grades_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let user = match user_id(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let page_req = PageRequest::from_params(
        req.params.get("page"),
        req.params.get("limit"),
        state.config.default_limit,
    );

    match paginate_grades(&SqliteStore::new(conn), &GradeFilter::for_user(user), page_req) {
        Ok(page) => ok_serialized(&req.id, &page),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_grades_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let user = match user_id(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let score = match optional_score(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let examination_id = match optional_id(req, "examinationId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if score.is_none() && examination_id.is_none() {
        return bad_params(req, "must provide score or examinationId");
    }

    let grade = match owned_grade(conn, req, user) {
        Ok(g) => g,
        Err(e) => return e,
    };

    if let Some(exam_id) = examination_id {
        match row_exists(conn, "examinations", exam_id) {
            Ok(true) => {}
            Ok(false) => {
                return engine_err(&req.id, &EngineError::not_found("examination", exam_id))
            }
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        }
    }

    if let Err(e) = conn.execute(
        "UPDATE grades
         SET score = ?, examination_id = ?, updated_at = ?
         WHERE id = ?",
        (
            score.unwrap_or(grade.score),
            examination_id.unwrap_or(grade.examination_id),
            now_timestamp(),
            grade.id,
        ),
    ) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }

    match load_grade(conn, grade.id) {
        Ok(Some(updated)) => ok(&req.id, json!({ "grade": updated })),
        Ok(None) => engine_err(&req.id, &EngineError::not_found("grade", grade.id)),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_grades_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let user = match user_id(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let grade = match owned_grade(conn, req, user) {
        Ok(g) => g,
        Err(e) => return e,
    };

    if let Err(e) = conn.execute("DELETE FROM grades WHERE id = ?", [grade.id]) {
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "grades" })),
        );
    }
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.create" => Some(handle_grades_create(state, req)),
        "grades.list" => Some(handle_grades_list(state, req)),
        "grades.update" => Some(handle_grades_update(state, req)),
        "grades.delete" => Some(handle_grades_delete(state, req)),
        _ => None,
    }
}
