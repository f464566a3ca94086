use crate::engine::EngineError;
use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::helpers::{
    db_conn, id_by_name, is_unique_violation, required_id, required_name, row_exists,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::OptionalExtension;
use serde_json::json;

fn handle_semesters_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let name = match required_name(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };

    match id_by_name(conn, "semesters", &name) {
        Ok(Some(_)) => {
            return engine_err(
                &req.id,
                &EngineError::Conflict("semester with this name already exists".to_string()),
            )
        }
        Ok(None) => {}
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    match conn.execute("INSERT INTO semesters(name) VALUES(?)", [&name]) {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            return engine_err(
                &req.id,
                &EngineError::Conflict("semester with this name already exists".to_string()),
            )
        }
        Err(e) => {
            return err(
                &req.id,
                "db_insert_failed",
                e.to_string(),
                Some(json!({ "table": "semesters" })),
            )
        }
    }
    let id = conn.last_insert_rowid();
    tracing::info!(semester_id = id, "semester created");
    ok(&req.id, json!({ "semester": { "id": id, "name": name } }))
}

fn handle_semesters_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "semesters": [] }));
    };

    let mut stmt = match conn.prepare("SELECT id, name FROM semesters ORDER BY id") {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([], |row| {
            let id: i64 = row.get(0)?;
            let name: String = row.get(1)?;
            Ok(json!({ "id": id, "name": name }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(semesters) => ok(&req.id, json!({ "semesters": semesters })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_semesters_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let id = match required_id(req, "id") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let name: Option<String> = match conn
        .query_row("SELECT name FROM semesters WHERE id = ?", [id], |r| r.get(0))
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    match name {
        Some(name) => ok(&req.id, json!({ "semester": { "id": id, "name": name } })),
        None => engine_err(&req.id, &EngineError::not_found("semester", id)),
    }
}

fn handle_semesters_update(state: &mut AppState, req: &Request) -> serde_json::Value {
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

    match conn.execute("UPDATE semesters SET name = ? WHERE id = ?", (&name, id)) {
        Ok(0) => engine_err(&req.id, &EngineError::not_found("semester", id)),
        Ok(_) => ok(&req.id, json!({ "semester": { "id": id, "name": name } })),
        Err(e) if is_unique_violation(&e) => engine_err(
            &req.id,
            &EngineError::Conflict("semester with this name already exists".to_string()),
        ),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_semesters_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let id = match required_id(req, "id") {
        Ok(v) => v,
        Err(e) => return e,
    };

    match row_exists(conn, "semesters", id) {
        Ok(true) => {}
        Ok(false) => return engine_err(&req.id, &EngineError::not_found("semester", id)),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    let course_count: i64 = match conn.query_row(
        "SELECT COUNT(*) FROM courses WHERE semester_id = ?",
        [id],
        |r| r.get(0),
    ) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if course_count > 0 {
        return engine_err(
            &req.id,
            &EngineError::Conflict(format!("semester still has {course_count} course(s)")),
        );
    }

    if let Err(e) = conn.execute("DELETE FROM semesters WHERE id = ?", [id]) {
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "semesters" })),
        );
    }
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "semesters.create" => Some(handle_semesters_create(state, req)),
        "semesters.list" => Some(handle_semesters_list(state, req)),
        "semesters.get" => Some(handle_semesters_get(state, req)),
        "semesters.update" => Some(handle_semesters_update(state, req)),
        "semesters.delete" => Some(handle_semesters_delete(state, req)),
        _ => None,
    }
}
