use crate::engine::EngineError;
use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::helpers::{
    db_conn, id_by_name, is_unique_violation, required_id, required_name, row_exists,
    search_query,
};
use crate::ipc::types::{AppState, Request};
use crate::model::Examination;
use crate::store::{ExaminationFilter, RecordStore, SqliteStore};

const SEARCH_LIMIT: u64 = 10;
use serde_json::json;

fn handle_examinations_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let name = match required_name(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };

    match id_by_name(conn, "examinations", &name) {
        Ok(Some(_)) => {
            return engine_err(
                &req.id,
                &EngineError::Conflict("examination name already exists".to_string()),
            )
        }
        Ok(None) => {}
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    match conn.execute("INSERT INTO examinations(name) VALUES(?)", [&name]) {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            return engine_err(
                &req.id,
                &EngineError::Conflict("examination name already exists".to_string()),
            )
        }
        Err(e) => {
            return err(
                &req.id,
                "db_insert_failed",
                e.to_string(),
                Some(json!({ "table": "examinations" })),
            )
        }
    }
    let id = conn.last_insert_rowid();
    tracing::info!(examination_id = id, "examination created");
    let exam = Examination { id, name };
    ok(&req.id, json!({ "examination": exam }))
}

fn handle_examinations_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "examinations": [] }));
    };

    let mut stmt = match conn.prepare("SELECT id, name FROM examinations ORDER BY id") {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([], |row| {
            Ok(Examination {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(examinations) => ok(&req.id, json!({ "examinations": examinations })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_examinations_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let id = match required_id(req, "id") {
        Ok(v) => v,
        Err(e) => return e,
    };

    match SqliteStore::new(conn).get_examination(id) {
        Ok(Some(exam)) => ok(&req.id, json!({ "examination": exam })),
        Ok(None) => engine_err(&req.id, &EngineError::not_found("examination", id)),
        Err(e) => engine_err(&req.id, &EngineError::from(e)),
    }
}

fn handle_examinations_get_by_name(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let name = match required_name(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };

    match id_by_name(conn, "examinations", &name) {
        Ok(Some(id)) => {
            let exam = Examination { id, name };
            ok(&req.id, json!({ "examination": exam }))
        }
        Ok(None) => engine_err(
            &req.id,
            &EngineError::NameNotFound {
                entity: "examination",
                name,
            },
        ),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_examinations_search(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let query = match search_query(req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let filter = ExaminationFilter {
        name_contains: Some(query),
        limit: Some(SEARCH_LIMIT),
    };
    match SqliteStore::new(conn).list_examinations(&filter) {
        Ok(examinations) => ok(&req.id, json!({ "results": examinations })),
        Err(e) => engine_err(&req.id, &EngineError::from(e)),
    }
}

fn handle_examinations_update(state: &mut AppState, req: &Request) -> serde_json::Value {
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

    match conn.execute("UPDATE examinations SET name = ? WHERE id = ?", (&name, id)) {
        Ok(0) => engine_err(&req.id, &EngineError::not_found("examination", id)),
        Ok(_) => {
            let exam = Examination { id, name };
            ok(&req.id, json!({ "examination": exam }))
        }
        Err(e) if is_unique_violation(&e) => engine_err(
            &req.id,
            &EngineError::Conflict("examination name already exists".to_string()),
        ),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_examinations_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let id = match required_id(req, "id") {
        Ok(v) => v,
        Err(e) => return e,
    };

    match row_exists(conn, "examinations", id) {
        Ok(true) => {}
        Ok(false) => return engine_err(&req.id, &EngineError::not_found("examination", id)),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    // Grades keep their examination; refuse rather than orphan them.
    let grade_count: i64 = match conn.query_row(
        "SELECT COUNT(*) FROM grades WHERE examination_id = ?",
        [id],
        |r| r.get(0),
    ) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if grade_count > 0 {
        return engine_err(
            &req.id,
            &EngineError::Conflict(format!("examination still has {grade_count} grade(s)")),
        );
    }

    if let Err(e) = conn.execute("DELETE FROM examinations WHERE id = ?", [id]) {
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "examinations" })),
        );
    }
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "examinations.create" => Some(handle_examinations_create(state, req)),
        "examinations.list" => Some(handle_examinations_list(state, req)),
        "examinations.get" => Some(handle_examinations_get(state, req)),
        "examinations.getByName" => Some(handle_examinations_get_by_name(state, req)),
        "examinations.search" => Some(handle_examinations_search(state, req)),
        "examinations.update" => Some(handle_examinations_update(state, req)),
        "examinations.delete" => Some(handle_examinations_delete(state, req)),
        _ => None,
    }
}
