use rusqlite::{Connection, ErrorCode, OptionalExtension};

use crate::engine::EngineError;
use crate::ipc::error::{engine_err, err};
use crate::ipc::types::{AppState, Request};

pub fn bad_params(req: &Request, message: impl Into<String>) -> serde_json::Value {
    engine_err(&req.id, &EngineError::InvalidInput(message.into()))
}

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

/// A trimmed, non-empty string parameter.
pub fn required_name(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    let raw = req
        .params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| bad_params(req, format!("missing {}", key)))?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(bad_params(req, format!("{} must not be empty", key)));
    }
    Ok(trimmed.to_string())
}

/// Search text as sent; only a blank query is rejected.
pub fn search_query(req: &Request) -> Result<String, serde_json::Value> {
    match req.params.get("query").and_then(|v| v.as_str()) {
        Some(q) if !q.trim().is_empty() => Ok(q.to_string()),
        _ => Err(bad_params(req, "missing search query")),
    }
}

fn as_id(v: &serde_json::Value) -> Option<i64> {
    match v {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Integer id parameter; numeric strings are accepted.
pub fn required_id(req: &Request, key: &str) -> Result<i64, serde_json::Value> {
    let Some(raw) = req.params.get(key).filter(|v| !v.is_null()) else {
        return Err(bad_params(req, format!("missing {}", key)));
    };
    as_id(raw).ok_or_else(|| bad_params(req, format!("{} must be an integer", key)))
}

pub fn optional_id(req: &Request, key: &str) -> Result<Option<i64>, serde_json::Value> {
    match req.params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(_) => required_id(req, key).map(Some),
    }
}

/// The requesting user. Authentication happens upstream; the id is trusted.
pub fn user_id(req: &Request) -> Result<i64, serde_json::Value> {
    required_id(req, "userId")
}

pub fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == ErrorCode::ConstraintViolation
                && f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// True when a row with `id` exists in `table`.
pub fn row_exists(conn: &Connection, table: &str, id: i64) -> rusqlite::Result<bool> {
    let found: Option<i64> = conn
        .query_row(&format!("SELECT 1 FROM {table} WHERE id = ?"), [id], |r| {
            r.get(0)
        })
        .optional()?;
    Ok(found.is_some())
}

/// Id of the row in `table` whose `name` equals `name`, if any.
pub fn id_by_name(conn: &Connection, table: &str, name: &str) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        &format!("SELECT id FROM {table} WHERE name = ?"),
        [name],
        |r| r.get(0),
    )
    .optional()
}
