use crate::engine::aggregate::{average_stats, full_distribution};
use crate::engine::ranking::best_scores;
use crate::engine::EngineError;
use crate::ipc::error::{engine_err, ok_serialized};
use crate::ipc::helpers::{db_conn, user_id};
use crate::ipc::types::{AppState, Request};
use crate::store::{GradeFilter, GradeOrder, RecordStore, SqliteStore};

fn handle_stats_average(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let user = match user_id(req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let store = SqliteStore::new(conn);
    match store.list_grades(&GradeFilter::for_user(user), GradeOrder::IdAsc, None) {
        Ok(records) => {
            let stats = average_stats(best_scores(&records).into_values());
            tracing::debug!(
                user_id = user,
                total_courses = stats.total_courses,
                bucketed = stats.grade_distribution.total(),
                "average stats computed"
            );
            ok_serialized(&req.id, &stats)
        }
        Err(e) => engine_err(&req.id, &EngineError::from(e)),
    }
}

fn handle_stats_full_distribution(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let user = match user_id(req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let store = SqliteStore::new(conn);
    match store.list_grades(&GradeFilter::for_user(user), GradeOrder::IdAsc, None) {
        Ok(records) => {
            let dist = full_distribution(records.iter().map(|r| r.grade.score));
            tracing::debug!(
                user_id = user,
                attempts = records.len(),
                bucketed = dist.full_grade_distribution.total(),
                "full distribution computed"
            );
            ok_serialized(&req.id, &dist)
        }
        Err(e) => engine_err(&req.id, &EngineError::from(e)),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "stats.average" => Some(handle_stats_average(state, req)),
        "stats.fullDistribution" => Some(handle_stats_full_distribution(state, req)),
        _ => None,
    }
}
