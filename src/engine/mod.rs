//! Grade aggregation and statistics.
//!
//! Every operation here is a pure function of records already fetched from a
//! [`crate::store::RecordStore`]. No state survives between calls, so two
//! reads used for one composite response may observe different store states.

pub mod aggregate;
pub mod course_view;
pub mod histogram;
pub mod pager;
pub mod ranking;

use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("{entity} '{name}' not found")]
    NameNotFound { entity: &'static str, name: String },

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    /// Wire-level error code.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::NotFound { .. } | EngineError::NameNotFound { .. } => "not_found",
            EngineError::InvalidInput(_) => "bad_params",
            EngineError::Forbidden(_) => "forbidden",
            EngineError::Conflict(_) => "conflict",
            EngineError::Store(_) => "db_query_failed",
        }
    }
}
