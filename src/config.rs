use std::path::PathBuf;

use crate::engine::pager::DEFAULT_LIMIT;

pub const DEFAULT_LOG_FILTER: &str = "gradebookd=info";

/// Process-level settings, read once at start-up.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub workspace: Option<PathBuf>,
    pub log_filter: String,
    pub default_limit: u64,
}

impl Config {
    pub fn from_env() -> Self {
        // A missing .env file is the normal case.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let workspace = lookup("GRADEBOOKD_WORKSPACE")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        let log_filter = lookup("GRADEBOOKD_LOG")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
        let default_limit = lookup("GRADEBOOKD_DEFAULT_LIMIT")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|v| *v >= 1)
            .unwrap_or(DEFAULT_LIMIT);

        Self {
            workspace,
            log_filter,
            default_limit,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
