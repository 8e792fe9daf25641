use crate::config::SchedulingConfig;
use crate::days::DayTable;
use rusqlite::Connection;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    /// Injected weekday -> date key table, reloaded on workspace select.
    pub days: DayTable,
    pub config: SchedulingConfig,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            workspace: None,
            db: None,
            days: DayTable::default(),
            config: SchedulingConfig::default(),
        }
    }
}
