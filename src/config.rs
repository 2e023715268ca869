use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Engine configuration, loaded from a TOML properties file (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub database_path: PathBuf,
    pub log_path: PathBuf,
    pub jdbc_server_port: u16,
    pub ignore_case_for_identifiers: bool,
    pub data_cache_size: usize,
    pub max_cache_entry_size: usize,
    pub maximum_worker_threads: usize,
    pub read_only: bool,
    pub transaction_error_on_dirty_select: bool,
    pub table_lock_check: bool,
    pub debug_log_file: Option<PathBuf>,
    pub debug_level: String,
    pub regex_library: String,
    pub concurrency_model: ConcurrencyModel,
}

/// The two interchangeable connection-pool shapes spec §4.G requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConcurrencyModel {
    /// One polling thread scans all connections, dispatching to a worker pool.
    SingleThreadedFarmer,
    /// One blocking reader task per connection, shared worker pool.
    ThreadPerConnection,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            database_path: PathBuf::from("./data"),
            log_path: PathBuf::from("./log"),
            jdbc_server_port: 9157,
            ignore_case_for_identifiers: false,
            data_cache_size: 8 * 1024 * 1024,
            max_cache_entry_size: 1024 * 1024,
            maximum_worker_threads: 4,
            read_only: false,
            transaction_error_on_dirty_select: false,
            table_lock_check: false,
            debug_log_file: None,
            debug_level: "info".to_string(),
            regex_library: "default".to_string(),
            concurrency_model: ConcurrencyModel::ThreadPerConnection,
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, crate::error::EngineError> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| crate::error::EngineError::database_error(e.to_string()))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(3)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(45_000)
    }

    pub const MAX_AUTH_RETRIES: u32 = 12;
    pub const MAX_COMMANDS_PER_TURN: u32 = 8;
    pub const MAX_STREAMABLE_PART_BYTES: usize = 524_288;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.jdbc_server_port, 9157);
        assert_eq!(cfg.maximum_worker_threads, 4);
        assert_eq!(EngineConfig::MAX_STREAMABLE_PART_BYTES, 524_288);
        assert_eq!(EngineConfig::MAX_AUTH_RETRIES, 12);
    }
}
