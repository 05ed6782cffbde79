//! Logger setup for the binary.
//!
//! `COLLECTOR_LOG` picks the level (default `info`). Setting
//! `COLLECTOR_LOG_FILE` also writes the log to that file.

use std::path::PathBuf;

use collector_logging::{initialize, parse_level, LogDestination};

pub const ENV_LOG_LEVEL: &str = "COLLECTOR_LOG";
pub const ENV_LOG_FILE: &str = "COLLECTOR_LOG_FILE";

pub fn initialize_from_env() {
    let level = parse_level(std::env::var(ENV_LOG_LEVEL).ok().as_deref());
    let file = std::env::var(ENV_LOG_FILE).ok();
    initialize(destination(file.as_deref()), level);
}

fn destination(file: Option<&str>) -> LogDestination {
    match file.map(str::trim) {
        Some(path) if !path.is_empty() => LogDestination::Both(PathBuf::from(path)),
        _ => LogDestination::Terminal,
    }
}
