//! Advisory resource estimate printed before a run

use std::time::Duration;

use serde::Serialize;

use super::config::PipelineConfig;

const SECONDS_PER_FILE: f64 = 10.0;
const LEVEL_FACTOR: f64 = 0.5;
const MEMORY_MB_PER_FILE: u64 = 100;
const OUTPUT_MB_PER_FILE: u64 = 50;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ResourceEstimate {
    pub time: Duration,
    pub memory_mb: u64,
    pub output_mb: u64,
}

/// Rough per-file heuristic; never gates execution
pub fn estimate_resources(config: &PipelineConfig) -> ResourceEstimate {
    let files = config.input.file_count() as u64;
    let seconds = SECONDS_PER_FILE * files as f64 * config.lod.max_lod_levels as f64 * LEVEL_FACTOR;
    ResourceEstimate {
        time: Duration::from_secs_f64(seconds),
        memory_mb: MEMORY_MB_PER_FILE * files,
        output_mb: OUTPUT_MB_PER_FILE * files,
    }
}
