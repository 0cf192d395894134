use crate::engine::{FileOutcome, RunSummary};
use std::path::Path;

/// Trait for reporting batch progress.
///
/// CLI implements with tracing/indicatif; tests use `SilentReporter`.
/// All methods have default no-op implementations. Calls may arrive from
/// several worker threads when the engine runs with more than one job.
pub trait ProgressReporter: Send + Sync {
    fn on_discovery_start(&self) {}
    fn on_discovery_complete(&self, _total_files: usize, _pending: usize) {}
    fn on_file_start(&self, _relative: &Path) {}
    fn on_file_complete(&self, _relative: &Path, _outcome: &FileOutcome) {}
    fn on_batch_complete(&self, _summary: &RunSummary) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
