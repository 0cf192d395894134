use dashcam_shrink_core::{FileOutcome, ProgressReporter, RunSummary};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// CLI progress reporter using indicatif progress bars.
///
/// - Discovery: spinner (file count unknown upfront)
/// - Conversion: bar over discovered + pending clips
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn set_bar(&self, pb: ProgressBar) {
        let mut guard = self.bar.lock().unwrap();
        if let Some(old) = guard.take() {
            old.finish_and_clear();
        }
        *guard = Some(pb);
    }

    fn finish_bar(&self) {
        let mut guard = self.bar.lock().unwrap();
        if let Some(pb) = guard.take() {
            pb.finish_and_clear();
        }
    }
}

impl ProgressReporter for CliReporter {
    fn on_discovery_start(&self) {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_chars(TICK_CHARS),
        );
        pb.set_message("Looking for TeslaCam clips...");
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn on_discovery_complete(&self, total_files: usize, pending: usize) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Found {} clip(s), {} pending conversion(s)",
            total_files, pending
        );

        let total = total_files + pending;
        if total == 0 {
            return;
        }

        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::with_template(
                "  {spinner:.cyan} Converting [{bar:30.cyan/dim}] {pos}/{len} ({eta} remaining) {wide_msg}",
            )
            .unwrap()
            .progress_chars("━╸─")
            .tick_chars(TICK_CHARS),
        );
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn on_file_start(&self, relative: &Path) {
        let guard = self.bar.lock().unwrap();
        if let Some(pb) = guard.as_ref() {
            pb.set_message(relative.display().to_string());
        }
    }

    fn on_file_complete(&self, relative: &Path, outcome: &FileOutcome) {
        let guard = self.bar.lock().unwrap();
        if let Some(pb) = guard.as_ref() {
            match outcome {
                FileOutcome::Converted | FileOutcome::Skipped => {}
                FileOutcome::Restored { .. } => {
                    pb.println(format!(
                        "  \x1b[33m↺\x1b[0m {} restored",
                        relative.display()
                    ));
                }
                FileOutcome::Failed { .. } => {
                    pb.println(format!("  \x1b[31m✗\x1b[0m {} failed", relative.display()));
                }
            }
            pb.inc(1);
        }
    }

    fn on_batch_complete(&self, summary: &RunSummary) {
        self.finish_bar();
        if summary.processed() > 0 {
            eprintln!(
                "  \x1b[32m✓\x1b[0m Conversion complete: {} file(s) in {:.2}s",
                summary.processed(),
                summary.duration.as_secs_f64()
            );
        }
    }
}
