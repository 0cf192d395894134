mod commands;
mod logging;
mod progress;

use std::process::{self, ExitCode};

use anyhow::Context;
use clap::Parser;
use colored::*;
use commands::Cli;
use dashcam_shrink_core::scanner::{describe_clips, known_folders_present};
use dashcam_shrink_core::{AppConfig, FfmpegTranscoder, RunSummary, ShrinkEngine};
use dotenv::dotenv;
use indicatif::HumanBytes;
use progress::CliReporter;
use tracing::{error, info, warn};

fn main() -> ExitCode {
    dotenv().ok();

    let _guard = logging::init_logger();

    let config = match dashcam_shrink_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();

    match run(&args, &config) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every clip ended in a usable state.
fn run(args: &Cli, config: &AppConfig) -> anyhow::Result<bool> {
    let config = apply_overrides(args, config);

    let engine = ShrinkEngine::new(
        &args.drive_path,
        &args.backup_dir,
        FfmpegTranscoder::from_config(&config),
    )
    .with_jobs(config.jobs)
    .with_resume_pending(args.resume_pending);

    if args.drive_path.is_dir() && known_folders_present(&args.drive_path).is_empty() {
        warn!(
            "{} does not look like a TeslaCam drive (no TeslaCam folder found)",
            args.drive_path.display()
        );
    }

    if args.list {
        return run_list(&engine);
    }

    let reporter = CliReporter::new();
    let summary = engine
        .run(&reporter)
        .with_context(|| format!("processing {}", args.drive_path.display()))?;

    print_summary(&summary);
    Ok(summary.failed.is_empty())
}

/// Command-line flags win over `Config.toml` and `FFMPEG_PATH`.
fn apply_overrides(args: &Cli, config: &AppConfig) -> AppConfig {
    let mut config = config.clone();
    if let Some(ffmpeg) = &args.ffmpeg {
        config.ffmpeg_path = ffmpeg.clone();
    }
    if let Some(jobs) = args.jobs {
        config.jobs = jobs as usize;
    }
    config
}

fn run_list(engine: &ShrinkEngine<FfmpegTranscoder>) -> anyhow::Result<bool> {
    let videos = engine.discover()?;
    let clips = describe_clips(&videos);

    for clip in &clips {
        let recorded = clip
            .recorded_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<12} {:<19} {:>10}  {}",
            clip.folder.cyan(),
            recorded,
            HumanBytes(clip.size).to_string(),
            clip.relative.display()
        );
    }

    let total: u64 = clips.iter().map(|c| c.size).sum();
    info!(
        "{} clip(s), {} total",
        format!("{}", clips.len()).green(),
        HumanBytes(total).to_string().green(),
    );

    Ok(true)
}

fn print_summary(summary: &RunSummary) {
    if summary.processed() == 0 {
        return;
    }

    info!(
        "{} converted, {} skipped (already backed up), {} restored, {} failed in {}",
        format!("{}", summary.converted).green(),
        format!("{}", summary.skipped).cyan(),
        format!("{}", summary.restored.len()).yellow(),
        format!("{}", summary.failed.len()).red(),
        format!("{:.2}s", summary.duration.as_secs_f64()).green(),
    );
    if summary.resumed > 0 {
        info!(
            "{} pending conversion(s) resumed",
            format!("{}", summary.resumed).cyan()
        );
    }

    for (path, reason) in &summary.restored {
        warn!("Restored {}: {}", path.display(), reason);
    }
    for (path, reason) in &summary.failed {
        error!("Failed {}: {}", path.display(), reason);
    }
}
