use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "dashcam-shrink")]
#[command(
    about = "TeslaCam video downscaler to HD (720p) with backup",
    long_about = None
)]
pub struct Cli {
    /// Path to Tesla USB drive root (contains TeslaCam folder), e.g. /media/$USER/TESLACAM
    #[arg(short = 'd', long, value_name = "PATH")]
    pub drive_path: PathBuf,

    /// Directory where original videos are moved before being replaced with downscaled versions
    #[arg(short = 'b', long, value_name = "PATH")]
    pub backup_dir: PathBuf,

    /// Number of clips converted at once [default: from Config.toml, else 1]
    #[arg(short = 'j', long, value_parser = clap::value_parser!(u64).range(1..))]
    pub jobs: Option<u64>,

    /// ffmpeg binary, overrides FFMPEG_PATH and Config.toml
    #[arg(long = "ffmpeg", value_name = "PATH")]
    pub ffmpeg: Option<PathBuf>,

    /// Re-create drive clips whose backup exists but whose drive copy is missing
    #[arg(long)]
    pub resume_pending: bool,

    /// List the clips that would be processed and exit
    #[arg(long)]
    pub list: bool,
}
